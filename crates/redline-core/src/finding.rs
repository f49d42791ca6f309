//! Backend finding schema and the identity/ordering primitives built on it.
//!
//! Findings arrive as JSON arrays from two producers: the initial analyze
//! call and later recheck ("QA") calls. They are consumed read-only; every
//! transformation in this crate clones rather than mutating in place.
//!
//! Deserialization is deliberately lenient: unknown severities, negative or
//! non-integral offsets, and missing fields all decode to `None` so that
//! malformed entries surface as counted skips downstream instead of failing
//! the whole payload.

use crate::normalize::normalize_intake_text;
use serde::{Deserialize, Deserializer, Serialize};

/// Finding severity, ranked `Low < Medium < High < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Total-order rank used by dedup precedence and merge priority.
    pub fn rank(self) -> u8 {
        match self {
            Severity::Low => 0,
            Severity::Medium => 1,
            Severity::High => 2,
            Severity::Critical => 3,
        }
    }

    /// Case-insensitive parse; unknown labels are `None`.
    pub fn parse(label: &str) -> Option<Self> {
        match label.to_ascii_lowercase().as_str() {
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }
}

/// Rank of an optional severity; unknown or missing ranks as `Medium`.
pub fn severity_rank(severity: Option<Severity>) -> u8 {
    severity.map_or(Severity::Medium.rank(), Severity::rank)
}

/// Rank of an agenda group for merge tie-breaking; lower outranks higher.
///
/// `law(0) < policy(1) < substantive(2) < drafting(3) < grammar(4)`;
/// anything else ranks last.
pub fn agenda_group_rank(group: Option<&str>) -> usize {
    match group.map(|g| g.to_ascii_lowercase()).as_deref() {
        Some("law") => 0,
        Some("policy") => 1,
        Some("substantive") => 2,
        Some("drafting") => 3,
        Some("grammar") => 4,
        _ => usize::MAX,
    }
}

/// A backend-produced issue tied to a text span.
///
/// `start`/`end` are character offsets into the raw document text the
/// backend analyzed. `nth`, when present, pins the finding to a specific
/// physical occurrence of a repeated snippet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    /// Identifier of the rule that produced this finding
    #[serde(default)]
    pub rule_id: String,
    /// The flagged passage, verbatim from the analyzed text
    #[serde(default)]
    pub snippet: String,
    /// Start offset into the analyzed text
    #[serde(default, deserialize_with = "de_index")]
    pub start: Option<usize>,
    /// End offset into the analyzed text
    #[serde(default, deserialize_with = "de_index")]
    pub end: Option<usize>,
    /// Severity; unknown labels decode to `None` and rank as medium
    #[serde(default, deserialize_with = "de_severity")]
    pub severity: Option<Severity>,
    /// Backend salience score for merge tie-breaking
    #[serde(default)]
    pub salience: Option<f64>,
    /// Coarse rule category (`law`, `policy`, `substantive`, ...)
    #[serde(default)]
    pub agenda_group: Option<String>,
    /// Producer discriminator (`"qa"` for recheck output)
    #[serde(default)]
    pub source: Option<String>,
    /// Zero-based occurrence index, when the backend pinned one
    #[serde(default, deserialize_with = "de_index")]
    pub nth: Option<usize>,
    /// Advisory text shown in the rendered annotation
    #[serde(default)]
    pub advice: Option<String>,
    /// Statute/regulation references backing the advisory
    #[serde(default)]
    pub law_refs: Vec<String>,
    /// Link to the relevant clause documentation
    #[serde(default)]
    pub link: Option<String>,
}

/// Resolves a finding's span, deriving `end` from the snippet length when
/// absent. `None` when `start` is missing.
pub fn resolve_span(finding: &Finding) -> Option<(usize, usize)> {
    let start = finding.start?;
    let end = finding
        .end
        .unwrap_or_else(|| start + finding.snippet.chars().count());
    Some((start, end))
}

/// Identity key shared by deduplication and merge matching:
/// `rule_id|start|end|normalized_snippet`.
///
/// Two findings with the same key are the same finding; severity, message,
/// and salience may differ and the higher-priority one wins. Findings with
/// no resolvable span key with `?` placeholders so they still match each
/// other deterministically.
pub fn merge_key(finding: &Finding) -> String {
    let (start, end) = match resolve_span(finding) {
        Some((s, e)) => (s.to_string(), e.to_string()),
        None => ("?".to_string(), "?".to_string()),
    };
    format!(
        "{}|{}|{}|{}",
        finding.rule_id,
        start,
        end,
        normalize_intake_text(&finding.snippet)
    )
}

fn de_index<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<f64>::deserialize(deserializer)?;
    Ok(raw.and_then(|v| {
        if v.is_finite() && v >= 0.0 && v.fract() == 0.0 && v <= usize::MAX as f64 {
            Some(v as usize)
        } else {
            None
        }
    }))
}

fn de_severity<'de, D>(deserializer: D) -> Result<Option<Severity>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(Severity::parse))
}
