//! Greedy non-overlapping annotation planning.
//!
//! The planner turns a raw finding set into the ordered list of annotations
//! one annotate cycle will attempt: deduplicate, sort by declared start,
//! sweep greedily so no accepted item overlaps the previously accepted one,
//! resolve each survivor's occurrence index, and render its message. The
//! accepted order becomes the commit order for anchor resolution, where
//! earlier successful anchors form exclusion zones for later items.

use crate::config::{ANNOTATION_MARKER, MAX_ANNOTATE_OPS, MESSAGE_EXCERPT_MAX};
use crate::dedupe::dedupe_findings;
use crate::finding::Finding;
use crate::normalize::{normalize_intake_text, NormalizeMemo};
use crate::occurrence::{compute_nth_with, count_occurrences};
use tracing::{debug, instrument};

/// A finding that survived deduplication and the overlap sweep, ready for
/// anchor resolution. Ephemeral: recomputed on every planning pass.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanItem {
    /// The snippet verbatim, as the backend produced it
    pub raw: String,
    /// Full normalization of the snippet
    pub norm: String,
    /// Resolved occurrence index used to pick among repeated matches
    pub occ_idx: usize,
    /// The backend-pinned occurrence index, when one was supplied
    pub nth: Option<usize>,
    /// Declared start offset into the analyzed text
    pub start: usize,
    /// Declared end offset into the analyzed text
    pub end: usize,
    /// Rendered annotation message
    pub message: String,
    /// Rule that produced the finding
    pub rule_id: String,
}

/// Ordered plan plus the diagnostic counts reported to the caller.
#[derive(Debug, Clone, Default)]
pub struct AnnotationPlan {
    /// Accepted items in ascending `start` order
    pub items: Vec<PlanItem>,
    /// Findings dropped by deduplication for unusable spans
    pub invalid: usize,
    /// Findings collapsed into an already-seen identity key
    pub duplicates: usize,
    /// Findings rejected by the sweep (missing fields or overlap)
    pub skipped: usize,
    /// Findings excluded after the plan reached its size cap
    pub truncated: usize,
}

/// Plans the annotations for one analyze cycle.
///
/// Pure function of the findings and the analyzed document text; callers
/// own the text's lifecycle and pass it explicitly. Rejected findings do
/// not advance the overlap cursor, so acceptance is a greedy
/// interval-scheduling selection by earliest declared start.
#[instrument(skip_all, fields(findings = findings.len()))]
pub fn plan_annotations(findings: &[Finding], base_text: &str) -> AnnotationPlan {
    let deduped = dedupe_findings(findings);
    let mut plan = AnnotationPlan {
        invalid: deduped.invalid,
        duplicates: deduped.duplicates,
        ..AnnotationPlan::default()
    };

    let mut ordered = deduped.findings;
    // stable: equal starts keep first-seen order, missing starts sink
    ordered.sort_by_key(|f| f.start.unwrap_or(usize::MAX));

    let mut memo = NormalizeMemo::new();
    let mut last_end: i64 = -1;

    for finding in &ordered {
        if plan.items.len() >= MAX_ANNOTATE_OPS {
            plan.truncated += 1;
            continue;
        }
        let Some(start) = finding.start else {
            plan.skipped += 1;
            continue;
        };
        if finding.rule_id.is_empty() || finding.snippet.is_empty() {
            plan.skipped += 1;
            continue;
        }
        if (start as i64) < last_end {
            plan.skipped += 1;
            continue;
        }
        // dedupe materialized end for every survivor
        let end = finding
            .end
            .unwrap_or_else(|| start + finding.snippet.chars().count());

        let norm = normalize_intake_text(&finding.snippet);
        let occ_idx = match finding.nth {
            Some(nth) => nth,
            None => compute_nth_with(&mut memo, base_text, &finding.snippet, start)
                .unwrap_or_else(|| prefix_occurrences(base_text, &norm, start)),
        };

        plan.items.push(PlanItem {
            raw: finding.snippet.clone(),
            norm: norm.clone(),
            occ_idx,
            nth: finding.nth,
            start,
            end,
            message: render_message(finding, &norm),
            rule_id: finding.rule_id.clone(),
        });
        last_end = end as i64;
    }

    debug!(
        accepted = plan.items.len(),
        skipped = plan.skipped,
        truncated = plan.truncated,
        "annotation plan built"
    );
    plan
}

/// Last-resort occurrence index: occurrences of the normalized snippet in
/// the normalization of the raw prefix up to `start`.
fn prefix_occurrences(base_text: &str, norm_snippet: &str, start: usize) -> usize {
    if norm_snippet.is_empty() {
        return 0;
    }
    let prefix: String = base_text.chars().take(start).collect();
    count_occurrences(&normalize_intake_text(&prefix), norm_snippet)
}

/// Renders the annotation message: marker + rule id, advisory text, law
/// references, a quoted normalized excerpt, and the clause link, each on
/// its own line.
fn render_message(finding: &Finding, norm: &str) -> String {
    let mut lines = vec![format!("{} {}", ANNOTATION_MARKER, finding.rule_id)];
    if let Some(advice) = finding.advice.as_deref().filter(|a| !a.is_empty()) {
        lines.push(advice.to_string());
    }
    if !finding.law_refs.is_empty() {
        lines.push(finding.law_refs.join("; "));
    }
    lines.push(format!("\"{}\"", excerpt(norm)));
    if let Some(link) = finding.link.as_deref().filter(|l| !l.is_empty()) {
        lines.push(link.to_string());
    }
    lines.join("\n")
}

fn excerpt(norm: &str) -> String {
    if norm.chars().count() <= MESSAGE_EXCERPT_MAX {
        return norm.to_string();
    }
    let cut: String = norm.chars().take(MESSAGE_EXCERPT_MAX).collect();
    format!("{}...", cut.trim_end())
}
