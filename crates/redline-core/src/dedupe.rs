//! Key-based finding deduplication with severity precedence.
//!
//! Backends routinely re-emit the same finding across analyze calls, and
//! overlapping rule sets flag the same passage at different severities.
//! Deduplication collapses them to one survivor per identity key, keeping
//! the highest-severity representative while preserving first-seen order.

use crate::config::MAX_SNIPPET_SPAN;
use crate::finding::{merge_key, resolve_span, severity_rank, Finding};
use std::collections::HashMap;
use tracing::debug;

/// Survivors plus diagnostic counts from a deduplication pass.
#[derive(Debug, Clone, Default)]
pub struct DedupeOutcome {
    /// One finding per identity key, in first-seen key order
    pub findings: Vec<Finding>,
    /// Findings dropped for unusable spans
    pub invalid: usize,
    /// Findings that collided with an already-seen key
    pub duplicates: usize,
}

/// Collapses duplicate and invalid findings.
///
/// A finding is invalid when its span cannot be resolved (missing `start`),
/// is degenerate (`end <= start`), or exceeds [`MAX_SNIPPET_SPAN`]. Among
/// findings sharing an identity key, a later one replaces the survivor only
/// when its severity rank is strictly greater; ties keep the incumbent. The
/// survivor keeps the key's first-seen position, and its `end` is always
/// materialized (derived from the snippet length when the backend omitted
/// it).
pub fn dedupe_findings(findings: &[Finding]) -> DedupeOutcome {
    let mut outcome = DedupeOutcome::default();
    let mut index: HashMap<String, usize> = HashMap::new();

    for finding in findings {
        let Some((start, end)) = resolve_span(finding) else {
            outcome.invalid += 1;
            continue;
        };
        if end <= start || end - start > MAX_SNIPPET_SPAN {
            outcome.invalid += 1;
            continue;
        }

        let key = merge_key(finding);
        match index.get(&key).copied() {
            Some(slot) => {
                outcome.duplicates += 1;
                if severity_rank(finding.severity) > severity_rank(outcome.findings[slot].severity)
                {
                    outcome.findings[slot] = materialize(finding, end);
                }
            }
            None => {
                index.insert(key, outcome.findings.len());
                outcome.findings.push(materialize(finding, end));
            }
        }
    }

    if outcome.invalid > 0 || outcome.duplicates > 0 {
        debug!(
            invalid = outcome.invalid,
            duplicates = outcome.duplicates,
            kept = outcome.findings.len(),
            "deduplicated findings"
        );
    }
    outcome
}

fn materialize(finding: &Finding, end: usize) -> Finding {
    Finding {
        end: Some(end),
        ..finding.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finding::Severity;

    fn finding(rule_id: &str, snippet: &str, start: usize, severity: Option<Severity>) -> Finding {
        Finding {
            rule_id: rule_id.to_string(),
            snippet: snippet.to_string(),
            start: Some(start),
            end: None,
            severity,
            salience: None,
            agenda_group: None,
            source: None,
            nth: None,
            advice: None,
            law_refs: Vec::new(),
            link: None,
        }
    }

    #[test]
    fn test_higher_severity_replaces_survivor() {
        let low = finding("r1", "clause", 0, Some(Severity::Low));
        let high = finding("r1", "clause", 0, Some(Severity::High));
        let outcome = dedupe_findings(&[low, high]);

        assert_eq!(outcome.findings.len(), 1);
        assert_eq!(outcome.findings[0].severity, Some(Severity::High));
        assert_eq!(outcome.duplicates, 1);
    }

    #[test]
    fn test_equal_severity_keeps_first() {
        let mut first = finding("r1", "clause", 0, Some(Severity::High));
        first.salience = Some(1.0);
        let second = finding("r1", "clause", 0, Some(Severity::High));
        let outcome = dedupe_findings(&[first, second]);

        assert_eq!(outcome.findings.len(), 1);
        assert_eq!(outcome.findings[0].salience, Some(1.0));
    }

    #[test]
    fn test_missing_severity_ranks_as_medium() {
        let unknown = finding("r1", "clause", 0, None);
        let low = finding("r1", "clause", 0, Some(Severity::Low));
        let outcome = dedupe_findings(&[unknown, low]);

        // low does not outrank the medium-by-default incumbent
        assert_eq!(outcome.findings[0].severity, None);
    }

    #[test]
    fn test_invalid_spans_are_dropped() {
        let missing_start = Finding {
            start: None,
            ..finding("r1", "clause", 0, None)
        };
        let mut degenerate = finding("r2", "clause", 5, None);
        degenerate.end = Some(5);
        let mut oversized = finding("r3", "clause", 0, None);
        oversized.end = Some(MAX_SNIPPET_SPAN + 1);

        let outcome = dedupe_findings(&[missing_start, degenerate, oversized]);
        assert!(outcome.findings.is_empty());
        assert_eq!(outcome.invalid, 3);
    }

    #[test]
    fn test_first_seen_order_is_preserved() {
        let a = finding("a", "first", 0, None);
        let b = finding("b", "second", 10, None);
        let a_again = finding("a", "first", 0, Some(Severity::Critical));
        let c = finding("c", "third", 20, None);

        let outcome = dedupe_findings(&[a, b, a_again, c]);
        let rules: Vec<&str> = outcome
            .findings
            .iter()
            .map(|f| f.rule_id.as_str())
            .collect();
        assert_eq!(rules, vec!["a", "b", "c"]);
        // the replacement landed in a's original slot
        assert_eq!(outcome.findings[0].severity, Some(Severity::Critical));
    }

    #[test]
    fn test_end_is_materialized() {
        let outcome = dedupe_findings(&[finding("r1", "abcde", 3, None)]);
        assert_eq!(outcome.findings[0].end, Some(8));
    }

    #[test]
    fn test_normalized_snippet_identity() {
        let curly = finding("r1", "\u{201C}term\u{201D}", 0, Some(Severity::Low));
        let straight = finding("r1", "\"term\"", 0, Some(Severity::High));
        let outcome = dedupe_findings(&[curly, straight]);

        assert_eq!(outcome.findings.len(), 1);
        assert_eq!(outcome.findings[0].severity, Some(Severity::High));
    }
}
