//! Property tests for the normalization and merge invariants.

use proptest::prelude::*;
use redline_core::finding::{Finding, Severity};
use redline_core::merge::merge_qa_findings;
use redline_core::normalize::{normalize_intake_text, normalize_text_full};

/// Characters the normalizer treats specially, mixed with mundane text.
fn doc_char() -> impl Strategy<Value = char> {
    prop::sample::select(vec![
        'a', 'b', 'z', 'A', 'Z', '0', '9', ' ', ' ', '\t', '\n', '\r', '.', ';', '-', '"', '\'',
        '\u{00A0}', '\u{202F}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{00AB}',
        '\u{00BB}', '\u{2013}', '\u{2014}', '\u{2212}', '\u{200B}', '\u{200D}', '\u{FEFF}',
        '\u{00E9}', '\u{0301}', '\u{00DF}', '\u{4E2D}',
    ])
}

fn doc_text() -> impl Strategy<Value = String> {
    prop::collection::vec(doc_char(), 0..120).prop_map(|chars| chars.into_iter().collect())
}

fn severity() -> impl Strategy<Value = Option<Severity>> {
    prop::option::of(prop::sample::select(vec![
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ]))
}

fn finding() -> impl Strategy<Value = Finding> {
    (
        "[a-d]-[0-9]",
        prop::sample::select(vec!["alpha", "beta gamma", "delta", "\u{201C}term\u{201D}"]),
        0usize..200,
        severity(),
        prop::option::of(-10.0f64..10.0),
    )
        .prop_map(|(rule_id, snippet, start, severity, salience)| Finding {
            rule_id,
            snippet: snippet.to_string(),
            start: Some(start),
            end: None,
            severity,
            salience,
            agenda_group: None,
            source: None,
            nth: None,
            advice: None,
            law_refs: Vec::new(),
            link: None,
        })
}

proptest! {
    #[test]
    fn normalization_is_idempotent(input in doc_text()) {
        let once = normalize_intake_text(&input);
        let twice = normalize_intake_text(&once);
        prop_assert_eq!(&once, &twice);
    }

    #[test]
    fn offset_map_matches_text_length(input in doc_text()) {
        let norm = normalize_text_full(&input);
        prop_assert_eq!(norm.map.len(), norm.text.chars().count());
    }

    #[test]
    fn offset_map_points_into_source(input in doc_text()) {
        let source_len = input.chars().count();
        let norm = normalize_text_full(&input);
        for &idx in &norm.map {
            prop_assert!(idx < source_len, "map entry {} out of range {}", idx, source_len);
        }
    }

    #[test]
    fn offset_map_is_monotonic(input in doc_text()) {
        // deletion and collapsing only skip forward; composition may pin
        // several output chars to one source index, never move backwards
        let norm = normalize_text_full(&input);
        for window in norm.map.windows(2) {
            prop_assert!(window[0] <= window[1]);
        }
    }

    #[test]
    fn merge_is_idempotent(
        base in prop::collection::vec(finding(), 0..12),
        qa in prop::collection::vec(finding(), 0..12),
    ) {
        let once = merge_qa_findings(&base, &qa);
        let twice = merge_qa_findings(&once, &qa);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn merge_preserves_base_length_prefix(
        base in prop::collection::vec(finding(), 0..12),
        qa in prop::collection::vec(finding(), 0..12),
    ) {
        let merged = merge_qa_findings(&base, &qa);
        prop_assert!(merged.len() >= base.len());
        // every base slot still holds a finding with the base entry's key
        for (before, after) in base.iter().zip(merged.iter()) {
            prop_assert_eq!(
                redline_core::finding::merge_key(before),
                redline_core::finding::merge_key(after)
            );
        }
    }
}
