//! Production configuration constants.
//!
//! This module contains the tunables that define the production behavior of
//! the annotation pipeline. They are referenced throughout the codebase and
//! in tests to ensure consistency.

/// Maximum number of annotations accepted into a single plan.
///
/// Findings beyond this cap are excluded from the plan and reported to the
/// caller as truncated. The cap bounds the number of host round-trips a
/// single annotate cycle can issue.
pub const MAX_ANNOTATE_OPS: usize = 200;

/// Maximum span (in characters) a finding may cover and still be planned.
///
/// Findings whose `end - start` exceeds this are treated as invalid input:
/// backend offset corruption produces degenerate spans long before any
/// legitimate clause reaches this size.
pub const MAX_SNIPPET_SPAN: usize = 10_000;

/// Floor for the offset-match acceptance distance.
///
/// An offset-guided anchor is accepted when its start lies within
/// `max(OFFSET_DRIFT_FLOOR, expected_length)` characters of the expected
/// start. This tolerates small renumbering drift from host-side autocorrect
/// while rejecting unrelated matches.
pub const OFFSET_DRIFT_FLOOR: usize = 5;

/// Shrinking ladder of query lengths for host search truncation.
///
/// Queries over the longest rung are cut back to a word/punctuation
/// boundary, trying rungs longest-first so boundaries at or after
/// position 120 are preferred.
pub const QUERY_LADDER: [usize; 5] = [200, 160, 120, 80, 40];

/// Preferred minimum token length for the token-search fallback.
pub const TOKEN_PREFERRED_LEN: usize = 8;

/// Maximum length of a token-search query, in characters.
pub const TOKEN_QUERY_MAX_LEN: usize = 64;

/// Capacity of the per-cycle normalization memo.
///
/// The memo is purely a performance cache; clearing it at capacity is
/// always safe.
pub const NORMALIZE_MEMO_CAPACITY: usize = 64;

/// Marker token prefixing every rendered annotation message.
pub const ANNOTATION_MARKER: &str = "[redline]";

/// Maximum length of the quoted excerpt inside a rendered message.
pub const MESSAGE_EXCERPT_MAX: usize = 160;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_ladder_is_strictly_shrinking() {
        for pair in QUERY_LADDER.windows(2) {
            assert!(pair[0] > pair[1], "ladder must shrink: {:?}", QUERY_LADDER);
        }
    }

    #[test]
    fn test_token_bounds_are_consistent() {
        assert!(TOKEN_PREFERRED_LEN <= TOKEN_QUERY_MAX_LEN);
        // Token queries must survive the search ladder untouched
        assert!(TOKEN_QUERY_MAX_LEN <= QUERY_LADDER[0]);
    }

    #[test]
    fn test_annotate_cap_below_span_limit() {
        // A full plan of maximal spans must stay representable in usize math
        assert!(MAX_ANNOTATE_OPS.checked_mul(MAX_SNIPPET_SPAN).is_some());
    }
}
