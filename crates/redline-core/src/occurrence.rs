//! Conversion of raw character offsets into occurrence indices.
//!
//! A finding's offsets point into the text the backend analyzed, which the
//! host document has usually drifted away from. What survives the drift is
//! the *occurrence identity*: "this is the Nth time this normalized snippet
//! appears". This module computes that index by normalizing both the full
//! text and the prefix up to the offset, then counting non-overlapping
//! matches strictly before the prefix boundary.

use crate::normalize::{normalize_intake_text, NormalizeMemo};

/// Computes the zero-based occurrence index of `snippet` at `start`.
///
/// Returns `None` when `text` or `snippet` is empty, `start` is missing,
/// or the snippet normalizes to an empty string. Otherwise the result is
/// the number of non-overlapping occurrences of the normalized snippet in
/// the normalized text that begin strictly before the normalized length of
/// `text[..start]`.
pub fn compute_nth_from_offsets(text: &str, snippet: &str, start: Option<usize>) -> Option<usize> {
    let mut memo = NormalizeMemo::with_capacity(2);
    compute_nth_with(&mut memo, text, snippet, start?)
}

/// Memo-threaded variant for callers that process many findings against
/// the same text: the full-text normalization computes once per cycle.
pub fn compute_nth_with(
    memo: &mut NormalizeMemo,
    text: &str,
    snippet: &str,
    start: usize,
) -> Option<usize> {
    if text.is_empty() || snippet.is_empty() {
        return None;
    }
    let norm_snippet = normalize_intake_text(snippet);
    if norm_snippet.is_empty() {
        return None;
    }

    let norm_text = memo.normalize(text);
    let prefix: String = text.chars().take(start).collect();
    let boundary = normalize_intake_text(&prefix).chars().count();

    Some(count_occurrences_before(
        &norm_text.text,
        &norm_snippet,
        boundary,
    ))
}

/// Counts non-overlapping occurrences of `needle` in `haystack`.
pub fn count_occurrences(haystack: &str, needle: &str) -> usize {
    count_occurrences_before(haystack, needle, usize::MAX)
}

/// Counts non-overlapping occurrences of `needle` that begin strictly
/// before character position `boundary`.
///
/// The scan runs left to right; each match consumes
/// `max(needle_chars, 1)` characters before the next search starts.
fn count_occurrences_before(haystack: &str, needle: &str, boundary: usize) -> usize {
    if needle.is_empty() {
        return 0;
    }
    let needle_chars = needle.chars().count().max(1);
    let mut count = 0;
    let mut char_pos = 0;
    let mut byte_pos = 0;

    while byte_pos < haystack.len() && char_pos < boundary {
        if haystack[byte_pos..].starts_with(needle) {
            count += 1;
            char_pos += needle_chars;
            byte_pos += needle.len();
        } else {
            // advance one character
            let step = haystack[byte_pos..]
                .chars()
                .next()
                .map_or(1, |c| c.len_utf8());
            char_pos += 1;
            byte_pos += step;
        }
    }
    count
}
