//! Lossy Unicode canonicalization with an inverse offset map.
//!
//! Backend findings carry offsets into the raw document text, but the text
//! the host exposes drifts: typographic quotes, non-breaking spaces,
//! zero-width characters, and autocorrected dashes all break literal
//! comparison. This module canonicalizes arbitrary text into a comparable
//! form while recording, for every surviving character, the index of the
//! source character that produced it.
//!
//! All offsets in this crate are character (Unicode scalar value) indices.
//!
//! # Pipeline
//!
//! 1. NFC-normalize the input.
//! 2. Collapse `\r\n` and lone `\r` to `\n` (newlines are preserved and
//!    never merged with surrounding spaces).
//! 3. Delete zero-width and formatting characters with no output and no
//!    map entry.
//! 4. Fold typographic variants: dashes to `-`, double quotes and
//!    guillemets to `"`, single quotes and primes to `'`, non-breaking
//!    spaces and tabs to `' '`.
//! 5. Collapse runs of `' '` to a single space, keeping the first source
//!    index of each run.
//! 6. NFC-normalize the substituted text again, then trim whitespace from
//!    both ends with the map trimmed in lockstep.
//!
//! The pipeline is idempotent: normalizing its own output is a no-op.

use crate::config::NORMALIZE_MEMO_CAPACITY;
use std::collections::HashMap;
use std::sync::Arc;
use unicode_normalization::char::canonical_combining_class;
use unicode_normalization::UnicodeNormalization;

/// Canonicalized text plus the inverse offset map back to its source.
///
/// Invariant: `map.len()` equals the character count of `text`, and
/// `map[i]` is the character index into the original source string that
/// produced normalized character `i`. Built fresh per call and never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedText {
    /// The canonical text form
    pub text: String,
    /// Per-character source indices, parallel to `text`
    pub map: Vec<usize>,
}

impl NormalizedText {
    /// Character length of the normalized text (equals `map.len()`).
    pub fn char_len(&self) -> usize {
        self.map.len()
    }
}

/// Canonicalizes `input` and returns the text with its inverse offset map.
pub fn normalize_text_full(input: &str) -> NormalizedText {
    let source: Vec<(char, usize)> = input.chars().enumerate().map(|(i, c)| (c, i)).collect();
    let composed = nfc_pairs(&source);

    // Line endings, zero-width deletion, typographic folding.
    let mut folded: Vec<(char, usize)> = Vec::with_capacity(composed.len());
    let mut i = 0;
    while i < composed.len() {
        let (c, src) = composed[i];
        if c == '\r' {
            if matches!(composed.get(i + 1), Some(&('\n', _))) {
                i += 1;
            }
            folded.push(('\n', src));
            i += 1;
            continue;
        }
        if is_zero_width(c) {
            i += 1;
            continue;
        }
        folded.push((fold_char(c), src));
        i += 1;
    }

    // Collapse space runs; the first source index of each run survives.
    // Newlines are not spaces and never participate.
    let mut collapsed: Vec<(char, usize)> = Vec::with_capacity(folded.len());
    for (c, src) in folded {
        if c == ' ' && matches!(collapsed.last(), Some(&(' ', _))) {
            continue;
        }
        collapsed.push((c, src));
    }

    // Post-substitution NFC, then trim both ends with the map in lockstep.
    let recomposed = nfc_pairs(&collapsed);
    let start = recomposed
        .iter()
        .position(|&(c, _)| !c.is_whitespace())
        .unwrap_or(recomposed.len());
    let end = recomposed
        .iter()
        .rposition(|&(c, _)| !c.is_whitespace())
        .map_or(start, |p| p + 1);

    let trimmed = &recomposed[start..end];
    let mut text = String::with_capacity(trimmed.len());
    let mut map = Vec::with_capacity(trimmed.len());
    for &(c, src) in trimmed {
        text.push(c);
        map.push(src);
    }
    NormalizedText { text, map }
}

/// Canonicalizes `input`, discarding the offset map.
pub fn normalize_intake_text(input: &str) -> String {
    normalize_text_full(input).text
}

/// Applies NFC to a `(char, source index)` sequence, preserving the map.
///
/// Composition runs per starter-bounded segment (a starter plus its
/// trailing combining characters). When composition changes a segment's
/// length, every output character inherits the segment's first source
/// index; otherwise indices carry over positionally.
fn nfc_pairs(pairs: &[(char, usize)]) -> Vec<(char, usize)> {
    let mut out: Vec<(char, usize)> = Vec::with_capacity(pairs.len());
    let mut seg_start = 0;
    while seg_start < pairs.len() {
        let mut seg_end = seg_start + 1;
        while seg_end < pairs.len() && canonical_combining_class(pairs[seg_end].0) != 0 {
            seg_end += 1;
        }
        let segment = &pairs[seg_start..seg_end];
        let composed: Vec<char> = segment.iter().map(|&(c, _)| c).nfc().collect();
        if composed.len() == segment.len() {
            for (k, &c) in composed.iter().enumerate() {
                out.push((c, segment[k].1));
            }
        } else {
            let origin = segment[0].1;
            for &c in &composed {
                out.push((c, origin));
            }
        }
        seg_start = seg_end;
    }
    out
}

/// Zero-width and formatting characters deleted outright.
fn is_zero_width(c: char) -> bool {
    matches!(
        c,
        '\u{200B}' // zero width space
            | '\u{200C}' // zero width non-joiner
            | '\u{200D}' // zero width joiner
            | '\u{200E}' // left-to-right mark
            | '\u{200F}' // right-to-left mark
            | '\u{2060}' // word joiner
            | '\u{2061}'..='\u{2064}' // invisible operators
            | '\u{FEFF}' // byte order mark
    )
}

/// Folds typographic variants to their canonical ASCII forms.
fn fold_char(c: char) -> char {
    match c {
        // hyphen, non-breaking hyphen, figure/en/em dash, horizontal bar, minus
        '\u{2010}'..='\u{2015}' | '\u{2212}' => '-',
        // curly/low/reversed double quotes, guillemets, double prime
        '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' | '\u{00AB}' | '\u{00BB}'
        | '\u{2033}' => '"',
        // curly/low/reversed single quotes, prime
        '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' | '\u{2032}' => '\'',
        // no-break space, narrow no-break space
        '\u{00A0}' | '\u{202F}' => ' ',
        '\t' => ' ',
        _ => c,
    }
}

/// Collapses all whitespace runs to single spaces and trims both ends.
///
/// A looser fold than [`normalize_text_full`], used to derive search
/// candidate strings from raw snippets.
pub(crate) fn condense_spaces(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending = false;
    for c in input.chars() {
        if c.is_whitespace() {
            pending = !out.is_empty();
        } else {
            if pending {
                out.push(' ');
                pending = false;
            }
            out.push(c);
        }
    }
    out
}

/// Bounded per-cycle normalization cache.
///
/// Keyed by the raw input string; purely a performance cache, safe to
/// clear at any time. Capacity-limited so long sessions cannot grow it
/// without bound: at capacity the cache is dropped wholesale rather than
/// evicted piecemeal.
pub struct NormalizeMemo {
    cache: HashMap<String, Arc<NormalizedText>>,
    capacity: usize,
}

impl NormalizeMemo {
    /// Creates a memo with the production capacity.
    pub fn new() -> Self {
        Self::with_capacity(NORMALIZE_MEMO_CAPACITY)
    }

    /// Creates a memo holding at most `capacity` distinct inputs.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cache: HashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Returns the normalization of `text`, computing it once per distinct
    /// input.
    pub fn normalize(&mut self, text: &str) -> Arc<NormalizedText> {
        if let Some(hit) = self.cache.get(text) {
            return Arc::clone(hit);
        }
        if self.cache.len() >= self.capacity {
            self.cache.clear();
        }
        let fresh = Arc::new(normalize_text_full(text));
        self.cache.insert(text.to_string(), Arc::clone(&fresh));
        fresh
    }

    /// Drops all cached entries.
    pub fn clear(&mut self) {
        self.cache.clear();
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Returns `true` when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

impl Default for NormalizeMemo {
    fn default() -> Self {
        Self::new()
    }
}
