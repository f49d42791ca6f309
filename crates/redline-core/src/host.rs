//! Document host capability traits.
//!
//! This module abstracts the host document behind a small capability
//! interface: a text-search primitive returning ordered candidate ranges,
//! two mutation primitives (comment on a range, content-control marker),
//! and the host's range-tracking registry. Implementations differ per host
//! (a Word add-in bridge, a DOM proxy, the in-memory double below); the
//! anchor resolver depends only on the trait.
//!
//! Host round-trips are serialized: callers await each call before issuing
//! the next against the same document session.

use crate::config::QUERY_LADDER;
use crate::error::HostError;
use std::collections::HashSet;
use std::sync::RwLock;

/// Options forwarded to the host search primitive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchOptions {
    /// Require exact case matches
    pub match_case: bool,
    /// Only match at word boundaries
    pub match_whole_word: bool,
}

/// Opaque handle to a live host range. Owned by the host; this crate only
/// compares offsets and passes the handle back for mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RangeId(pub u64);

/// A live document range returned by the host search primitive.
///
/// Offsets are character indices into the host body at the time of the
/// search; they may drift as the document mutates, which is why accepted
/// ranges must be registered via [`DocumentHost::track_range`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchRange {
    /// Start offset (inclusive)
    pub start: usize,
    /// End offset (exclusive)
    pub end: usize,
    /// Host handle for follow-up operations on this range
    pub id: RangeId,
}

impl SearchRange {
    /// Character length of the range.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Returns `true` for zero-length ranges.
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Half-open interval intersection test.
    pub fn intersects(&self, start: usize, end: usize) -> bool {
        self.start.max(start) < self.end.min(end)
    }
}

/// Capability interface onto the host document.
///
/// Each method is one serialized round-trip. Failures are per-call: a
/// failed search means "no candidates from this query", and a failed
/// comment insertion triggers the marker fallback; neither aborts a batch.
#[async_trait::async_trait(?Send)]
pub trait DocumentHost {
    /// Searches the document body for `query`, returning candidate ranges
    /// in host order.
    #[must_use = "Search failures should demote to the next strategy"]
    async fn search(
        &self,
        query: &str,
        options: SearchOptions,
    ) -> Result<Vec<SearchRange>, HostError>;

    /// Inserts a comment anchored to `range`.
    #[must_use = "Comment failures should fall back to a marker"]
    async fn insert_comment(&self, range: &SearchRange, message: &str) -> Result<(), HostError>;

    /// Inserts an inline content-control marker. `None` places the marker
    /// at the end of the document (the unanchored fallback).
    #[must_use = "Marker failures should be logged"]
    async fn insert_marker(
        &self,
        range: Option<&SearchRange>,
        message: &str,
    ) -> Result<(), HostError>;

    /// Registers a range with the host's object tracker so it stays valid
    /// across subsequent host synchronization calls.
    #[must_use = "Tracking failures should be logged"]
    async fn track_range(&self, range: &SearchRange) -> Result<(), HostError>;
}

/// Deterministically truncates an over-length query at a word/punctuation
/// boundary.
///
/// Rungs of [`QUERY_LADDER`] are tried longest-first; a rung is used when a
/// boundary exists in the window above the next rung, so boundaries at or
/// after position 120 win over shorter cuts. When the query contains no
/// boundary at all, it is cut hard at the shortest rung.
pub fn truncate_query(query: &str) -> &str {
    let chars: Vec<(usize, char)> = query.char_indices().collect();
    if chars.len() <= QUERY_LADDER[0] {
        return query;
    }

    for (i, &rung) in QUERY_LADDER.iter().enumerate() {
        let floor = QUERY_LADDER.get(i + 1).copied().unwrap_or(0);
        let mut cut = rung;
        while cut > floor {
            if !chars[cut].1.is_alphanumeric() {
                return query[..chars[cut].0].trim_end();
            }
            cut -= 1;
        }
    }

    let hard = QUERY_LADDER[QUERY_LADDER.len() - 1];
    &query[..chars[hard].0]
}

/// Record of a comment inserted into the in-memory host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertedComment {
    pub start: usize,
    pub end: usize,
    pub message: String,
}

/// Record of a content-control marker inserted into the in-memory host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertedMarker {
    /// Anchored span, or `None` for the end-of-document fallback
    pub range: Option<(usize, usize)>,
    pub message: String,
}

#[derive(Default)]
struct HostState {
    next_range_id: u64,
    tracked: HashSet<RangeId>,
    comments: Vec<InsertedComment>,
    markers: Vec<InsertedMarker>,
}

/// In-memory document host for tests and the CLI.
///
/// Searches are literal, character-indexed, non-overlapping substring
/// scans over a fixed body (case-insensitive unless `match_case` is set).
/// Mutations are recorded rather than applied, so tests can assert exactly
/// what a cycle would have done to a real host.
pub struct InMemoryHost {
    body: Vec<char>,
    state: RwLock<HostState>,
}

impl InMemoryHost {
    /// Creates a host over a fixed document body.
    pub fn new(body: &str) -> Self {
        Self {
            body: body.chars().collect(),
            state: RwLock::new(HostState::default()),
        }
    }

    /// Comments recorded so far, in insertion order.
    pub fn comments(&self) -> Vec<InsertedComment> {
        self.state.read().expect("host state poisoned").comments.clone()
    }

    /// Markers recorded so far, in insertion order.
    pub fn markers(&self) -> Vec<InsertedMarker> {
        self.state.read().expect("host state poisoned").markers.clone()
    }

    /// Number of ranges registered with the object tracker.
    pub fn tracked_count(&self) -> usize {
        self.state.read().expect("host state poisoned").tracked.len()
    }

    /// Character length of the document body.
    pub fn body_len(&self) -> usize {
        self.body.len()
    }

    fn fresh_id(&self) -> RangeId {
        let mut state = self.state.write().expect("host state poisoned");
        let id = RangeId(state.next_range_id);
        state.next_range_id += 1;
        id
    }

    fn char_matches(&self, pos: usize, query: &[char], match_case: bool) -> bool {
        if pos + query.len() > self.body.len() {
            return false;
        }
        self.body[pos..pos + query.len()]
            .iter()
            .zip(query.iter())
            .all(|(a, b)| {
                if match_case {
                    a == b
                } else {
                    fold_case(*a) == fold_case(*b)
                }
            })
    }

    fn is_word_boundary(&self, index: Option<usize>) -> bool {
        match index {
            Some(i) => self
                .body
                .get(i)
                .map_or(true, |c| !c.is_alphanumeric()),
            None => true,
        }
    }
}

fn fold_case(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

#[async_trait::async_trait(?Send)]
impl DocumentHost for InMemoryHost {
    async fn search(
        &self,
        query: &str,
        options: SearchOptions,
    ) -> Result<Vec<SearchRange>, HostError> {
        let needle: Vec<char> = query.chars().collect();
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        let mut hits = Vec::new();
        let mut pos = 0;
        while pos + needle.len() <= self.body.len() {
            let matched = self.char_matches(pos, &needle, options.match_case)
                && (!options.match_whole_word
                    || (self.is_word_boundary(pos.checked_sub(1))
                        && self.is_word_boundary(Some(pos + needle.len()))));
            if matched {
                hits.push(SearchRange {
                    start: pos,
                    end: pos + needle.len(),
                    id: self.fresh_id(),
                });
                pos += needle.len();
            } else {
                pos += 1;
            }
        }
        Ok(hits)
    }

    async fn insert_comment(&self, range: &SearchRange, message: &str) -> Result<(), HostError> {
        if range.end < range.start || range.end > self.body.len() {
            return Err(HostError::CommentFailed(format!(
                "range {}..{} outside body of {} chars",
                range.start,
                range.end,
                self.body.len()
            )));
        }
        let mut state = self.state.write().expect("host state poisoned");
        state.comments.push(InsertedComment {
            start: range.start,
            end: range.end,
            message: message.to_string(),
        });
        Ok(())
    }

    async fn insert_marker(
        &self,
        range: Option<&SearchRange>,
        message: &str,
    ) -> Result<(), HostError> {
        let mut state = self.state.write().expect("host state poisoned");
        state.markers.push(InsertedMarker {
            range: range.map(|r| (r.start, r.end)),
            message: message.to_string(),
        });
        Ok(())
    }

    async fn track_range(&self, range: &SearchRange) -> Result<(), HostError> {
        let mut state = self.state.write().expect("host state poisoned");
        state.tracked.insert(range.id);
        Ok(())
    }
}
