//! Multi-strategy anchor resolution against a host document.
//!
//! Given a plan item, resolution walks an ordered chain of strategies,
//! each strictly cheaper and weaker than the last, short-circuiting on the
//! first acceptance:
//!
//! 1. **Offset**: among all candidate ranges for the raw snippet, its full
//!    normalization, and the derived candidate strings, the range whose
//!    start is numerically closest to the declared start, accepted within
//!    a drift tolerance of `max(5, expected length)`.
//! 2. **Nth**: the `occ_idx`-th host result for the raw snippet (falling
//!    back to its normalization when the raw query matches nothing).
//! 3. **Normalized**: the nth search repeated for each remaining candidate
//!    string.
//! 4. **Token**: an index-0 search for the snippet's longest alphanumeric
//!    token.
//! 5. **Unanchored**: the caller inserts an end-of-document marker instead.
//!
//! Host search failures are logged and demoted to "no match" so a flaky
//! call advances the chain rather than aborting the batch. Every accepted
//! anchor is re-checked against the ranges already claimed in the same run
//! (half-open intersection); a colliding anchor is rejected outright, a
//! second defense after the planner's declared-offset sweep.

use crate::config::{OFFSET_DRIFT_FLOOR, TOKEN_PREFERRED_LEN, TOKEN_QUERY_MAX_LEN};
use crate::host::{truncate_query, DocumentHost, SearchOptions, SearchRange};
use crate::normalize::{condense_spaces, normalize_intake_text};
use crate::plan::PlanItem;
use tracing::{debug, warn};

/// Which strategy produced an anchor, reported for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionMethod {
    /// Offset-guided match within drift tolerance
    Offset,
    /// Nth-occurrence search on the raw or normalized snippet
    Nth,
    /// Nth-occurrence search on a derived normalized candidate
    Normalized,
    /// Longest-token search
    Token,
    /// No strategy produced an acceptable anchor
    Unanchored,
}

impl std::fmt::Display for ResolutionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ResolutionMethod::Offset => "offset",
            ResolutionMethod::Nth => "nth",
            ResolutionMethod::Normalized => "normalized",
            ResolutionMethod::Token => "token",
            ResolutionMethod::Unanchored => "unanchored",
        };
        f.write_str(label)
    }
}

/// Outcome of resolving one plan item.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// The strategy that produced the anchor (or `Unanchored`)
    pub method: ResolutionMethod,
    /// The accepted live range, if any
    pub range: Option<SearchRange>,
}

/// Resolves plan items against a host document, one at a time.
///
/// Resolution is strictly sequential: each accepted anchor becomes an
/// exclusion zone for every later item in the same run, so items must be
/// resolved in plan order and never concurrently.
pub struct AnchorResolver<'a, H: DocumentHost> {
    host: &'a H,
    offsets_enabled: bool,
    used: Vec<(usize, usize)>,
}

impl<'a, H: DocumentHost> AnchorResolver<'a, H> {
    /// Creates a resolver for one annotate run.
    pub fn new(host: &'a H, offsets_enabled: bool) -> Self {
        Self {
            host,
            offsets_enabled,
            used: Vec::new(),
        }
    }

    /// Resolves one plan item through the strategy chain.
    pub async fn resolve(&mut self, item: &PlanItem) -> Resolution {
        let candidates = normalized_candidates(&item.raw, &item.norm);

        let attempt = self.try_strategies(item, &candidates).await;
        let Some((method, range)) = attempt else {
            debug!(rule = %item.rule_id, "no strategy produced an anchor");
            return Resolution {
                method: ResolutionMethod::Unanchored,
                range: None,
            };
        };

        if self.collides(&range) {
            warn!(
                rule = %item.rule_id,
                start = range.start,
                end = range.end,
                "anchor drifted onto an already-claimed range; skipping"
            );
            return Resolution {
                method: ResolutionMethod::Unanchored,
                range: None,
            };
        }

        if let Err(err) = self.host.track_range(&range).await {
            warn!(error = %err, "range tracking failed; anchor may drift");
        }
        self.used.push((range.start, range.end));
        debug!(rule = %item.rule_id, %method, start = range.start, "anchor accepted");
        Resolution {
            method,
            range: Some(range),
        }
    }

    async fn try_strategies(
        &self,
        item: &PlanItem,
        candidates: &[String],
    ) -> Option<(ResolutionMethod, SearchRange)> {
        if self.offsets_enabled {
            if let Some(range) = self.by_offsets(item, candidates).await {
                return Some((ResolutionMethod::Offset, range));
            }
        }
        if let Some(range) = self.by_nth(item).await {
            return Some((ResolutionMethod::Nth, range));
        }
        if let Some(range) = self.by_normalized(item, candidates).await {
            return Some((ResolutionMethod::Normalized, range));
        }
        if let Some(range) = self.by_token(item).await {
            return Some((ResolutionMethod::Token, range));
        }
        None
    }

    /// Offset-guided match: closest start across all queries, within
    /// `max(OFFSET_DRIFT_FLOOR, expected length)`. Tolerates small
    /// renumbering drift while rejecting unrelated matches.
    async fn by_offsets(&self, item: &PlanItem, candidates: &[String]) -> Option<SearchRange> {
        let expected = item.start;
        let expected_len = item.end.saturating_sub(item.start);

        let mut queries: Vec<&str> = Vec::new();
        for query in [item.raw.as_str(), item.norm.as_str()]
            .into_iter()
            .chain(candidates.iter().map(String::as_str))
        {
            if !query.is_empty() && !queries.contains(&query) {
                queries.push(query);
            }
        }

        let mut best: Option<(usize, SearchRange)> = None;
        for query in queries {
            for hit in host_query(self.host, query).await {
                let dist = hit.start.abs_diff(expected);
                // strict < keeps the earliest hit on distance ties
                if best.as_ref().map_or(true, |(d, _)| dist < *d) {
                    best = Some((dist, hit));
                }
            }
        }

        let (dist, hit) = best?;
        (dist <= OFFSET_DRIFT_FLOOR.max(expected_len)).then_some(hit)
    }

    async fn by_nth(&self, item: &PlanItem) -> Option<SearchRange> {
        let mut hits = host_query(self.host, &item.raw).await;
        if hits.is_empty() && item.norm != item.raw {
            hits = host_query(self.host, &item.norm).await;
        }
        hits.into_iter().nth(item.occ_idx)
    }

    async fn by_normalized(&self, item: &PlanItem, candidates: &[String]) -> Option<SearchRange> {
        for candidate in candidates {
            if candidate == &item.norm {
                continue;
            }
            let hit = host_query(self.host, candidate)
                .await
                .into_iter()
                .nth(item.occ_idx);
            if hit.is_some() {
                return hit;
            }
        }
        None
    }

    async fn by_token(&self, item: &PlanItem) -> Option<SearchRange> {
        let token = longest_token(&item.raw)?;
        host_query(self.host, &token).await.into_iter().next()
    }

    fn collides(&self, range: &SearchRange) -> bool {
        self.used
            .iter()
            .any(|&(start, end)| range.start.max(start) < range.end.min(end))
    }
}

/// Whole-document anchor listing, used when offset-guided resolution is
/// unavailable.
///
/// Searches the raw snippet and its normalization, sorts all matches by
/// `(start, end)`, merges overlapping ranges keeping the longer one (the
/// first wins on exact length ties), and, when `nth` is supplied and in
/// range, rotates that item to the front without disturbing the relative
/// order of the rest. All surviving ranges are registered with the host's
/// object tracker.
pub async fn find_anchors<H: DocumentHost>(
    host: &H,
    snippet: &str,
    nth: Option<usize>,
) -> Vec<SearchRange> {
    let mut matches = host_query(host, snippet).await;
    let norm = normalize_intake_text(snippet);
    if norm != snippet {
        matches.extend(host_query(host, &norm).await);
    }
    matches.sort_by_key(|r| (r.start, r.end));

    let mut pruned: Vec<SearchRange> = Vec::new();
    for hit in matches {
        let overlaps_last = pruned
            .last()
            .map_or(false, |last| last.intersects(hit.start, hit.end));
        if overlaps_last {
            let slot = pruned.len() - 1;
            if hit.len() > pruned[slot].len() {
                pruned[slot] = hit;
            }
        } else {
            pruned.push(hit);
        }
    }

    if let Some(n) = nth {
        if n < pruned.len() {
            let preferred = pruned.remove(n);
            pruned.insert(0, preferred);
        }
    }

    for hit in &pruned {
        if let Err(err) = host.track_range(hit).await {
            warn!(error = %err, "range tracking failed for anchor candidate");
        }
    }
    pruned
}

/// One serialized host search with failures demoted to empty results.
async fn host_query<H: DocumentHost>(host: &H, text: &str) -> Vec<SearchRange> {
    let query = truncate_query(text);
    if query.is_empty() {
        return Vec::new();
    }
    match host.search(query, SearchOptions::default()).await {
        Ok(hits) => hits,
        Err(err) => {
            warn!(error = %err, "host search failed; treating as no match");
            Vec::new()
        }
    }
}

/// Candidate query strings derived from a snippet: its full normalization
/// first, then looser variants that survive hosts which preserved layout
/// the full pipeline folds away.
fn normalized_candidates(raw: &str, norm: &str) -> Vec<String> {
    let mut out = vec![norm.to_string()];
    for variant in [condense_spaces(raw), raw.trim().to_string()] {
        if !variant.is_empty() && variant != raw && !out.contains(&variant) {
            out.push(variant);
        }
    }
    out
}

/// The longest alphanumeric token of the snippet, preferring tokens of at
/// least [`TOKEN_PREFERRED_LEN`] chars, truncated to
/// [`TOKEN_QUERY_MAX_LEN`].
fn longest_token(snippet: &str) -> Option<String> {
    let mut longest: Option<&str> = None;
    let mut longest_preferred: Option<&str> = None;
    for token in snippet.split(|c: char| !c.is_alphanumeric()) {
        if token.is_empty() {
            continue;
        }
        let len = token.chars().count();
        if longest.map_or(true, |best| len > best.chars().count()) {
            longest = Some(token);
        }
        if len >= TOKEN_PREFERRED_LEN
            && longest_preferred.map_or(true, |best| len > best.chars().count())
        {
            longest_preferred = Some(token);
        }
    }
    let token = longest_preferred.or(longest)?;
    Some(token.chars().take(TOKEN_QUERY_MAX_LEN).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HostError;
    use crate::host::{InMemoryHost, RangeId};

    fn item(raw: &str, occ_idx: usize, start: usize, end: usize) -> PlanItem {
        PlanItem {
            raw: raw.to_string(),
            norm: normalize_intake_text(raw),
            occ_idx,
            nth: None,
            start,
            end,
            message: String::new(),
            rule_id: "r1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_offset_match_short_circuits() {
        let host = InMemoryHost::new("pay now or pay now later");
        let mut resolver = AnchorResolver::new(&host, true);

        // declared start sits on the second occurrence (char 11)
        let resolution = resolver.resolve(&item("pay now", 0, 11, 18)).await;
        assert_eq!(resolution.method, ResolutionMethod::Offset);
        assert_eq!(resolution.range.unwrap().start, 11);
    }

    #[tokio::test]
    async fn test_offset_tolerates_small_drift() {
        let host = InMemoryHost::new("xx pay now");
        let mut resolver = AnchorResolver::new(&host, true);

        // declared start 0, actual 3: within max(5, len)
        let resolution = resolver.resolve(&item("pay now", 0, 0, 7)).await;
        assert_eq!(resolution.method, ResolutionMethod::Offset);
        assert_eq!(resolution.range.unwrap().start, 3);
    }

    #[tokio::test]
    async fn test_offset_rejects_distant_match_and_falls_back() {
        let filler = "z ".repeat(40);
        let host = InMemoryHost::new(&format!("{}pay", filler));
        let mut resolver = AnchorResolver::new(&host, true);

        // declared start 0, actual 80: beyond max(5, 3) so the offset
        // strategy must refuse; nth search then takes occurrence 0
        let resolution = resolver.resolve(&item("pay", 0, 0, 3)).await;
        assert_eq!(resolution.method, ResolutionMethod::Nth);
        assert_eq!(resolution.range.unwrap().start, 80);
    }

    #[tokio::test]
    async fn test_nth_selects_occurrence_when_offsets_disabled() {
        let host = InMemoryHost::new("cap cap cap");
        let mut resolver = AnchorResolver::new(&host, false);

        let resolution = resolver.resolve(&item("cap", 2, 8, 11)).await;
        assert_eq!(resolution.method, ResolutionMethod::Nth);
        assert_eq!(resolution.range.unwrap().start, 8);
    }

    #[tokio::test]
    async fn test_nth_out_of_range_falls_through_to_token() {
        let host = InMemoryHost::new("only one cap here");
        let mut resolver = AnchorResolver::new(&host, false);

        // occurrence 3 does not exist; the token strategy still lands on
        // the single physical occurrence
        let resolution = resolver.resolve(&item("cap", 3, 9, 12)).await;
        assert_eq!(resolution.method, ResolutionMethod::Token);
        assert_eq!(resolution.range.unwrap().start, 9);
    }

    #[tokio::test]
    async fn test_unanchored_when_nothing_matches() {
        let host = InMemoryHost::new("entirely unrelated prose");
        let mut resolver = AnchorResolver::new(&host, false);

        let resolution = resolver.resolve(&item("severability", 0, 0, 12)).await;
        assert_eq!(resolution.method, ResolutionMethod::Unanchored);
        assert!(resolution.range.is_none());
    }

    #[tokio::test]
    async fn test_normalized_candidate_resolves_layout_drift() {
        // the host body kept an interior space run the normalizer folds
        let host = InMemoryHost::new("pay   now");
        let mut resolver = AnchorResolver::new(&host, false);

        let resolution = resolver.resolve(&item(" pay   now ", 0, 0, 9)).await;
        assert_eq!(resolution.method, ResolutionMethod::Normalized);
        assert_eq!(resolution.range.unwrap().start, 0);
    }

    #[tokio::test]
    async fn test_token_fallback() {
        let host = InMemoryHost::new("see the Indemnification section");
        let mut resolver = AnchorResolver::new(&host, false);

        // neither the snippet nor its variants appear, but its longest
        // token does
        let resolution = resolver
            .resolve(&item("broad Indemnification duties", 0, 0, 28))
            .await;
        assert_eq!(resolution.method, ResolutionMethod::Token);
        let range = resolution.range.unwrap();
        assert_eq!(range.start, 8);
        assert_eq!(range.len(), "Indemnification".chars().count());
    }

    #[tokio::test]
    async fn test_colliding_anchor_is_rejected() {
        let host = InMemoryHost::new("the sole liability clause");
        let mut resolver = AnchorResolver::new(&host, false);

        let first = resolver.resolve(&item("liability", 0, 9, 18)).await;
        assert!(first.range.is_some());

        // a second item drifting onto the same physical range is skipped
        let second = resolver.resolve(&item("liability", 0, 40, 49)).await;
        assert_eq!(second.method, ResolutionMethod::Unanchored);
        assert!(second.range.is_none());
    }

    #[tokio::test]
    async fn test_accepted_anchors_are_tracked() {
        let host = InMemoryHost::new("cap and cap");
        let mut resolver = AnchorResolver::new(&host, false);
        resolver.resolve(&item("cap", 0, 0, 3)).await;
        resolver.resolve(&item("cap", 1, 8, 11)).await;
        assert_eq!(host.tracked_count(), 2);
    }

    #[tokio::test]
    async fn test_search_failure_advances_the_chain() {
        struct FailingSearchHost {
            inner: InMemoryHost,
            failures: std::cell::Cell<usize>,
        }

        #[async_trait::async_trait(?Send)]
        impl DocumentHost for FailingSearchHost {
            async fn search(
                &self,
                query: &str,
                options: SearchOptions,
            ) -> Result<Vec<SearchRange>, HostError> {
                if self.failures.get() > 0 {
                    self.failures.set(self.failures.get() - 1);
                    return Err(HostError::SearchFailed("simulated timeout".into()));
                }
                self.inner.search(query, options).await
            }
            async fn insert_comment(
                &self,
                range: &SearchRange,
                message: &str,
            ) -> Result<(), HostError> {
                self.inner.insert_comment(range, message).await
            }
            async fn insert_marker(
                &self,
                range: Option<&SearchRange>,
                message: &str,
            ) -> Result<(), HostError> {
                self.inner.insert_marker(range, message).await
            }
            async fn track_range(&self, range: &SearchRange) -> Result<(), HostError> {
                self.inner.track_range(range).await
            }
        }

        let host = FailingSearchHost {
            inner: InMemoryHost::new("pay now"),
            failures: std::cell::Cell::new(1),
        };
        let mut resolver = AnchorResolver::new(&host, false);

        // the raw query fails; the normalized fallback within the nth
        // strategy still lands
        let resolution = resolver.resolve(&item("pay\u{00A0}now", 0, 0, 7)).await;
        assert_eq!(resolution.method, ResolutionMethod::Nth);
        assert!(resolution.range.is_some());
    }

    #[tokio::test]
    async fn test_find_anchors_returns_sorted_spans() {
        let host = InMemoryHost::new("cap fits, capped fits");
        let anchors = find_anchors(&host, "cap", None).await;
        let spans: Vec<(usize, usize)> = anchors.iter().map(|r| (r.start, r.end)).collect();
        assert_eq!(spans, vec![(0, 3), (10, 13)]);
    }

    #[tokio::test]
    async fn test_find_anchors_merges_overlaps_keeping_longer() {
        struct OverlappingHost;

        #[async_trait::async_trait(?Send)]
        impl DocumentHost for OverlappingHost {
            async fn search(
                &self,
                _query: &str,
                _options: SearchOptions,
            ) -> Result<Vec<SearchRange>, HostError> {
                Ok(vec![
                    SearchRange { start: 4, end: 9, id: RangeId(2) },
                    SearchRange { start: 0, end: 5, id: RangeId(1) },
                    SearchRange { start: 0, end: 3, id: RangeId(0) },
                    SearchRange { start: 12, end: 15, id: RangeId(3) },
                ])
            }
            async fn insert_comment(
                &self,
                _range: &SearchRange,
                _message: &str,
            ) -> Result<(), HostError> {
                Ok(())
            }
            async fn insert_marker(
                &self,
                _range: Option<&SearchRange>,
                _message: &str,
            ) -> Result<(), HostError> {
                Ok(())
            }
            async fn track_range(&self, _range: &SearchRange) -> Result<(), HostError> {
                Ok(())
            }
        }

        let anchors = find_anchors(&OverlappingHost, "clause", None).await;
        let spans: Vec<(usize, usize)> = anchors.iter().map(|r| (r.start, r.end)).collect();
        // (0,3) grows to the longer (0,5); (4,9) ties that length and the
        // incumbent wins; (12,15) stands alone
        assert_eq!(spans, vec![(0, 5), (12, 15)]);
    }

    #[tokio::test]
    async fn test_find_anchors_rotates_nth_to_front() {
        let host = InMemoryHost::new("cap one cap two cap three");
        let anchors = find_anchors(&host, "cap", Some(1)).await;
        let starts: Vec<usize> = anchors.iter().map(|r| r.start).collect();
        assert_eq!(starts, vec![8, 0, 16]);
        assert_eq!(host.tracked_count(), 3);
    }

    #[tokio::test]
    async fn test_find_anchors_out_of_range_nth_is_ignored() {
        let host = InMemoryHost::new("one cap only");
        let anchors = find_anchors(&host, "cap", Some(5)).await;
        assert_eq!(anchors.len(), 1);
        assert_eq!(anchors[0].start, 4);
    }

    #[test]
    fn test_longest_token_prefers_long_tokens() {
        assert_eq!(
            longest_token("the Indemnification of all claims"),
            Some("Indemnification".to_string())
        );
        // nothing reaches the preferred length: longest available wins
        assert_eq!(longest_token("a bb ccc"), Some("ccc".to_string()));
        assert_eq!(longest_token("--- !!! ---"), None);
    }

    #[test]
    fn test_longest_token_is_truncated() {
        let long = "x".repeat(100);
        let token = longest_token(&long).unwrap();
        assert_eq!(token.chars().count(), TOKEN_QUERY_MAX_LEN);
    }

    #[test]
    fn test_normalized_candidates_are_distinct_and_nonempty() {
        let candidates = normalized_candidates(" pay   now ", "pay now");
        assert_eq!(candidates[0], "pay now");
        assert!(candidates.contains(&"pay   now".to_string()));
        assert!(!candidates.iter().any(|c| c.is_empty()));
        // a snippet already in canonical form derives nothing extra
        assert_eq!(normalized_candidates("plain", "plain"), vec!["plain"]);
    }
}
