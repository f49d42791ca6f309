//! Error types for redline-core.
//!
//! Malformed findings are never represented as errors: the planner and
//! merge reconciler count and skip them. Errors exist only at the host
//! boundary (search and mutation round-trips) and for host API contract
//! violations that the annotate cycle cannot absorb.

use thiserror::Error;

/// Errors surfaced by document host round-trips.
///
/// Search and mutation failures are caught at their call sites, logged, and
/// demoted to "no match" / fallback behavior. Only `ContractViolation`
/// escapes the annotate cycle.
#[derive(Debug, Clone, Error)]
pub enum HostError {
    /// The host search primitive failed (network, API, timeout)
    #[error("Search failed: {0}")]
    SearchFailed(String),
    /// Comment insertion on a resolved range failed
    #[error("Comment insertion failed: {0}")]
    CommentFailed(String),
    /// Content-control marker insertion failed
    #[error("Marker insertion failed: {0}")]
    MarkerFailed(String),
    /// Registering a range with the host's object tracker failed
    #[error("Range tracking failed: {0}")]
    TrackingFailed(String),
    /// The host returned data violating its own API contract
    #[error("Host API contract violation: {0}")]
    ContractViolation(String),
}

/// Errors that can abort a whole annotate cycle.
///
/// Callers must treat an error from the annotate operation as "zero items
/// annotated": partial host mutations may exist but are not reported.
#[derive(Debug, Clone, Error)]
pub enum AnnotateError {
    /// An unexpected host API contract violation
    #[error("Host contract violation: {0}")]
    HostContract(String),
}

impl From<HostError> for AnnotateError {
    fn from(err: HostError) -> Self {
        AnnotateError::HostContract(err.to_string())
    }
}
