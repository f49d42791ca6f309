//! # Redline Core
//!
//! Platform-independent library for anchoring machine-generated review
//! findings onto passages of a live, mutable rich-text document.
//!
//! Findings arrive from a backend analysis service as `(rule id, snippet,
//! character offsets, severity)` records. This crate decides which findings
//! may be safely annotated without overlapping, locates each one in the host
//! document through a multi-strategy fallback chain, and merges incremental
//! re-check results into the original finding set without disturbing
//! previously accepted annotations.
//!
//! ## Modules
//!
//! - [`normalize`] - Lossy Unicode canonicalization with an inverse offset map
//! - [`occurrence`] - Raw offset to nth-occurrence index conversion
//! - [`finding`] - Backend finding schema, severity/agenda ranks, merge keys
//! - [`dedupe`] - Key-based finding deduplication with severity precedence
//! - [`plan`] - Greedy non-overlapping annotation planning
//! - [`host`] - Document host capability traits and the in-memory test host
//! - [`anchor`] - Multi-strategy anchor resolution against a host document
//! - [`annotate`] - The sequential plan-resolve-insert annotation cycle
//! - [`merge`] - Priority-ordered reconciliation of base and QA finding sets
//! - [`config`] - Production configuration constants
//! - [`error`] - Error types for host calls and the annotate cycle
//!
//! ## Key invariants
//!
//! - Normalization is idempotent and its offset map always matches the
//!   normalized text length, character for character.
//! - Plans are non-overlapping by declared offsets; resolved anchors are
//!   re-checked against live positions before any mutation.
//! - Merging never re-sorts: base slots are preserved, replacements happen
//!   in place, and genuinely new findings append in arrival order.
//! - Malformed findings are counted and skipped, never fatal. Host call
//!   failures demote to the next resolution strategy, never abort a batch.
//!
//! ## Data flow
//!
//! raw findings -> [`dedupe`] -> [`plan`] -> ordered plan -> [`anchor`]
//! (host search round-trips) -> comment/marker insertion. Independently:
//! base + QA findings -> [`merge`] -> updated set -> next annotate cycle.

pub mod anchor;
pub mod annotate;
pub mod config;
pub mod dedupe;
pub mod error;
pub mod finding;
pub mod host;
pub mod merge;
pub mod normalize;
pub mod occurrence;
pub mod plan;
