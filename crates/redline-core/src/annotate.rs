//! The sequential plan-resolve-insert annotation cycle.
//!
//! This module assembles the pipeline the rest of the crate exists for:
//! plan the findings, resolve each accepted item against the host, and
//! insert a comment on every resolved range, falling back to an inline
//! content-control marker when the comment fails and to an end-of-document
//! marker when no anchor was found at all.
//!
//! Resolution is strictly sequential: each host round-trip completes
//! before the next begins, and every accepted anchor narrows the overlap
//! exclusion for the items after it. Host failures are absorbed per item;
//! only a host API contract violation aborts the cycle, and callers must
//! then treat the whole operation as having annotated nothing.

use crate::anchor::{AnchorResolver, ResolutionMethod};
use crate::error::AnnotateError;
use crate::finding::Finding;
use crate::host::DocumentHost;
use crate::plan::plan_annotations;
use tracing::{info, instrument, warn};

/// Options for one annotate cycle.
#[derive(Debug, Clone, Copy)]
pub struct AnnotateOptions {
    /// Attempt offset-guided resolution before the occurrence strategies
    pub offsets_enabled: bool,
}

impl Default for AnnotateOptions {
    fn default() -> Self {
        Self {
            offsets_enabled: true,
        }
    }
}

/// Diagnostic summary of one annotate cycle.
#[derive(Debug, Clone, Default)]
pub struct AnnotateReport {
    /// Items annotated with a comment on their resolved range
    pub annotated: usize,
    /// Items whose comment failed but whose range took a marker instead
    pub marker_fallbacks: usize,
    /// Items that ended unanchored and received an end-of-document marker
    pub unanchored: usize,
    /// Items whose every insertion attempt failed
    pub failed: usize,
    /// Findings dropped by deduplication for unusable spans
    pub invalid: usize,
    /// Findings collapsed into an already-seen identity key
    pub duplicates: usize,
    /// Findings rejected by the planner sweep
    pub skipped: usize,
    /// Findings excluded after the plan reached its cap
    pub truncated: usize,
    /// Resolution method per plan item, in plan order
    pub methods: Vec<ResolutionMethod>,
}

/// Runs one full annotate cycle against a host document.
#[instrument(skip_all, fields(findings = findings.len()))]
pub async fn annotate_findings<H: DocumentHost>(
    host: &H,
    base_text: &str,
    findings: &[Finding],
    options: AnnotateOptions,
) -> Result<AnnotateReport, AnnotateError> {
    let plan = plan_annotations(findings, base_text);
    let mut report = AnnotateReport {
        invalid: plan.invalid,
        duplicates: plan.duplicates,
        skipped: plan.skipped,
        truncated: plan.truncated,
        ..AnnotateReport::default()
    };

    let mut resolver = AnchorResolver::new(host, options.offsets_enabled);
    for item in &plan.items {
        let resolution = resolver.resolve(item).await;
        match &resolution.range {
            Some(range) => {
                if range.end < range.start {
                    return Err(AnnotateError::HostContract(format!(
                        "host returned inverted range {}..{}",
                        range.start, range.end
                    )));
                }
                match host.insert_comment(range, &item.message).await {
                    Ok(()) => report.annotated += 1,
                    Err(err) => {
                        warn!(
                            rule = %item.rule_id,
                            error = %err,
                            "comment insertion failed; falling back to marker"
                        );
                        match host.insert_marker(Some(range), &item.message).await {
                            Ok(()) => report.marker_fallbacks += 1,
                            Err(err) => {
                                warn!(rule = %item.rule_id, error = %err, "marker fallback failed");
                                report.failed += 1;
                            }
                        }
                    }
                }
            }
            None => match host.insert_marker(None, &item.message).await {
                Ok(()) => report.unanchored += 1,
                Err(err) => {
                    warn!(rule = %item.rule_id, error = %err, "end-of-document marker failed");
                    report.failed += 1;
                }
            },
        }
        report.methods.push(resolution.method);
    }

    info!(
        annotated = report.annotated,
        marker_fallbacks = report.marker_fallbacks,
        unanchored = report.unanchored,
        skipped = report.skipped,
        truncated = report.truncated,
        "annotate cycle finished"
    );
    Ok(report)
}
