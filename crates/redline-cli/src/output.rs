//! Output formatting for plans, annotate reports, and merge results.
//!
//! Supports both human-readable terminal output and JSON for scripting.

use redline_core::annotate::AnnotateReport;
use redline_core::finding::Finding;
use redline_core::host::InMemoryHost;
use redline_core::plan::{AnnotationPlan, PlanItem};
use serde::Serialize;

/// Maximum characters of snippet text shown per line
const EXCERPT_MAX_LEN: usize = 80;

/// JSON output structure for a plan
#[derive(Serialize)]
pub struct JsonPlan {
    pub items: Vec<JsonPlanItem>,
    pub invalid: usize,
    pub duplicates: usize,
    pub skipped: usize,
    pub truncated: usize,
}

/// Single plan item in JSON output
#[derive(Serialize)]
pub struct JsonPlanItem {
    pub rule_id: String,
    pub start: usize,
    pub end: usize,
    pub occ_idx: usize,
    pub excerpt: String,
}

impl From<&PlanItem> for JsonPlanItem {
    fn from(item: &PlanItem) -> Self {
        Self {
            rule_id: item.rule_id.clone(),
            start: item.start,
            end: item.end,
            occ_idx: item.occ_idx,
            excerpt: truncate_text(&item.norm, EXCERPT_MAX_LEN),
        }
    }
}

/// JSON output structure for an annotate report
#[derive(Serialize)]
pub struct JsonReport {
    pub annotated: usize,
    pub marker_fallbacks: usize,
    pub unanchored: usize,
    pub failed: usize,
    pub invalid: usize,
    pub duplicates: usize,
    pub skipped: usize,
    pub truncated: usize,
    pub methods: Vec<String>,
    pub comments: Vec<JsonInsertion>,
    pub markers: Vec<JsonInsertion>,
}

/// A recorded host insertion in JSON output
#[derive(Serialize)]
pub struct JsonInsertion {
    pub start: Option<usize>,
    pub end: Option<usize>,
    pub message: String,
}

/// Formats a plan as JSON.
pub fn format_plan_json(plan: &AnnotationPlan) -> String {
    let output = JsonPlan {
        items: plan.items.iter().map(JsonPlanItem::from).collect(),
        invalid: plan.invalid,
        duplicates: plan.duplicates,
        skipped: plan.skipped,
        truncated: plan.truncated,
    };
    serde_json::to_string_pretty(&output).unwrap_or_else(|_| "{}".to_string())
}

/// Formats a plan for human-readable terminal output.
pub fn format_plan_human(plan: &AnnotationPlan) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Planned {} annotation{} ({} invalid, {} duplicate, {} skipped, {} truncated)\n",
        plan.items.len(),
        if plan.items.len() == 1 { "" } else { "s" },
        plan.invalid,
        plan.duplicates,
        plan.skipped,
        plan.truncated,
    ));
    for (index, item) in plan.items.iter().enumerate() {
        out.push_str(&format!(
            "\n{:>3}. {} @ {}..{} (occurrence {})\n     {}\n",
            index + 1,
            item.rule_id,
            item.start,
            item.end,
            item.occ_idx,
            truncate_text(&item.norm, EXCERPT_MAX_LEN),
        ));
    }
    out.trim_end().to_string()
}

/// Formats an annotate report as JSON, including the recorded insertions.
pub fn format_report_json(report: &AnnotateReport, host: &InMemoryHost) -> String {
    let output = JsonReport {
        annotated: report.annotated,
        marker_fallbacks: report.marker_fallbacks,
        unanchored: report.unanchored,
        failed: report.failed,
        invalid: report.invalid,
        duplicates: report.duplicates,
        skipped: report.skipped,
        truncated: report.truncated,
        methods: report.methods.iter().map(|m| m.to_string()).collect(),
        comments: host
            .comments()
            .iter()
            .map(|c| JsonInsertion {
                start: Some(c.start),
                end: Some(c.end),
                message: c.message.clone(),
            })
            .collect(),
        markers: host
            .markers()
            .iter()
            .map(|m| JsonInsertion {
                start: m.range.map(|(s, _)| s),
                end: m.range.map(|(_, e)| e),
                message: m.message.clone(),
            })
            .collect(),
    };
    serde_json::to_string_pretty(&output).unwrap_or_else(|_| "{}".to_string())
}

/// Formats an annotate report for human-readable terminal output.
pub fn format_report_human(report: &AnnotateReport, host: &InMemoryHost) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Annotated {} item{} ({} marker fallback{}, {} unanchored, {} failed)\n",
        report.annotated,
        if report.annotated == 1 { "" } else { "s" },
        report.marker_fallbacks,
        if report.marker_fallbacks == 1 { "" } else { "s" },
        report.unanchored,
        report.failed,
    ));
    out.push_str(&format!(
        "Dropped before anchoring: {} invalid, {} duplicate, {} skipped, {} truncated\n",
        report.invalid, report.duplicates, report.skipped, report.truncated,
    ));

    for comment in host.comments() {
        out.push_str(&format!(
            "\ncomment @ {}..{}\n  {}\n",
            comment.start,
            comment.end,
            first_line(&comment.message),
        ));
    }
    for marker in host.markers() {
        match marker.range {
            Some((start, end)) => {
                out.push_str(&format!(
                    "\nmarker @ {}..{}\n  {}\n",
                    start,
                    end,
                    first_line(&marker.message),
                ));
            }
            None => {
                out.push_str(&format!(
                    "\nmarker @ end of document\n  {}\n",
                    first_line(&marker.message)
                ));
            }
        }
    }
    out.trim_end().to_string()
}

/// Formats a merged finding set as JSON.
pub fn format_merge_json(merged: &[Finding]) -> String {
    serde_json::to_string_pretty(merged).unwrap_or_else(|_| "[]".to_string())
}

/// Formats a merge result for human-readable terminal output.
pub fn format_merge_human(base: &[Finding], merged: &[Finding]) -> String {
    let appended = merged.len() - base.len();
    let mut out = String::new();
    out.push_str(&format!(
        "Merged into {} finding{} ({} base slot{}, {} appended)\n",
        merged.len(),
        if merged.len() == 1 { "" } else { "s" },
        base.len(),
        if base.len() == 1 { "" } else { "s" },
        appended,
    ));
    for finding in merged {
        let span = match (finding.start, finding.end) {
            (Some(start), Some(end)) => format!("{}..{}", start, end),
            (Some(start), None) => format!("{}..", start),
            _ => "?".to_string(),
        };
        out.push_str(&format!(
            "  {} @ {} [{}]{}\n",
            finding.rule_id,
            span,
            finding
                .severity
                .map(|s| format!("{:?}", s).to_lowercase())
                .unwrap_or_else(|| "medium".to_string()),
            finding
                .source
                .as_deref()
                .map(|s| format!(" ({})", s))
                .unwrap_or_default(),
        ));
    }
    out.trim_end().to_string()
}

fn first_line(message: &str) -> &str {
    message.lines().next().unwrap_or("")
}

fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_len).collect();
    format!("{}...", cut.trim_end())
}
