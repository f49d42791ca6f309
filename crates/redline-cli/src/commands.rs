//! Command execution: file loading and calls into redline-core.

use crate::output;
use anyhow::{Context, Result};
use redline_core::annotate::{annotate_findings, AnnotateOptions};
use redline_core::finding::Finding;
use redline_core::host::InMemoryHost;
use redline_core::merge::merge_qa_findings;
use redline_core::plan::plan_annotations;
use std::path::Path;

fn load_document(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read document {}", path.display()))
}

fn load_findings(path: &Path) -> Result<Vec<Finding>> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read findings {}", path.display()))?;
    serde_json::from_str(&data)
        .with_context(|| format!("Failed to parse findings {}", path.display()))
}

/// Plans annotations and prints the plan with its diagnostic counts.
pub fn run_plan(document: &Path, findings: &Path, json: bool) -> Result<()> {
    let text = load_document(document)?;
    let findings = load_findings(findings)?;
    let plan = plan_annotations(&findings, &text);

    let rendered = if json {
        output::format_plan_json(&plan)
    } else {
        output::format_plan_human(&plan)
    };
    println!("{}", rendered);
    Ok(())
}

/// Runs a full annotate cycle against an in-memory host over the document.
pub async fn run_annotate(
    document: &Path,
    findings: &Path,
    offsets_enabled: bool,
    json: bool,
) -> Result<()> {
    let text = load_document(document)?;
    let findings = load_findings(findings)?;

    let host = InMemoryHost::new(&text);
    let report = annotate_findings(&host, &text, &findings, AnnotateOptions { offsets_enabled })
        .await
        .context("Annotate cycle aborted; treat as zero items annotated")?;

    let rendered = if json {
        output::format_report_json(&report, &host)
    } else {
        output::format_report_human(&report, &host)
    };
    println!("{}", rendered);
    Ok(())
}

/// Merges a QA finding set into a base set and prints the result.
pub fn run_merge(base: &Path, qa: &Path, json: bool) -> Result<()> {
    let base = load_findings(base)?;
    let qa = load_findings(qa)?;
    let merged = merge_qa_findings(&base, &qa);

    let rendered = if json {
        output::format_merge_json(&merged)
    } else {
        output::format_merge_human(&base, &merged)
    };
    println!("{}", rendered);
    Ok(())
}
