//! Redline CLI - annotation planning and merging from the command line.
//!
//! # Usage
//!
//! ```bash
//! # Plan annotations for a findings file against a document
//! redline plan --document contract.txt --findings findings.json
//!
//! # Run a full annotate cycle against an in-memory host
//! redline annotate --document contract.txt --findings findings.json
//!
//! # Merge a QA recheck into a base finding set
//! redline merge --base findings.json --qa recheck.json
//!
//! # JSON output for scripting
//! redline plan --document contract.txt --findings findings.json --json
//! ```

mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Redline annotation CLI.
///
/// Plans, anchors, and merges backend review findings against a plain-text
/// document, using an in-memory host in place of a live document session.
#[derive(Parser)]
#[command(name = "redline", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Output results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Plan annotations without touching a host document
    Plan {
        /// Path to the analyzed document text
        #[arg(long)]
        document: PathBuf,
        /// Path to the findings JSON array
        #[arg(long)]
        findings: PathBuf,
    },
    /// Run a full annotate cycle against an in-memory host
    Annotate {
        /// Path to the analyzed document text
        #[arg(long)]
        document: PathBuf,
        /// Path to the findings JSON array
        #[arg(long)]
        findings: PathBuf,
        /// Disable offset-guided anchoring (occurrence strategies only)
        #[arg(long)]
        no_offsets: bool,
    },
    /// Merge a QA findings file into a base findings file
    Merge {
        /// Path to the base findings JSON array
        #[arg(long)]
        base: PathBuf,
        /// Path to the QA findings JSON array
        #[arg(long)]
        qa: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match cli.command {
        Command::Plan { document, findings } => commands::run_plan(&document, &findings, cli.json),
        Command::Annotate {
            document,
            findings,
            no_offsets,
        } => commands::run_annotate(&document, &findings, !no_offsets, cli.json).await,
        Command::Merge { base, qa } => commands::run_merge(&base, &qa, cli.json),
    }
}
