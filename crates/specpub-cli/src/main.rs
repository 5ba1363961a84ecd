//! specpub - validate an OpenAPI spec and publish it to ReadMe
//!
//! ## Commands
//!
//! - `run`: resolve a spec, validate it, and upload it under a ReadMe version
//!
//! Exit codes: 0 success (or dry run), 1 validation failure,
//! 2 resolution/environment failure, 3 upload/API failure.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use specpub_core::{
    config, telemetry, OutcomeStatus, Orchestrator, PublishConfig, PublishDecision, RunLogger, RunRecord,
    RunReport, RunRequest, ValidatorSelection,
};
use tracing::debug;

#[derive(Parser)]
#[command(name = "specpub")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Validate OpenAPI specs and publish them to ReadMe", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a spec and upload it under a ReadMe version
    Run {
        /// Spec name in the API repository (or a file path with --local)
        filename: String,

        /// ReadMe version to publish under, e.g. 2025.1.5
        version: String,

        /// Validate only; never contact ReadMe
        #[arg(long)]
        dry_run: bool,

        /// Treat FILENAME as a path on the local filesystem
        #[arg(long)]
        local: bool,

        /// Checkers to run (prompted for when omitted)
        #[arg(long, env = "SPECPUB_VALIDATOR")]
        validator: Option<ValidatorSelection>,

        /// Fail instead of creating a missing version
        #[arg(long)]
        no_create_version: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    specpub_core::init_tracing(cli.json, telemetry::level_for(cli.verbose));

    let code = match cli.command {
        Commands::Run {
            filename,
            version,
            dry_run,
            local,
            validator,
            no_create_version,
        } => {
            let request = RunRequest {
                name: filename,
                version,
                dry_run,
                local,
                selection: validator.or_else(|| {
                    let stdin = io::stdin();
                    prompt_selection(stdin.lock(), io::stdout())
                }),
            };
            cmd_run(request, no_create_version).await
        }
    };

    std::process::exit(code);
}

async fn cmd_run(request: RunRequest, no_create_version: bool) -> i32 {
    let mut config = match PublishConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            let report = record_setup_failure(
                &request,
                format!("configuration error: {:#}", e),
                config::log_file_from_env(),
            );
            return finish(&report);
        }
    };
    if no_create_version {
        config.create_missing_version = false;
    }
    debug!(repo_root = %config.repo_root.display(), api = %config.api_base_url, "loaded configuration");

    let orchestrator = match Orchestrator::from_config(&config) {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            let report = record_setup_failure(
                &request,
                format!("setup error: {:#}", e),
                config.log_file.clone(),
            );
            return finish(&report);
        }
    };

    let report = orchestrator.run(&request).await;
    finish(&report)
}

/// Log a run that failed before the orchestrator existed.
fn record_setup_failure(request: &RunRequest, message: String, log_file: PathBuf) -> RunReport {
    let report = RunReport::setup_failure(request, message);
    RunLogger::new(log_file).record(&RunRecord::new(report.clone()));
    report
}

fn finish(report: &RunReport) -> i32 {
    let mut stdout = io::stdout();
    if let Err(e) = print_summary(report, &mut stdout) {
        eprintln!("failed to print summary: {}", e);
    }
    report.exit.code()
}

/// Ask which checkers to run. `None` on EOF or an unrecognised answer.
fn prompt_selection<R: BufRead, W: Write>(mut input: R, mut output: W) -> Option<ValidatorSelection> {
    writeln!(output, "Select validator:").ok()?;
    for (i, option) in ValidatorSelection::ALL.iter().enumerate() {
        writeln!(output, "  {}) {}", i + 1, option.menu_label()).ok()?;
    }
    write!(output, "Enter choice [1-3]: ").ok()?;
    output.flush().ok()?;

    let mut line = String::new();
    match input.read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => line.parse().ok(),
    }
}

fn print_summary<W: Write>(report: &RunReport, out: &mut W) -> io::Result<()> {
    for outcome in &report.outcomes {
        let status = match outcome.status {
            OutcomeStatus::Passed => "passed",
            OutcomeStatus::Failed => "FAILED",
            OutcomeStatus::ToolUnavailable => "unavailable",
        };
        writeln!(
            out,
            "{:<8} {} ({} ms)",
            outcome.checker.name(),
            status,
            outcome.duration_ms
        )?;
    }

    match report.decision {
        Some(PublishDecision::HaltDryRun) => {
            writeln!(out, "Dry run: validation finished, nothing uploaded.")?;
            print_diagnostics(report, out)?;
        }
        Some(PublishDecision::HaltValidationFailed) => {
            writeln!(out, "Validation failed; upload skipped.")?;
            print_diagnostics(report, out)?;
        }
        _ => {}
    }

    if let Some(upload) = &report.upload {
        let action = match upload.action {
            specpub_core::UploadAction::Created => "created",
            specpub_core::UploadAction::Replaced => "replaced",
        };
        writeln!(
            out,
            "Uploaded '{}' to version {} ({}, status {}){}",
            report.spec,
            report.version,
            action,
            upload.status,
            if upload.version_created {
                "; version was created"
            } else {
                ""
            }
        )?;
    }

    if let Some(failure) = &report.failure {
        writeln!(out, "Error [{}]: {}", failure.kind, failure.message)?;
    }

    Ok(())
}

/// Every diagnostic line of every outcome, passed ones included.
fn print_diagnostics<W: Write>(report: &RunReport, out: &mut W) -> io::Result<()> {
    for outcome in report.outcomes.iter().filter(|o| !o.diagnostics.is_empty()) {
        writeln!(out)?;
        writeln!(out, "{} diagnostics:", outcome.checker.label())?;
        for line in &outcome.diagnostics {
            writeln!(out, "  {}", line)?;
        }
    }
    Ok(())
}
