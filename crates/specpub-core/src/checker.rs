//! Schema checkers: external CLI tools that validate an OpenAPI document.
//!
//! Both supported tools are launched through `npx`:
//! - Swagger CLI (`swagger-cli validate`), OpenAPI 3.0
//! - Redocly CLI (`@redocly/cli lint`), OpenAPI 3.1
//!
//! A checker never returns an error. Anything that goes wrong, including a
//! missing launcher, is reported inside the [`ValidationOutcome`].

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::PublishConfig;
use crate::source::SpecFile;

/// Supported checkers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CheckerKind {
    /// npx --yes swagger-cli validate <file>
    Swagger,

    /// npx --yes @redocly/cli lint <file>
    Redocly,
}

impl CheckerKind {
    /// Short identifier used in logs and records.
    pub fn name(&self) -> &'static str {
        match self {
            CheckerKind::Swagger => "swagger",
            CheckerKind::Redocly => "redocly",
        }
    }

    /// Human-readable description.
    pub fn label(&self) -> &'static str {
        match self {
            CheckerKind::Swagger => "Swagger CLI (OpenAPI 3.0, legacy)",
            CheckerKind::Redocly => "Redocly CLI (OpenAPI 3.1, modern)",
        }
    }

    /// Arguments passed to the launcher for `file`.
    pub fn args(&self, file: &Path) -> Vec<String> {
        let file = file.to_string_lossy().to_string();
        match self {
            CheckerKind::Swagger => vec![
                "--yes".to_string(),
                "swagger-cli".to_string(),
                "validate".to_string(),
                file,
            ],
            CheckerKind::Redocly => vec![
                "--yes".to_string(),
                "@redocly/cli".to_string(),
                "lint".to_string(),
                file,
            ],
        }
    }
}

impl std::fmt::Display for CheckerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Status of a single checker run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Passed,
    Failed,
    /// The tool could not be launched on this host.
    ToolUnavailable,
}

/// Result of running one checker against one spec.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationOutcome {
    pub checker: CheckerKind,
    pub status: OutcomeStatus,
    /// Process exit code; `None` if the process never ran to completion.
    pub exit_code: Option<i32>,
    /// Output lines of the tool, verbatim and in order.
    pub diagnostics: Vec<String>,
    pub duration_ms: u64,
}

impl ValidationOutcome {
    pub fn passed(&self) -> bool {
        self.status == OutcomeStatus::Passed
    }

    pub fn tool_unavailable(checker: CheckerKind, reason: impl Into<String>) -> Self {
        Self {
            checker,
            status: OutcomeStatus::ToolUnavailable,
            exit_code: None,
            diagnostics: vec![reason.into()],
            duration_ms: 0,
        }
    }
}

/// Capability to validate a spec document.
#[async_trait]
pub trait SchemaChecker: Send + Sync {
    /// Which tool this is.
    fn kind(&self) -> CheckerKind;

    /// Validate `spec`. Never fails; problems become part of the outcome.
    async fn check(&self, spec: &SpecFile) -> ValidationOutcome;
}

/// Checker backed by an external process.
#[derive(Debug, Clone)]
pub struct ProcessChecker {
    kind: CheckerKind,
    launcher: String,
    timeout_secs: u64,
}

impl ProcessChecker {
    pub fn new(kind: CheckerKind, launcher: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            kind,
            launcher: launcher.into(),
            timeout_secs,
        }
    }

    /// Swagger CLI checker using the configured launcher.
    pub fn swagger(config: &PublishConfig) -> Self {
        Self::new(CheckerKind::Swagger, &config.npx, config.check_timeout_secs)
    }

    /// Redocly CLI checker using the configured launcher.
    pub fn redocly(config: &PublishConfig) -> Self {
        Self::new(CheckerKind::Redocly, &config.npx, config.check_timeout_secs)
    }

    async fn run(&self, file: &Path) -> ValidationOutcome {
        let start = Instant::now();
        let args = self.kind.args(file);
        debug!(checker = %self.kind, launcher = %self.launcher, ?args, "launching checker");

        let child = match Command::new(&self.launcher)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                warn!(checker = %self.kind, launcher = %self.launcher, error = %e, "checker unavailable");
                return ValidationOutcome::tool_unavailable(
                    self.kind,
                    format!("failed to launch '{}': {}", self.launcher, e),
                );
            }
        };

        let output = if self.timeout_secs > 0 {
            match tokio::time::timeout(
                Duration::from_secs(self.timeout_secs),
                child.wait_with_output(),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => {
                    return ValidationOutcome {
                        checker: self.kind,
                        status: OutcomeStatus::Failed,
                        exit_code: None,
                        diagnostics: vec![format!(
                            "{} timed out after {} seconds",
                            self.kind.label(),
                            self.timeout_secs
                        )],
                        duration_ms: start.elapsed().as_millis() as u64,
                    };
                }
            }
        } else {
            child.wait_with_output().await
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        let output = match output {
            Ok(output) => output,
            Err(e) => {
                return ValidationOutcome {
                    checker: self.kind,
                    status: OutcomeStatus::Failed,
                    exit_code: None,
                    diagnostics: vec![format!("failed to collect checker output: {}", e)],
                    duration_ms,
                };
            }
        };

        let mut diagnostics = collect_lines(&output.stdout);
        diagnostics.extend(collect_lines(&output.stderr));

        ValidationOutcome {
            checker: self.kind,
            status: if output.status.success() {
                OutcomeStatus::Passed
            } else {
                OutcomeStatus::Failed
            },
            exit_code: output.status.code(),
            diagnostics,
            duration_ms,
        }
    }
}

#[async_trait]
impl SchemaChecker for ProcessChecker {
    fn kind(&self) -> CheckerKind {
        self.kind
    }

    async fn check(&self, spec: &SpecFile) -> ValidationOutcome {
        let scratch = match stage_spec(spec) {
            Ok(file) => file,
            Err(e) => {
                return ValidationOutcome {
                    checker: self.kind,
                    status: OutcomeStatus::Failed,
                    exit_code: None,
                    diagnostics: vec![format!("failed to stage spec for checking: {}", e)],
                    duration_ms: 0,
                };
            }
        };
        self.run(scratch.path()).await
    }
}

/// Write the spec next to its source so relative `$ref`s still resolve.
/// Falls back to the system temp dir when the source dir is read-only.
fn stage_spec(spec: &SpecFile) -> std::io::Result<NamedTempFile> {
    let prefix = format!(".{}-", spec.name());
    let builder = {
        let mut b = tempfile::Builder::new();
        b.prefix(&prefix).suffix(".yaml");
        b
    };

    let dir: Option<PathBuf> = spec.path().parent().map(Path::to_path_buf);
    let mut file = match dir {
        Some(dir) => builder
            .tempfile_in(&dir)
            .or_else(|_| builder.tempfile())?,
        None => builder.tempfile()?,
    };

    std::io::Write::write_all(&mut file, spec.content().as_bytes())?;
    std::io::Write::flush(&mut file)?;
    Ok(file)
}

fn collect_lines(bytes: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(bytes)
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect()
}
