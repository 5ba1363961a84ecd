//! Run orchestration.
//!
//! One invocation walks a fixed state machine:
//!
//! ```text
//! PREFLIGHT -> RESOLVE -> VALIDATE -> DECIDE -> (HALT | UPLOAD) -> LOG -> EXIT
//! ```
//!
//! Preflight (credential presence) only runs when publishing for real.
//! Every path, including early failures, ends in LOG so the run log always
//! holds exactly one record per invocation.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::checker::{ProcessChecker, ValidationOutcome};
use crate::config::PublishConfig;
use crate::error::RunError;
use crate::gate::{self, PublishDecision};
use crate::prepare::{prepare_for_publish, PrepareOptions};
use crate::readme::ReadmeClient;
use crate::run_log::{RunLogger, RunRecord};
use crate::source::{SourceResolver, SpecOrigin};
use crate::upload::{DocsPlatform, UploadResult};
use crate::validator::{Validator, ValidatorSelection};

/// Process exit status of a run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(into = "i32", try_from = "i32")]
pub enum RunExit {
    /// Uploaded, or halted on purpose for dry-run
    Success,
    /// At least one checker did not pass
    ValidationFailed,
    /// Spec resolution or local environment problem
    Environment,
    /// Platform API failure
    Upload,
}

impl RunExit {
    pub fn code(&self) -> i32 {
        match self {
            RunExit::Success => 0,
            RunExit::ValidationFailed => 1,
            RunExit::Environment => 2,
            RunExit::Upload => 3,
        }
    }

    fn for_error(err: &RunError) -> Self {
        match err {
            RunError::NoValidatorSelected | RunError::Resolve(_) => RunExit::Environment,
            RunError::Publish(_) => RunExit::Upload,
        }
    }
}

impl From<RunExit> for i32 {
    fn from(exit: RunExit) -> Self {
        exit.code()
    }
}

impl TryFrom<i32> for RunExit {
    type Error = String;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(RunExit::Success),
            1 => Ok(RunExit::ValidationFailed),
            2 => Ok(RunExit::Environment),
            3 => Ok(RunExit::Upload),
            other => Err(format!("unknown exit code {}", other)),
        }
    }
}

/// States of a run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    Preflight,
    Resolve,
    Validate,
    Decide,
    Upload,
    Log,
    Exit,
}

/// Why a run stopped early.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunFailure {
    pub stage: RunStage,
    /// Stable identifier, e.g. `repository_layout`, `upload_rejected`.
    pub kind: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

/// What the operator asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    /// Logical spec name, or a path when `local` is set
    pub name: String,
    pub version: String,
    pub dry_run: bool,
    pub local: bool,
    /// `None` means the selection could not be obtained
    pub selection: Option<ValidatorSelection>,
}

/// Everything that happened in one run. Logged verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunReport {
    pub spec: String,
    pub version: String,
    pub dry_run: bool,
    pub origin: Option<SpecOrigin>,
    pub path: Option<PathBuf>,
    pub selection: Option<ValidatorSelection>,
    pub outcomes: Vec<ValidationOutcome>,
    pub decision: Option<PublishDecision>,
    pub upload: Option<UploadResult>,
    pub failure: Option<RunFailure>,
    #[serde(rename = "exit_code")]
    pub exit: RunExit,
}

impl RunReport {
    pub fn new(spec: impl Into<String>, version: impl Into<String>, dry_run: bool) -> Self {
        Self {
            spec: spec.into(),
            version: version.into(),
            dry_run,
            origin: None,
            path: None,
            selection: None,
            outcomes: Vec::new(),
            decision: None,
            upload: None,
            failure: None,
            exit: RunExit::Environment,
        }
    }

    /// Report for a run that never got an orchestrator, e.g. because the
    /// configuration could not be loaded.
    pub fn setup_failure(request: &RunRequest, message: impl Into<String>) -> Self {
        let mut report = Self::new(&request.name, &request.version, request.dry_run);
        report.selection = request.selection;
        report.failure = Some(RunFailure {
            stage: RunStage::Preflight,
            kind: "configuration".to_string(),
            message: message.into(),
            status: None,
        });
        report.exit = RunExit::Environment;
        report
    }

    /// Outcomes that did not pass.
    pub fn failed_outcomes(&self) -> impl Iterator<Item = &ValidationOutcome> {
        self.outcomes.iter().filter(|o| !o.passed())
    }
}

/// Sequences resolution, validation, gating, upload and logging.
pub struct Orchestrator {
    resolver: SourceResolver,
    prepare: PrepareOptions,
    validator: Validator,
    platform: Arc<dyn DocsPlatform>,
    logger: RunLogger,
}

impl Orchestrator {
    pub fn new(
        resolver: SourceResolver,
        prepare: PrepareOptions,
        validator: Validator,
        platform: Arc<dyn DocsPlatform>,
        logger: RunLogger,
    ) -> Self {
        Self {
            resolver,
            prepare,
            validator,
            platform,
            logger,
        }
    }

    /// Production wiring: npx-backed checkers and the ReadMe client.
    pub fn from_config(config: &PublishConfig) -> anyhow::Result<Self> {
        let validator = Validator::new()
            .with_checker(Box::new(ProcessChecker::swagger(config)))
            .with_checker(Box::new(ProcessChecker::redocly(config)));

        Ok(Self::new(
            SourceResolver::from_config(config),
            config.prepare.clone(),
            validator,
            Arc::new(ReadmeClient::new(config)?),
            RunLogger::new(config.log_file.clone()),
        ))
    }

    pub fn logger(&self) -> &RunLogger {
        &self.logger
    }

    /// Execute one run and log it. Never fails; the outcome is in the report.
    pub async fn run(&self, request: &RunRequest) -> RunReport {
        let mut report = RunReport::new(&request.name, &request.version, request.dry_run);
        report.selection = request.selection;

        match self.drive(request, &mut report).await {
            Ok(exit) => report.exit = exit,
            Err((stage, err)) => {
                error!(stage = ?stage, error = %err, "run halted");
                report.exit = RunExit::for_error(&err);
                report.failure = Some(RunFailure {
                    stage,
                    kind: err.kind().to_string(),
                    message: err.to_string(),
                    status: err.status(),
                });
            }
        }

        info!(stage = ?RunStage::Log, path = %self.logger.path().display(), "recording run");
        if !self.logger.record(&RunRecord::new(report.clone())) {
            warn!("run log not written; continuing");
        }

        info!(stage = ?RunStage::Exit, exit_code = report.exit.code(), "run finished");
        report
    }

    async fn drive(
        &self,
        request: &RunRequest,
        report: &mut RunReport,
    ) -> Result<RunExit, (RunStage, RunError)> {
        if !request.dry_run {
            self.platform
                .check_credentials()
                .map_err(|e| (RunStage::Preflight, e.into()))?;
        }

        info!(stage = ?RunStage::Resolve, spec = %request.name, local = request.local, "resolving spec");
        let resolved = self
            .resolver
            .resolve(&request.name, request.local)
            .map_err(|e| (RunStage::Resolve, e.into()))?;
        report.spec = resolved.name().to_string();
        report.origin = Some(resolved.origin());
        report.path = Some(resolved.path().to_path_buf());

        let spec = prepare_for_publish(&resolved, &request.version, &self.prepare)
            .map_err(|e| (RunStage::Resolve, e.into()))?;

        let selection = request
            .selection
            .ok_or((RunStage::Validate, RunError::NoValidatorSelected))?;
        info!(stage = ?RunStage::Validate, %selection, "validating spec");
        report.outcomes = self.validator.validate(&spec, selection).await;

        let decision = gate::evaluate(request.dry_run, &report.outcomes);
        report.decision = Some(decision);
        info!(stage = ?RunStage::Decide, %decision, "publish decision");

        match decision {
            PublishDecision::HaltDryRun => {
                info!("dry run complete, skipping upload");
                Ok(RunExit::Success)
            }
            PublishDecision::HaltValidationFailed => Ok(RunExit::ValidationFailed),
            PublishDecision::Proceed => {
                info!(stage = ?RunStage::Upload, version = %request.version, "uploading spec");
                let result = self
                    .platform
                    .publish(&spec, &request.version)
                    .await
                    .map_err(|e| (RunStage::Upload, e.into()))?;
                report.upload = Some(result);
                Ok(RunExit::Success)
            }
        }
    }
}
