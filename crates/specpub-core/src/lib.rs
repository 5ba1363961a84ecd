//! specpub - validate OpenAPI specs and publish them to ReadMe
//!
//! Provides the validation-and-publish pipeline behind the `specpub` CLI:
//! - Resolves a spec from a local path or the API repository checkout
//! - Rewrites it for publication (ReadMe extension, version, servers)
//! - Runs Swagger CLI and/or Redocly CLI against it
//! - Gates publication on dry-run and validation results
//! - Upserts the document under a ReadMe version, creating the version if needed
//! - Appends a structured record of every run to a log file

pub mod checker;
pub mod config;
pub mod error;
pub mod fakes;
pub mod gate;
pub mod orchestrator;
pub mod prepare;
pub mod readme;
pub mod retry;
pub mod run_log;
pub mod source;
pub mod telemetry;
pub mod upload;
pub mod validator;

// Re-export key types
pub use checker::{CheckerKind, OutcomeStatus, ProcessChecker, SchemaChecker, ValidationOutcome};
pub use config::PublishConfig;
pub use error::{PublishError, ResolveError, RunError};
pub use gate::PublishDecision;
pub use orchestrator::{Orchestrator, RunExit, RunFailure, RunReport, RunRequest, RunStage};
pub use prepare::{prepare_for_publish, PrepareOptions};
pub use readme::ReadmeClient;
pub use retry::RetryPolicy;
pub use run_log::{RunLogger, RunRecord};
pub use source::{SourceResolver, SpecFile, SpecOrigin};
pub use telemetry::init_tracing;
pub use upload::{DocsPlatform, UploadAction, UploadResult};
pub use validator::{Validator, ValidatorSelection};
