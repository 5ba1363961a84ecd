//! Error types for specpub

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while locating or preparing a spec file.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// `--local` path does not exist
    #[error("spec file not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    /// Repository checkout is missing or does not have the expected tree
    #[error("repository layout error at {}: {reason}", path.display())]
    RepositoryLayout { path: PathBuf, reason: String },

    /// Document could not be parsed or rewritten for publication
    #[error("invalid spec '{name}': {reason}")]
    InvalidSpec { name: String, reason: String },

    /// IO error while reading the spec
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised while talking to the documentation platform.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    /// Credential missing, empty, or refused by the platform
    #[error("authentication error: {0}")]
    Authentication(String),

    /// Version lookup or creation failed. `status` is `None` when no
    /// response was ever received.
    #[error("version API error ({}): {body}", fmt_status(*status))]
    VersionApi { status: Option<u16>, body: String },

    /// Document upsert was refused or never got through
    #[error("upload rejected ({}): {body}", fmt_status(*status))]
    UploadRejected { status: Option<u16>, body: String },
}

impl PublishError {
    /// HTTP status attached to the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            PublishError::Authentication(_) => None,
            PublishError::VersionApi { status, .. } | PublishError::UploadRejected { status, .. } => {
                *status
            }
        }
    }
}

fn fmt_status(status: Option<u16>) -> String {
    match status {
        Some(code) => format!("status {}", code),
        None => "no response".to_string(),
    }
}

/// Terminal failures of a single run.
#[derive(Error, Debug)]
pub enum RunError {
    /// No checker selection was supplied and none could be obtained
    #[error("no validator selected (expected swagger, redocly or both)")]
    NoValidatorSelected,

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Publish(#[from] PublishError),
}

impl RunError {
    /// Stable machine-readable identifier for the run log.
    pub fn kind(&self) -> &'static str {
        match self {
            RunError::NoValidatorSelected => "no_validator_selected",
            RunError::Resolve(ResolveError::FileNotFound { .. }) => "file_not_found",
            RunError::Resolve(ResolveError::RepositoryLayout { .. }) => "repository_layout",
            RunError::Resolve(ResolveError::InvalidSpec { .. }) => "invalid_spec",
            RunError::Resolve(ResolveError::Io { .. }) => "io",
            RunError::Publish(PublishError::Authentication(_)) => "authentication",
            RunError::Publish(PublishError::VersionApi { .. }) => "version_api",
            RunError::Publish(PublishError::UploadRejected { .. }) => "upload_rejected",
        }
    }

    /// HTTP status carried by platform errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            RunError::Publish(e) => e.status(),
            _ => None,
        }
    }
}

/// Result alias for spec resolution.
pub type ResolveResult<T> = std::result::Result<T, ResolveError>;

/// Result alias for platform calls.
pub type PublishResult<T> = std::result::Result<T, PublishError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_error_display_includes_status() {
        let err = PublishError::VersionApi {
            status: Some(500),
            body: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "version API error (status 500): boom");
        assert_eq!(err.status(), Some(500));
    }

    #[test]
    fn test_publish_error_display_without_response() {
        let err = PublishError::UploadRejected {
            status: None,
            body: "connection reset".to_string(),
        };
        assert_eq!(err.to_string(), "upload rejected (no response): connection reset");
        assert_eq!(err.status(), None);
    }

    #[test]
    fn test_run_error_wraps_resolve_error() {
        let err: RunError = ResolveError::FileNotFound {
            path: PathBuf::from("/tmp/missing.yaml"),
        }
        .into();
        assert!(err.to_string().contains("/tmp/missing.yaml"));
    }
}
