//! Runtime configuration, built once at startup from the environment.

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::prepare::PrepareOptions;
use crate::retry::RetryPolicy;

/// Default ReadMe API endpoint.
pub const DEFAULT_API_BASE_URL: &str = "https://dash.readme.com/api/v1";

/// Default run log, relative to the working directory.
pub const DEFAULT_LOG_FILE: &str = "openapi_upload.log";

/// Everything a run needs from its environment.
#[derive(Debug, Clone)]
pub struct PublishConfig {
    /// Root of the API repository checkout
    pub repo_root: PathBuf,
    /// Spec names stored under the logical-metadata subdirectory
    pub logical_metadata_specs: Vec<String>,

    /// ReadMe API base URL
    pub api_base_url: String,
    /// ReadMe API key; `None` when not provided
    pub api_key: Option<String>,
    /// Per-request timeout (seconds)
    pub http_timeout_secs: u64,
    /// Retry policy for transient API failures
    pub retry: RetryPolicy,
    /// Create the target version when it does not exist yet
    pub create_missing_version: bool,
    /// Version a newly created version is forked from
    pub version_fork_source: String,

    /// Program used to launch the checker CLIs
    pub npx: String,
    /// Per-checker timeout (seconds, 0 = none)
    pub check_timeout_secs: u64,

    /// Append-only run log
    pub log_file: PathBuf,

    /// Rewrites applied before validation and upload
    pub prepare: PrepareOptions,
}

impl PublishConfig {
    /// Load configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let repo_root = match lookup("SPECPUB_REPO_ROOT") {
            Some(root) => PathBuf::from(root),
            None => {
                let home = lookup("HOME")
                    .context("SPECPUB_REPO_ROOT is not set and HOME is unavailable")?;
                PathBuf::from(home).join("Developer").join("alation")
            }
        };

        let logical_metadata_specs = lookup("SPECPUB_LOGICAL_METADATA_SPECS")
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_else(|| vec!["field".to_string(), "field_value".to_string()]);

        Ok(Self {
            repo_root,
            logical_metadata_specs,

            api_base_url: lookup("README_API_BASE_URL")
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key: lookup("README_API_KEY").filter(|k| !k.trim().is_empty()),
            http_timeout_secs: parse_or(&lookup, "SPECPUB_HTTP_TIMEOUT_SECS", 30)?,
            retry: RetryPolicy {
                max_attempts: parse_or(&lookup, "SPECPUB_RETRY_ATTEMPTS", 3)?,
                backoff_base_ms: parse_or(&lookup, "SPECPUB_RETRY_BACKOFF_MS", 500)?,
            },
            create_missing_version: lookup("SPECPUB_CREATE_MISSING_VERSION")
                .map(|v| !matches!(v.trim(), "0" | "false" | "no"))
                .unwrap_or(true),
            version_fork_source: lookup("SPECPUB_VERSION_FORK_SOURCE")
                .unwrap_or_else(|| "latest".to_string()),

            npx: lookup("SPECPUB_NPX").unwrap_or_else(|| "npx".to_string()),
            check_timeout_secs: parse_or(&lookup, "SPECPUB_CHECK_TIMEOUT_SECS", 300)?,

            log_file: log_file_from_lookup(&lookup),

            prepare: PrepareOptions::default(),
        })
    }
}

/// Run log location. Resolvable even when the rest of the configuration is
/// not, so setup failures can still be recorded.
pub fn log_file_from_env() -> PathBuf {
    log_file_from_lookup(&|key: &str| std::env::var(key).ok())
}

fn log_file_from_lookup<F>(lookup: &F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    lookup("SPECPUB_LOG_FILE")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE))
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid {}: '{}'", key, raw)),
        None => Ok(default),
    }
}
