//! Platform abstraction for versioned document publishing.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::PublishResult;
use crate::source::SpecFile;

/// What the upsert did to the remote document.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UploadAction {
    Created,
    Replaced,
}

/// Successful upload. Failures are reported as [`crate::error::PublishError`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadResult {
    /// HTTP status of the document call.
    pub status: u16,
    pub action: UploadAction,
    /// The target version did not exist and was created by this upload.
    pub version_created: bool,
    /// Remote document id, when the platform returned one.
    pub document_id: Option<String>,
}

/// A documentation platform that hosts specs under named versions.
#[async_trait]
pub trait DocsPlatform: Send + Sync {
    /// Verify a credential is present. Must not touch the network.
    fn check_credentials(&self) -> PublishResult<()>;

    /// Ensure `version` exists, then create or replace the document for
    /// `spec` under it. Re-running with the same input is safe.
    async fn publish(&self, spec: &SpecFile, version: &str) -> PublishResult<UploadResult>;
}
