//! In-memory fakes for checkers and the docs platform (testing only)
//!
//! `StaticChecker` returns a canned outcome; `MemoryPlatform` keeps versions
//! and documents in maps and follows the same upsert rules as ReadMe.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::checker::{CheckerKind, OutcomeStatus, SchemaChecker, ValidationOutcome};
use crate::error::{PublishError, PublishResult};
use crate::source::SpecFile;
use crate::upload::{DocsPlatform, UploadAction, UploadResult};

// ---------------------------------------------------------------------------
// StaticChecker
// ---------------------------------------------------------------------------

/// Checker that always reports the same outcome and counts its calls.
#[derive(Debug, Clone)]
pub struct StaticChecker {
    kind: CheckerKind,
    status: OutcomeStatus,
    diagnostics: Vec<String>,
    calls: Arc<AtomicU32>,
}

impl StaticChecker {
    pub fn new(kind: CheckerKind, status: OutcomeStatus, diagnostics: &[&str]) -> Self {
        Self {
            kind,
            status,
            diagnostics: diagnostics.iter().map(|d| d.to_string()).collect(),
            calls: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn passing(kind: CheckerKind) -> Self {
        Self::new(kind, OutcomeStatus::Passed, &[])
    }

    pub fn failing(kind: CheckerKind, diagnostics: &[&str]) -> Self {
        Self::new(kind, OutcomeStatus::Failed, diagnostics)
    }

    pub fn unavailable(kind: CheckerKind) -> Self {
        Self::new(
            kind,
            OutcomeStatus::ToolUnavailable,
            &["failed to launch 'npx': No such file or directory"],
        )
    }

    /// Shared call counter; stays valid after the checker is boxed.
    pub fn calls(&self) -> Arc<AtomicU32> {
        self.calls.clone()
    }
}

#[async_trait]
impl SchemaChecker for StaticChecker {
    fn kind(&self) -> CheckerKind {
        self.kind
    }

    async fn check(&self, _spec: &SpecFile) -> ValidationOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        ValidationOutcome {
            checker: self.kind,
            status: self.status,
            exit_code: match self.status {
                OutcomeStatus::Passed => Some(0),
                OutcomeStatus::Failed => Some(1),
                OutcomeStatus::ToolUnavailable => None,
            },
            diagnostics: self.diagnostics.clone(),
            duration_ms: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// MemoryPlatform
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
struct StoredDocument {
    id: String,
    content: String,
}

#[derive(Debug, Default)]
struct PlatformState {
    versions: HashSet<String>,
    /// (version, title) -> document
    documents: HashMap<(String, String), StoredDocument>,
    next_id: u32,
}

/// In-memory documentation platform.
#[derive(Debug)]
pub struct MemoryPlatform {
    state: Mutex<PlatformState>,
    has_credentials: bool,
    create_missing_version: bool,
    fail_with: Mutex<Option<PublishError>>,
    publish_calls: AtomicU32,
}

impl Default for MemoryPlatform {
    fn default() -> Self {
        Self {
            state: Mutex::new(PlatformState::default()),
            has_credentials: true,
            create_missing_version: true,
            fail_with: Mutex::new(None),
            publish_calls: AtomicU32::new(0),
        }
    }
}

impl MemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Platform whose credential check fails.
    pub fn without_credentials() -> Self {
        Self {
            has_credentials: false,
            ..Self::default()
        }
    }

    /// Refuse to create versions that do not exist yet.
    pub fn without_version_creation(mut self) -> Self {
        self.create_missing_version = false;
        self
    }

    /// Seed an existing version.
    pub fn with_version(self, version: &str) -> Self {
        self.state.lock().unwrap().versions.insert(version.to_string());
        self
    }

    /// Make the next publish call fail with `err`.
    pub fn fail_next(&self, err: PublishError) {
        *self.fail_with.lock().unwrap() = Some(err);
    }

    pub fn has_version(&self, version: &str) -> bool {
        self.state.lock().unwrap().versions.contains(version)
    }

    /// Stored content of the document titled `title` under `version`.
    pub fn document(&self, version: &str, title: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .documents
            .get(&(version.to_string(), title.to_string()))
            .map(|d| d.content.clone())
    }

    pub fn document_count(&self) -> usize {
        self.state.lock().unwrap().documents.len()
    }

    /// Number of publish calls received (including failed ones).
    pub fn publish_calls(&self) -> u32 {
        self.publish_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocsPlatform for MemoryPlatform {
    fn check_credentials(&self) -> PublishResult<()> {
        if self.has_credentials {
            Ok(())
        } else {
            Err(PublishError::Authentication("README_API_KEY is not set".to_string()))
        }
    }

    async fn publish(&self, spec: &SpecFile, version: &str) -> PublishResult<UploadResult> {
        self.publish_calls.fetch_add(1, Ordering::SeqCst);
        self.check_credentials()?;
        if let Some(err) = self.fail_with.lock().unwrap().take() {
            return Err(err);
        }

        let mut state = self.state.lock().unwrap();

        let version_created = if state.versions.contains(version) {
            false
        } else if self.create_missing_version {
            state.versions.insert(version.to_string());
            true
        } else {
            return Err(PublishError::VersionApi {
                status: Some(404),
                body: format!("version '{}' not found", version),
            });
        };

        let key = (version.to_string(), spec.title());
        let (status, action, id) = match state.documents.get_mut(&key) {
            Some(doc) => {
                doc.content = spec.content().to_string();
                (200, UploadAction::Replaced, doc.id.clone())
            }
            None => {
                state.next_id += 1;
                let id = format!("doc-{}", state.next_id);
                state.documents.insert(
                    key,
                    StoredDocument {
                        id: id.clone(),
                        content: spec.content().to_string(),
                    },
                );
                (201, UploadAction::Created, id)
            }
        };

        Ok(UploadResult {
            status,
            action,
            version_created,
            document_id: Some(id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SpecOrigin;

    fn spec() -> SpecFile {
        SpecFile::new(
            "data_products",
            "/tmp/data_products.yaml",
            SpecOrigin::Repository,
            "openapi: 3.0.0\ninfo:\n  title: Data Products\n",
        )
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let platform = MemoryPlatform::new();

        let first = platform.publish(&spec(), "2025.1.5").await.unwrap();
        let after_first = platform.document("2025.1.5", "Data Products");
        let second = platform.publish(&spec(), "2025.1.5").await.unwrap();

        assert_eq!(first.action, UploadAction::Created);
        assert!(first.version_created);
        assert_eq!(second.action, UploadAction::Replaced);
        assert!(!second.version_created);
        assert_eq!(first.document_id, second.document_id);
        assert_eq!(after_first, platform.document("2025.1.5", "Data Products"));
        assert_eq!(platform.document_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_version_without_creation() {
        let platform = MemoryPlatform::new().without_version_creation();
        let err = platform.publish(&spec(), "9.9.9").await.unwrap_err();
        assert!(matches!(err, PublishError::VersionApi { status: Some(404), .. }));
        assert!(!platform.has_version("9.9.9"));
    }

    #[tokio::test]
    async fn test_static_checker_counts_calls() {
        let checker = StaticChecker::failing(CheckerKind::Redocly, &["E1"]);
        let calls = checker.calls();
        let outcome = checker.check(&spec()).await;
        assert_eq!(outcome.status, OutcomeStatus::Failed);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
