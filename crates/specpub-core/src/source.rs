//! Spec resolution: turn a logical name into a [`SpecFile`].
//!
//! Two sources are supported:
//! - a local file given on the command line (`--local`)
//! - the API repository checkout, where specs live under
//!   `<root>/django/static/swagger/specs/<name>.yaml`

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::PublishConfig;
use crate::error::{ResolveError, ResolveResult};

/// Specs directory relative to the repository root.
pub const SPECS_SUBDIR: &str = "django/static/swagger/specs";

/// Subdirectory of the specs directory holding logical-metadata specs.
pub const LOGICAL_METADATA_SUBDIR: &str = "logical_metadata";

/// Extension used for specs in the repository.
pub const SPEC_EXTENSION: &str = "yaml";

/// Where a spec was read from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SpecOrigin {
    Local,
    Repository,
}

impl std::fmt::Display for SpecOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpecOrigin::Local => write!(f, "local"),
            SpecOrigin::Repository => write!(f, "repository"),
        }
    }
}

/// A resolved OpenAPI document. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecFile {
    name: String,
    path: PathBuf,
    origin: SpecOrigin,
    content: String,
}

impl SpecFile {
    pub fn new(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        origin: SpecOrigin,
        content: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            origin,
            content: content.into(),
        }
    }

    /// Logical name (file name without extension).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Absolute path the content was read from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn origin(&self) -> SpecOrigin {
        self.origin
    }

    /// Raw YAML/JSON text.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Derive a new spec with the same identity and different content.
    pub fn with_content(&self, content: impl Into<String>) -> Self {
        Self {
            name: self.name.clone(),
            path: self.path.clone(),
            origin: self.origin,
            content: content.into(),
        }
    }

    /// `info.title` of the document, used to match remote documents.
    /// Falls back to the logical name when the title is absent.
    pub fn title(&self) -> String {
        serde_yaml::from_str::<serde_yaml::Value>(&self.content)
            .ok()
            .and_then(|doc| {
                doc.get("info")
                    .and_then(|info| info.get("title"))
                    .and_then(|title| title.as_str())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| self.name.clone())
    }
}

/// Locates spec content on the local filesystem.
#[derive(Debug, Clone)]
pub struct SourceResolver {
    repo_root: PathBuf,
    logical_metadata_specs: Vec<String>,
}

impl SourceResolver {
    pub fn new(repo_root: impl Into<PathBuf>, logical_metadata_specs: Vec<String>) -> Self {
        Self {
            repo_root: repo_root.into(),
            logical_metadata_specs,
        }
    }

    pub fn from_config(config: &PublishConfig) -> Self {
        Self::new(
            config.repo_root.clone(),
            config.logical_metadata_specs.clone(),
        )
    }

    /// `<root>/django/static/swagger/specs`
    pub fn specs_dir(&self) -> PathBuf {
        self.repo_root.join(SPECS_SUBDIR)
    }

    /// Path a logical name maps to inside the repository.
    pub fn repository_path(&self, name: &str) -> PathBuf {
        let file = format!("{}.{}", name, SPEC_EXTENSION);
        if self.logical_metadata_specs.iter().any(|s| s == name) {
            self.specs_dir().join(LOGICAL_METADATA_SUBDIR).join(file)
        } else {
            self.specs_dir().join(file)
        }
    }

    /// Resolve `name` either as a local path or as a repository spec.
    pub fn resolve(&self, name: &str, local: bool) -> ResolveResult<SpecFile> {
        if local {
            resolve_local(name)
        } else {
            self.resolve_repository(name)
        }
    }

    fn resolve_repository(&self, name: &str) -> ResolveResult<SpecFile> {
        if !self.repo_root.is_dir() {
            return Err(ResolveError::RepositoryLayout {
                path: self.repo_root.clone(),
                reason: "repository root does not exist".to_string(),
            });
        }

        let specs_dir = self.specs_dir();
        if !specs_dir.is_dir() {
            return Err(ResolveError::RepositoryLayout {
                path: specs_dir,
                reason: "specs directory does not exist".to_string(),
            });
        }

        if name.is_empty() || name.contains(['/', '\\']) {
            return Err(ResolveError::RepositoryLayout {
                path: specs_dir,
                reason: format!("'{}' is not a spec name (use --local for paths)", name),
            });
        }

        let path = self.repository_path(name);
        if !path.is_file() {
            return Err(ResolveError::RepositoryLayout {
                path,
                reason: "spec file does not exist".to_string(),
            });
        }

        let spec = read_spec(name, &path, SpecOrigin::Repository)?;
        info!(spec = %name, path = %spec.path().display(), "resolved spec from repository");
        Ok(spec)
    }
}

fn resolve_local(name: &str) -> ResolveResult<SpecFile> {
    let given = PathBuf::from(name);
    let path = if given.is_file() {
        given
    } else if given.extension().is_none() {
        given.with_extension(SPEC_EXTENSION)
    } else {
        given
    };

    if !path.is_file() {
        return Err(ResolveError::FileNotFound { path });
    }

    let logical = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| name.to_string());

    let spec = read_spec(&logical, &path, SpecOrigin::Local)?;
    info!(spec = %logical, path = %spec.path().display(), "using local spec file");
    Ok(spec)
}

fn read_spec(name: &str, path: &Path, origin: SpecOrigin) -> ResolveResult<SpecFile> {
    let absolute = std::fs::canonicalize(path).map_err(|source| ResolveError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let content = std::fs::read_to_string(&absolute).map_err(|source| ResolveError::Io {
        path: absolute.clone(),
        source,
    })?;
    debug!(bytes = content.len(), "read spec content");
    Ok(SpecFile::new(name, absolute, origin, content))
}
