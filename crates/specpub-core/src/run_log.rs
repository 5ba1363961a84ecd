//! Append-only run log, one JSON line per invocation.
//!
//! The file is opened, written, flushed and closed inside a single call so
//! no handle outlives the run. Write failures are reported and swallowed.

use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::orchestrator::RunReport;

/// One line of the run log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunRecord {
    pub run_id: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub report: RunReport,
}

impl RunRecord {
    pub fn new(report: RunReport) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            report,
        }
    }
}

/// Writes [`RunRecord`]s to a persistent JSON-lines file.
#[derive(Debug, Clone)]
pub struct RunLogger {
    path: PathBuf,
}

impl RunLogger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record. Never truncates existing content.
    pub fn append(&self, record: &RunRecord) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        file.flush()?;
        debug!(path = %self.path.display(), run_id = %record.run_id, "run record appended");
        Ok(())
    }

    /// Append, downgrading any failure to a warning. Returns whether the
    /// record was written.
    pub fn record(&self, record: &RunRecord) -> bool {
        match self.append(record) {
            Ok(()) => true,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to write run log");
                false
            }
        }
    }

    /// Read every record back, skipping lines that do not parse.
    pub fn read_all(&self) -> std::io::Result<Vec<RunRecord>> {
        let file = std::fs::File::open(&self.path)?;
        let mut records = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(record) => records.push(record),
                Err(e) => warn!(error = %e, "skipping unreadable run log line"),
            }
        }
        Ok(records)
    }
}
