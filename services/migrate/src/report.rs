use crate::error::{MigrationError, Result};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Audit file name for a run started at `started_at`
pub fn audit_file_name(started_at: &DateTime<Local>) -> String {
    format!("migrates-filelist-{}.txt", started_at.format("%d-%m-%YT%H:%M:%S"))
}

/// Append-only list of migrated locators, one per line
///
/// Each line is flushed as soon as it is written so a killed run leaves every
/// committed locator on disk. The file is closed when the log is dropped.
pub struct AuditLog {
    path: PathBuf,
    writer: Box<dyn Write + Send>,
    lines: usize,
}

impl AuditLog {
    /// Create the output directory if needed and open a fresh audit file in it
    pub fn create(output_dir: &Path, started_at: &DateTime<Local>) -> Result<Self> {
        let path = output_dir.join(audit_file_name(started_at));
        let audit_error = |source| MigrationError::AuditFile {
            path: path.clone(),
            source,
        };

        std::fs::create_dir_all(output_dir).map_err(audit_error)?;
        let file = File::create(&path).map_err(audit_error)?;

        info!(path = %path.display(), "Audit file opened");

        Ok(Self::with_writer(path, BufWriter::new(file)))
    }

    /// Audit log over an arbitrary sink, reported as living at `path`
    pub fn with_writer(path: PathBuf, writer: impl Write + Send + 'static) -> Self {
        Self {
            path,
            writer: Box::new(writer),
            lines: 0,
        }
    }

    /// Append one locator and flush it
    pub fn record(&mut self, locator: &str) -> io::Result<()> {
        writeln!(self.writer, "{}", locator)?;
        self.writer.flush()?;
        self.lines += 1;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of locators written so far
    pub fn lines(&self) -> usize {
        self.lines
    }
}

/// Counters for one collection scan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CollectionReport {
    pub collection: String,
    pub total_records: u64,
    pub disk_stored: u64,
    pub non_disk: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Set when the scan itself stopped early
    pub scan_error: Option<String>,
}

impl CollectionReport {
    pub fn new(collection: &str) -> Self {
        Self {
            collection: collection.to_string(),
            ..Default::default()
        }
    }

    /// Log the per-collection summary line
    pub fn log_summary(&self) {
        info!(
            collection = %self.collection,
            total_records = self.total_records,
            disk_stored = self.disk_stored,
            non_disk = self.non_disk,
            success = self.succeeded,
            failed = self.failed,
            "working on collection: {}, total records: {}, total on disk files {}, success: {}, failed: {}",
            self.collection,
            self.total_records,
            self.disk_stored,
            self.succeeded,
            self.failed
        );
    }

    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.scan_error.is_none()
    }
}

/// Outcome of a whole run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub collections: Vec<CollectionReport>,
    pub total_bytes_uploaded: u64,
    pub audit_file: Option<PathBuf>,
    pub dry_run: bool,
}

impl RunReport {
    pub fn collection(&self, name: &str) -> Option<&CollectionReport> {
        self.collections.iter().find(|c| c.collection == name)
    }

    pub fn total_succeeded(&self) -> u64 {
        self.collections.iter().map(|c| c.succeeded).sum()
    }

    pub fn total_failed(&self) -> u64 {
        self.collections.iter().map(|c| c.failed).sum()
    }

    /// True when no record failed and every collection scanned to the end
    pub fn is_clean(&self) -> bool {
        self.collections.iter().all(CollectionReport::is_clean)
    }

    /// Log the run-wide totals
    pub fn log_summary(&self) {
        info!(
            total_bytes_uploaded = self.total_bytes_uploaded,
            succeeded = self.total_succeeded(),
            failed = self.total_failed(),
            dry_run = self.dry_run,
            "upload total bytes: {}",
            self.total_bytes_uploaded
        );
        match serde_json::to_string(self) {
            Ok(json) => info!(report = %json, "Run report"),
            Err(e) => warn!(error = %e, "Failed to serialize run report"),
        }
    }
}
