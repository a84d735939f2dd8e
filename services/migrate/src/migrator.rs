use crate::config::MigrationConfig;
use crate::error::{MigrationError, Result};
use crate::object_store::{ObjectBackend, ObjectStoreClient, UploadOutcome};
use crate::record_store::{document_id, LoaderKind, MigrationRecord, RecordStore, S3_LOADER};
use crate::report::{AuditLog, CollectionReport, RunReport};
use futures::StreamExt;
use std::path::PathBuf;
use tracing::{debug, error, info, instrument, warn};

/// What happened to a single record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Not a disk record; left untouched
    NotOnDisk,
    /// Bytes are in the bucket and the record now points there
    Migrated { locator: String, upload: UploadOutcome },
    /// Dry run: the file exists and would be migrated
    WouldMigrate { locator: String, size_bytes: u64 },
}

/// Sequential migration driver
///
/// Records are processed one at a time: stat, upload, database update, audit
/// line. A failing record is counted and logged; it never stops the scan.
pub struct Migrator<'a, R, B> {
    config: &'a MigrationConfig,
    records: &'a R,
    objects: &'a ObjectStoreClient<B>,
}

impl<'a, R, B> Migrator<'a, R, B>
where
    R: RecordStore,
    B: ObjectBackend,
{
    pub fn new(
        config: &'a MigrationConfig,
        records: &'a R,
        objects: &'a ObjectStoreClient<B>,
    ) -> Self {
        Self {
            config,
            records,
            objects,
        }
    }

    /// Migrate every configured collection, writing successes to `audit`
    pub async fn run(&self, audit: &mut AuditLog) -> RunReport {
        let mut report = RunReport {
            audit_file: Some(audit.path().to_path_buf()),
            dry_run: self.config.dry_run,
            ..Default::default()
        };

        if self.config.dry_run {
            warn!("Dry run: no uploads, no database updates");
        }

        for collection in &self.config.collections {
            let collection_report = self
                .migrate_collection(collection, audit, &mut report.total_bytes_uploaded)
                .await;
            collection_report.log_summary();
            report.collections.push(collection_report);
        }

        report
    }

    /// Scan one collection; a scan failure is recorded in the report, not returned
    #[instrument(skip(self, audit, total_bytes))]
    pub async fn migrate_collection(
        &self,
        collection: &str,
        audit: &mut AuditLog,
        total_bytes: &mut u64,
    ) -> CollectionReport {
        let mut report = CollectionReport::new(collection);

        if let Err(e) = self
            .scan_collection(collection, audit, total_bytes, &mut report)
            .await
        {
            error!(collection = %collection, error = %e, "Collection scan failed");
            report.scan_error = Some(e.to_string());
        }

        report
    }

    async fn scan_collection(
        &self,
        collection: &str,
        audit: &mut AuditLog,
        total_bytes: &mut u64,
        report: &mut CollectionReport,
    ) -> Result<()> {
        let mut records = self
            .records
            .scan(collection)
            .await
            .map_err(|e| MigrationError::collection_scan(collection, e))?;

        while let Some(document) = records.next().await {
            let document = document.map_err(|e| MigrationError::collection_scan(collection, e))?;
            report.total_records += 1;

            let record_id = document_id(&document);
            let record = match MigrationRecord::from_document(document) {
                Ok(record) => record,
                Err(e) => {
                    record_failure(collection, &record_id, report, &e);
                    continue;
                }
            };

            if record.loader_kind() == LoaderKind::Disk {
                report.disk_stored += 1;
            }

            match self.migrate_record(collection, &record).await {
                Ok(RecordOutcome::NotOnDisk) => report.non_disk += 1,
                Ok(RecordOutcome::Migrated { locator, upload }) => {
                    report.succeeded += 1;
                    *total_bytes += upload.bytes_transferred();
                    metrics::counter!("migrate.records.migrated").increment(1);
                    if let Err(e) = audit.record(&locator) {
                        // The database already points at the bucket; only the audit trail is short
                        error!(locator = %locator, error = %e, "Failed to append to audit file");
                    }
                }
                Ok(RecordOutcome::WouldMigrate { locator, size_bytes }) => {
                    report.succeeded += 1;
                    info!(locator = %locator, size_bytes, "Would migrate");
                }
                Err(e) => record_failure(collection, &record_id, report, &e),
            }
        }

        Ok(())
    }

    /// Decide, upload and repoint a single record
    #[instrument(skip(self, record), fields(record_id = %record.display_id()))]
    pub async fn migrate_record(
        &self,
        collection: &str,
        record: &MigrationRecord,
    ) -> Result<RecordOutcome> {
        if record.loader_kind() != LoaderKind::Disk {
            return Ok(RecordOutcome::NotOnDisk);
        }

        let locator = record
            .loader_id
            .as_deref()
            .filter(|locator| !locator.is_empty())
            .ok_or_else(|| MigrationError::MissingLocator {
                id: record.display_id(),
            })?;

        let path = self.local_path(locator);
        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|source| MigrationError::Stat {
                path: path.clone(),
                source,
            })?;
        // A directory would let the prefix listing match unrelated objects
        if !metadata.is_file() {
            return Err(MigrationError::NotAFile { path });
        }
        let size_bytes = metadata.len();
        debug!(path = %path.display(), size_bytes, "Found file on disk");

        if self.config.dry_run {
            return Ok(RecordOutcome::WouldMigrate {
                locator: locator.to_string(),
                size_bytes,
            });
        }

        let upload = self.objects.upload(&path, locator).await?;

        let modified = self
            .records
            .set_loader(collection, &record.id, S3_LOADER)
            .await
            .map_err(|source| MigrationError::DatabaseUpdate {
                id: record.display_id(),
                source,
            })?;
        if modified != 1 {
            return Err(MigrationError::UpdateMismatch {
                id: record.display_id(),
                modified,
            });
        }

        Ok(RecordOutcome::Migrated {
            locator: locator.to_string(),
            upload,
        })
    }

    /// Host path of a locator: the mount prefix is prepended verbatim
    fn local_path(&self, locator: &str) -> PathBuf {
        PathBuf::from(format!("{}{}", self.config.host_fs_prefix, locator))
    }
}

fn record_failure(
    collection: &str,
    record_id: &str,
    report: &mut CollectionReport,
    e: &MigrationError,
) {
    report.failed += 1;
    metrics::counter!("migrate.records.failed").increment(1);
    error!(
        collection = %collection,
        record_id = %record_id,
        error = %e,
        "record: {} failed",
        record_id
    );
}
