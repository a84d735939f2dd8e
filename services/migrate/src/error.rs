use std::path::PathBuf;
use thiserror::Error;

/// Boxed error returned by the storage and database collaborators
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised while migrating records
///
/// Every variant except `AuditFile` is recoverable: the driver turns it into a
/// failure counter and moves on to the next record or collection.
#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("Failed to stat {path}: {source}")]
    Stat {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Record {id} does not match the expected projection: {source}")]
    MalformedRecord {
        id: String,
        #[source]
        source: mongodb::bson::de::Error,
    },

    #[error("Disk record {id} has no loader_id")]
    MissingLocator { id: String },

    #[error("{path} is not a regular file")]
    NotAFile { path: PathBuf },

    #[error("Failed to upload object {key}: {source}")]
    StorageUpload {
        key: String,
        #[source]
        source: BoxError,
    },

    #[error("Update of record {id} modified {modified} documents, expected 1")]
    UpdateMismatch { id: String, modified: u64 },

    #[error("Failed to update record {id}: {source}")]
    DatabaseUpdate {
        id: String,
        #[source]
        source: BoxError,
    },

    #[error("Failed to scan collection {collection}: {source}")]
    CollectionScan {
        collection: String,
        #[source]
        source: BoxError,
    },

    #[error("Failed to open audit file {path}: {source}")]
    AuditFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl MigrationError {
    pub(crate) fn storage_upload(key: &str, source: impl Into<BoxError>) -> Self {
        Self::StorageUpload {
            key: key.to_string(),
            source: source.into(),
        }
    }

    pub(crate) fn collection_scan(collection: &str, source: impl Into<BoxError>) -> Self {
        Self::CollectionScan {
            collection: collection.to_string(),
            source: source.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MigrationError>;
