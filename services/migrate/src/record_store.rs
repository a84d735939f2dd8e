use crate::error::{BoxError, MigrationError};
use anyhow::Context;
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use mongodb::bson::{doc, Bson, Document};
use mongodb::{Client, Database};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Loader tag of records whose bytes live on the local filesystem
pub const DISK_LOADER: &str = "services.filesystem.DiskByteStorageService";
/// Loader tag of records whose bytes live in the S3 bucket
pub const S3_LOADER: &str = "services.s3.S3ByteStorageService";

/// Storage backend a record currently points at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoaderKind {
    Disk,
    ObjectStore,
    /// Any other tag, or none at all
    Other(Option<String>),
}

impl LoaderKind {
    pub fn from_tag(tag: Option<&str>) -> Self {
        match tag {
            Some(DISK_LOADER) => LoaderKind::Disk,
            Some(S3_LOADER) => LoaderKind::ObjectStore,
            other => LoaderKind::Other(other.map(String::from)),
        }
    }
}

/// Minimal projection of a file-pointer document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationRecord {
    /// Document `_id`, kept opaque
    #[serde(rename = "_id")]
    pub id: Bson,
    /// Loader tag
    #[serde(default)]
    pub loader: Option<String>,
    /// Backend-specific locator (a path for disk records)
    #[serde(default)]
    pub loader_id: Option<String>,
}

impl MigrationRecord {
    /// Convert a scanned document; a field of the wrong type fails this record only
    pub fn from_document(document: Document) -> Result<Self, MigrationError> {
        let id = document_id(&document);
        mongodb::bson::from_document(document)
            .map_err(|source| MigrationError::MalformedRecord { id, source })
    }

    pub fn loader_kind(&self) -> LoaderKind {
        LoaderKind::from_tag(self.loader.as_deref())
    }

    /// Printable form of the id for logs and errors
    pub fn display_id(&self) -> String {
        display_bson(&self.id)
    }
}

/// Printable `_id` of a raw document
pub fn document_id(document: &Document) -> String {
    document
        .get("_id")
        .map(display_bson)
        .unwrap_or_else(|| "<no _id>".to_string())
}

fn display_bson(id: &Bson) -> String {
    match id {
        Bson::ObjectId(oid) => oid.to_hex(),
        Bson::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Lazy, forward-only sequence of projected documents from one collection
pub type RecordStream = BoxStream<'static, Result<Document, BoxError>>;

/// Database holding the file-pointer collections
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fresh projection query over every document of `collection`
    async fn scan(&self, collection: &str) -> Result<RecordStream, BoxError>;

    /// Set the loader tag of the record matching `id`; returns the modified count
    async fn set_loader(&self, collection: &str, id: &Bson, loader: &str) -> Result<u64, BoxError>;
}

/// Record store backed by MongoDB
pub struct MongoRecordStore {
    db: Database,
}

impl MongoRecordStore {
    /// Connect to `url` and select database `name`
    pub async fn connect(url: &str, name: &str) -> anyhow::Result<Self> {
        let client = Client::with_uri_str(url)
            .await
            .context("Failed to connect to MongoDB")?;

        info!(database = %name, "Connected to MongoDB");

        Ok(Self {
            db: client.database(name),
        })
    }
}

#[async_trait]
impl RecordStore for MongoRecordStore {
    async fn scan(&self, collection: &str) -> Result<RecordStream, BoxError> {
        let cursor = self
            .db
            .collection::<Document>(collection)
            .find(doc! {})
            .projection(doc! { "_id": 1, "loader": 1, "loader_id": 1 })
            .await?;

        debug!(collection = %collection, "Opened record cursor");

        Ok(cursor.map_err(|e| Box::new(e) as BoxError).boxed())
    }

    async fn set_loader(&self, collection: &str, id: &Bson, loader: &str) -> Result<u64, BoxError> {
        let result = self
            .db
            .collection::<Document>(collection)
            .update_one(doc! { "_id": id.clone() }, doc! { "$set": { "loader": loader } })
            .await?;

        Ok(result.modified_count)
    }
}
