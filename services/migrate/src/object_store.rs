use crate::config::S3Config;
use crate::error::{BoxError, MigrationError, Result};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Builder as S3ConfigBuilder, Credentials};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use std::path::Path;
use tracing::{debug, info, instrument};

/// Result of a successful upload call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    /// Bytes were transferred under the key
    Uploaded { bytes: u64 },
    /// An object already existed under the key; nothing was transferred
    AlreadyPresent,
}

impl UploadOutcome {
    /// Bytes transferred by this upload
    pub fn bytes_transferred(&self) -> u64 {
        match self {
            UploadOutcome::Uploaded { bytes } => *bytes,
            UploadOutcome::AlreadyPresent => 0,
        }
    }
}

/// Remote side of the object store: listing and single-shot PUT
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectBackend: Send + Sync {
    /// Keys stored under `prefix`; at most one key is needed
    async fn list_keys(&self, prefix: &str) -> std::result::Result<Vec<String>, BoxError>;

    /// Store `body` under `key`
    async fn put_object(&self, key: &str, body: ByteStream) -> std::result::Result<(), BoxError>;
}

/// S3 backend over the AWS SDK, pointed at any S3-compatible endpoint
pub struct S3Backend {
    client: S3Client,
    bucket: String,
}

impl S3Backend {
    /// Create a new S3 backend with static credentials
    pub async fn new(config: &S3Config) -> Self {
        let credentials = Credentials::new(
            config.access_key_id.clone(),
            config.secret_access_key.clone(),
            None,
            None,
            "s3-migrate",
        );

        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .load()
            .await;

        let s3_config = S3ConfigBuilder::from(&aws_config)
            .endpoint_url(&config.endpoint_url)
            // Force path-style access for MinIO compatibility
            .force_path_style(config.force_path_style)
            .build();

        info!(
            bucket = %config.bucket,
            region = %config.region,
            endpoint = %config.endpoint_url,
            "S3 backend initialized"
        );

        Self {
            client: S3Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
        }
    }
}

#[async_trait]
impl ObjectBackend for S3Backend {
    async fn list_keys(&self, prefix: &str) -> std::result::Result<Vec<String>, BoxError> {
        let response = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .max_keys(1)
            .send()
            .await?;

        Ok(response
            .contents()
            .iter()
            .filter_map(|obj| obj.key().map(String::from))
            .collect())
    }

    async fn put_object(&self, key: &str, body: ByteStream) -> std::result::Result<(), BoxError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .send()
            .await?;
        Ok(())
    }
}

/// Object key for a loader locator: one leading separator is dropped
pub fn object_key(locator: &str) -> &str {
    locator.strip_prefix('/').unwrap_or(locator)
}

/// Dedup-aware upload client on top of an [`ObjectBackend`]
pub struct ObjectStoreClient<B> {
    backend: B,
}

impl<B: ObjectBackend> ObjectStoreClient<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// True iff anything is listed under `key`
    pub async fn exists(&self, key: &str) -> Result<bool> {
        let keys = self
            .backend
            .list_keys(key)
            .await
            .map_err(|e| MigrationError::storage_upload(key, e))?;
        Ok(!keys.is_empty())
    }

    /// Upload `local_path` under the key derived from `locator`, unless it is already there
    #[instrument(skip(self, local_path), fields(key = %object_key(locator)))]
    pub async fn upload(&self, local_path: &Path, locator: &str) -> Result<UploadOutcome> {
        let key = object_key(locator);

        if self.exists(key).await? {
            debug!("Object already present, skipping upload");
            return Ok(UploadOutcome::AlreadyPresent);
        }

        let file = tokio::fs::File::open(local_path)
            .await
            .map_err(|e| MigrationError::storage_upload(key, e))?;
        let bytes = file
            .metadata()
            .await
            .map_err(|e| MigrationError::storage_upload(key, e))?
            .len();
        let body = ByteStream::read_from()
            .file(file)
            .build()
            .await
            .map_err(|e| MigrationError::storage_upload(key, e))?;

        self.backend
            .put_object(key, body)
            .await
            .map_err(|e| MigrationError::storage_upload(key, e))?;

        debug!(size_bytes = bytes, "Object uploaded");
        metrics::counter!("migrate.bytes.uploaded").increment(bytes);

        Ok(UploadOutcome::Uploaded { bytes })
    }

    /// Get the backend
    pub fn backend(&self) -> &B {
        &self.backend
    }
}
