use anyhow::{bail, Context};
use serde::Deserialize;
use std::path::PathBuf;

/// Collections holding file pointers, in the order they are migrated
pub const DEFAULT_COLLECTIONS: [&str; 6] = [
    "logo",
    "uploads",
    "thumbnails",
    "titles",
    "textures",
    "previews",
];

/// Main configuration for a migration run
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub service: ServiceConfig,
    /// S3 configuration
    #[serde(default)]
    pub s3: S3Config,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Migration behaviour
    #[serde(default)]
    pub migration: MigrationConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Emit JSON log lines instead of human readable ones
    #[serde(default)]
    pub log_json: bool,
}

/// S3 storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct S3Config {
    /// Target bucket
    #[serde(default = "default_bucket")]
    pub bucket: String,
    /// AWS region
    #[serde(default = "default_region")]
    pub region: String,
    /// Service endpoint (MinIO, LocalStack, AWS)
    #[serde(default = "default_endpoint_url")]
    pub endpoint_url: String,
    /// Access key id
    #[serde(default = "default_access_key_id")]
    pub access_key_id: String,
    /// Secret access key
    #[serde(default = "default_secret_access_key")]
    pub secret_access_key: String,
    /// Force path-style access (required for MinIO)
    #[serde(default = "default_true")]
    pub force_path_style: bool,
}

/// Database configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatabaseConfig {
    /// MongoDB connection URL
    pub url: Option<String>,
    /// Database name
    pub name: Option<String>,
}

/// Migration behaviour
#[derive(Debug, Clone, Deserialize)]
pub struct MigrationConfig {
    /// Prefix prepended verbatim to every loader_id to find it on this host
    #[serde(default)]
    pub host_fs_prefix: String,
    /// Directory receiving the audit file
    pub output_folder: Option<PathBuf>,
    /// Collections to scan, in order
    #[serde(default = "default_collections")]
    pub collections: Vec<String>,
    /// Decide and stat only; no upload, no update, no audit lines
    #[serde(default)]
    pub dry_run: bool,
}

/// Values supplied on the command line; each one overrides the config sources
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub db_url: Option<String>,
    pub db_name: Option<String>,
    pub host_fs: Option<String>,
    pub output_folder: Option<String>,
    pub dry_run: bool,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_bucket() -> String {
    "localbucket".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_endpoint_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_access_key_id() -> String {
    "AWS_ACCESS_KEY_ID".to_string()
}

fn default_secret_access_key() -> String {
    "AWS_SECRET_ACCESS_KEY".to_string()
}

fn default_true() -> bool {
    true
}

fn default_collections() -> Vec<String> {
    DEFAULT_COLLECTIONS.iter().map(|c| c.to_string()).collect()
}

/// Legacy environment variable names and the config keys they feed
const LEGACY_ENV: [(&str, &str); 5] = [
    ("SERVICE_ENDPOINT", "s3.endpoint_url"),
    ("BUCKET", "s3.bucket"),
    ("AWS_ACCESS_KEY_ID", "s3.access_key_id"),
    ("AWS_SECRET_ACCESS_KEY", "s3.secret_access_key"),
    ("REGION", "s3.region"),
];

/// `MIGRATE__S3__BUCKET` -> `s3.bucket`; collections are comma separated
fn environment() -> config::Environment {
    config::Environment::with_prefix("MIGRATE")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("migration.collections")
}

impl Config {
    /// Load configuration from config files, environment and CLI overrides
    pub fn load(overrides: &Overrides) -> anyhow::Result<Self> {
        let mut builder = config::Config::builder()
            .set_default("service.log_level", "info")?
            .add_source(config::File::with_name("config/migrate").required(false))
            .add_source(environment());

        for (var, key) in LEGACY_ENV {
            builder = builder.set_override_option(key, std::env::var(var).ok())?;
        }

        let config = builder
            .set_override_option("database.url", overrides.db_url.clone())?
            .set_override_option("database.name", overrides.db_name.clone())?
            .set_override_option("migration.host_fs_prefix", overrides.host_fs.clone())?
            .set_override_option("migration.output_folder", overrides.output_folder.clone())?
            .set_override_option("migration.dry_run", overrides.dry_run.then_some(true))?
            .build()
            .context("Failed to build configuration")?;

        let config: Self = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that cannot run
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.database.url.as_deref().unwrap_or_default().is_empty() {
            bail!("database url is required (--dburl or DBURL)");
        }
        if self.database.name.as_deref().unwrap_or_default().is_empty() {
            bail!("database name is required (--dbname or DBNAME)");
        }
        if self.migration.output_folder.is_none() {
            bail!("output folder is required (--outputfolder or OUTPUTFOLDER)");
        }
        if self.migration.collections.is_empty() {
            bail!("at least one collection must be configured");
        }
        Ok(())
    }

    /// Database URL, present once validated
    pub fn db_url(&self) -> &str {
        self.database.url.as_deref().unwrap_or_default()
    }

    /// Database name, present once validated
    pub fn db_name(&self) -> &str {
        self.database.name.as_deref().unwrap_or_default()
    }

    /// Audit output directory, present once validated
    pub fn output_folder(&self) -> PathBuf {
        self.migration.output_folder.clone().unwrap_or_default()
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
        }
    }
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            bucket: default_bucket(),
            region: default_region(),
            endpoint_url: default_endpoint_url(),
            access_key_id: default_access_key_id(),
            secret_access_key: default_secret_access_key(),
            force_path_style: true,
        }
    }
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            host_fs_prefix: String::new(),
            output_folder: None,
            collections: default_collections(),
            dry_run: false,
        }
    }
}
