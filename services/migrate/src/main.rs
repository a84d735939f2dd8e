use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use s3_migrate::{
    AuditLog, Config, Migrator, MongoRecordStore, ObjectStoreClient, Overrides, S3Backend,
};
use std::process::ExitCode;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Migrate disk storage files referenced from MongoDB to S3
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// MongoDB url
    #[arg(short = 'u', long = "dburl", env = "DBURL")]
    db_url: Option<String>,

    /// MongoDB database name
    #[arg(short = 'd', long = "dbname", env = "DBNAME")]
    db_name: Option<String>,

    /// Mount point of the host filesystem, prepended to every loader_id
    #[arg(short = 'f', long = "hostfs", env = "HOSTFILESYSTEM")]
    host_fs: Option<String>,

    /// Folder receiving the list of all files migrated to S3
    #[arg(short = 'o', long = "outputfolder", env = "OUTPUTFOLDER")]
    output_folder: Option<String>,

    /// Stat files and report what would migrate without changing anything
    #[arg(long)]
    dry_run: bool,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            db_url: self.db_url.clone(),
            db_name: self.db_name.clone(),
            host_fs: self.host_fs.clone(),
            output_folder: self.output_folder.clone(),
            dry_run: self.dry_run,
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(&cli.overrides()).context("Failed to load configuration")?;

    // Initialize logging
    init_tracing(&config.service.log_level, config.service.log_json);

    info!(
        db_name = %config.db_name(),
        region = %config.s3.region,
        endpoint = %config.s3.endpoint_url,
        bucket = %config.s3.bucket,
        "Migrating disk storage files to S3"
    );

    // The audit file must exist before any record is touched
    let started_at = Local::now();
    let mut audit = AuditLog::create(&config.output_folder(), &started_at)
        .context("Failed to create audit file")?;

    let records = MongoRecordStore::connect(config.db_url(), config.db_name()).await?;
    let objects = ObjectStoreClient::new(S3Backend::new(&config.s3).await);

    let report = Migrator::new(&config.migration, &records, &objects)
        .run(&mut audit)
        .await;
    drop(audit);

    report.log_summary();

    if report.is_clean() {
        info!("Done");
        Ok(ExitCode::SUCCESS)
    } else {
        warn!(
            failed = report.total_failed(),
            "Done with failures; see log for failed record ids"
        );
        Ok(ExitCode::FAILURE)
    }
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str, json: bool) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}
