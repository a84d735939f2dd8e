//! S3 Migrate
//!
//! One-shot migration of disk-stored files into an S3 bucket. Every document in
//! a fixed list of MongoDB collections is inspected; those whose `loader` says
//! the bytes live on the local filesystem are uploaded to the bucket and then
//! repointed at the S3 loader. Each migrated `loader_id` is appended to a
//! per-run audit file.
//!
//! ## Architecture
//!
//! ```text
//! MongoDB                     Migrator                     S3 Bucket
//! ┌──────────────┐           ┌──────────────┐            ┌──────────────┐
//! │ logo         │  scan     │ decide       │  exists?   │              │
//! │ uploads      │──────────▶│ stat         │───────────▶│ {loader_id}  │
//! │ thumbnails   │           │ upload       │  put       │              │
//! │ ...          │◀──────────│ repoint      │            └──────────────┘
//! └──────────────┘  $set     └──────────────┘
//!                                   │
//!                                   ▼
//!                            ┌──────────────┐
//!                            │ Audit file   │
//!                            └──────────────┘
//! ```
//!
//! Processing is strictly sequential. A failing record or collection is
//! counted and logged; only failing to open the audit file aborts the run.
//! Uploads check for an existing object first, so reruns are safe.

pub mod config;
pub mod error;
pub mod migrator;
pub mod object_store;
pub mod record_store;
pub mod report;

pub use config::{Config, Overrides};
pub use error::{MigrationError, Result};
pub use migrator::{Migrator, RecordOutcome};
pub use object_store::{ObjectBackend, ObjectStoreClient, S3Backend, UploadOutcome};
pub use record_store::{LoaderKind, MigrationRecord, MongoRecordStore, RecordStore};
pub use report::{AuditLog, CollectionReport, RunReport};
