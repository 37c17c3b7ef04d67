//! # tableau-migrate
//!
//! Content migration library for analytics sites.
//!
//! This library moves users, groups, projects, data sources and workbooks
//! from a source site to a destination site with support for:
//!
//! - **Batched migration** with bounded per-batch parallelism
//! - **Bulk publishing** of users in a single call per batch
//! - **Hooks, filters, mappings and transformers** around every step
//! - **Resume capability** via an HMAC-signed JSON manifest
//! - **Cancellation** that stops one batch or the whole migration
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tableau_migrate::{Config, InMemorySite, Orchestrator};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> tableau_migrate::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let source = Arc::new(InMemorySite::load("source", &config.source.snapshot)?);
//!     let destination = Arc::new(InMemorySite::load("destination", &config.destination.snapshot)?);
//!     let result = Orchestrator::new(config, source, destination)
//!         .run(&CancellationToken::new())
//!         .await?;
//!     println!("Migrated {} items", result.items_migrated);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod content;
pub mod endpoints;
pub mod engine;
pub mod error;
pub mod hooks;
pub mod manifest;
pub mod orchestrator;
pub mod pipeline;

// Re-exports for convenient access
pub use config::{Config, ConfigReader, MigrationConfig, SharedConfigReader};
pub use content::{Content, ContentLocation, ContentReference, ContentType, Publishable};
pub use endpoints::{InMemorySite, SiteDestination, SiteSnapshot, SiteSource};
pub use engine::{ContentBatchMigrator, ContentMigrationResult, ContentMigrator};
pub use error::{MigrateError, Result};
pub use manifest::{ManifestFile, MigrationManifest, RunStatus};
pub use orchestrator::{ContentTypeSummary, MigrationResult, Orchestrator};
pub use pipeline::{MigrationPipeline, MigrationPlugins};
