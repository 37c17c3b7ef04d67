//! Migration orchestrator - main workflow coordinator.

use crate::config::{Config, SharedConfigReader};
use crate::content::ContentType;
use crate::endpoints::{SiteDestination, SiteSource};
use crate::engine::ContentMigrationResult;
use crate::error::{MigrateError, Result};
use crate::manifest::{ManifestFile, MigrationManifest, RunStatus, StatusCounts};
use crate::pipeline::{MigrationPipeline, MigrationPlugins};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Migration orchestrator.
pub struct Orchestrator<S, D> {
    config: Config,
    source: Arc<S>,
    destination: Arc<D>,
    plugins: MigrationPlugins,
    manifest_file: Option<PathBuf>,
    previous: Option<ManifestFile>,
}

/// Result of a migration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationResult {
    /// Unique run identifier.
    pub run_id: String,

    /// Final status.
    pub status: String,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// When the migration started.
    pub started_at: DateTime<Utc>,

    /// When the migration completed.
    pub completed_at: DateTime<Utc>,

    /// Manifest entry counts per content type, in migration order.
    pub content_types: Vec<ContentTypeSummary>,

    /// Items migrated across all content types.
    pub items_migrated: usize,

    /// Items that failed across all content types.
    pub items_failed: usize,

    /// Content-type level and run level errors.
    pub errors: Vec<String>,
}

/// Outcome of one content type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentTypeSummary {
    pub content_type: ContentType,
    pub batches: usize,
    #[serde(flatten)]
    pub counts: StatusCounts,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl<S: SiteSource, D: SiteDestination> Orchestrator<S, D> {
    /// Create a new orchestrator.
    pub fn new(config: Config, source: Arc<S>, destination: Arc<D>) -> Self {
        Self {
            config,
            source,
            destination,
            plugins: MigrationPlugins::default(),
            manifest_file: None,
            previous: None,
        }
    }

    /// Set the manifest file path for resume capability.
    pub fn with_manifest_file(mut self, path: PathBuf) -> Self {
        self.manifest_file = Some(path);
        self
    }

    /// Add caller-supplied hooks, filters, mappings and transformers.
    pub fn with_plugins(mut self, plugins: MigrationPlugins) -> Self {
        self.plugins = plugins;
        self
    }

    /// Load the previous manifest for resume.
    ///
    /// Unless `force` is set, the manifest must have been written with the
    /// same configuration.
    pub fn resume(mut self, force: bool) -> Result<Self> {
        if let Some(ref path) = self.manifest_file {
            if path.exists() {
                let previous = ManifestFile::load(path)?;
                if force {
                    if previous.validate_plan(&self.config.hash()).is_err() {
                        warn!("Config changed since {:?} was written, resuming anyway", path);
                    }
                } else {
                    previous.validate_plan(&self.config.hash())?;
                }
                info!("Resuming from manifest file: {:?}", path);
                self.previous = Some(previous);
            } else {
                warn!("No manifest at {:?}, starting a fresh run", path);
            }
        }
        Ok(self)
    }

    /// Run the migration.
    pub async fn run(self, cancel: &CancellationToken) -> Result<MigrationResult> {
        let started_at = Utc::now();
        let plan_hash = self.config.hash();
        let run_id = self
            .previous
            .as_ref()
            .map(|p| p.run_id.clone())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        info!("Starting migration run: {}", run_id);
        info!(
            "Source site: {}, destination site: {}",
            self.config.source.site, self.config.destination.site
        );

        let manifest = Arc::new(match self.previous {
            Some(ref previous) => MigrationManifest::with_previous(&run_id, &plan_hash, previous),
            None => MigrationManifest::new(&run_id, &plan_hash),
        });
        self.save_manifest(&manifest, RunStatus::Running)?;

        let config = Arc::new(SharedConfigReader::new(self.config.migration.clone()));
        let pipeline = MigrationPipeline::new(
            self.source.clone(),
            self.destination.clone(),
            manifest.clone(),
            config,
            self.plugins,
        )?;

        let outcome = pipeline.run(cancel).await;

        let (status, results) = match &outcome {
            Ok(results) if results.iter().all(ContentMigrationResult::is_success) => {
                (RunStatus::Completed, results.as_slice())
            }
            Ok(results) => (RunStatus::Failed, results.as_slice()),
            Err(e) if e.is_cancellation() => (RunStatus::Cancelled, &[][..]),
            Err(e) => {
                error!("Migration failed: {}", e);
                manifest.add_error(e);
                (RunStatus::Failed, &[][..])
            }
        };

        // Save final manifest
        let manifest_file = Self::save_manifest_file(&self.manifest_file, &manifest, status)?;

        let completed_at = Utc::now();
        let duration = (completed_at - started_at).num_milliseconds() as f64 / 1000.0;

        let content_types: Vec<ContentTypeSummary> = ContentType::MIGRATION_ORDER
            .iter()
            .map(|&content_type| {
                let result = results.iter().find(|r| r.content_type == content_type);
                ContentTypeSummary {
                    content_type,
                    batches: result.map(|r| r.batches).unwrap_or(0),
                    counts: manifest.summary(content_type),
                    errors: result
                        .map(|r| r.errors.iter().map(|e| e.to_string()).collect())
                        .unwrap_or_default(),
                }
            })
            .collect();

        let mut errors: Vec<String> = content_types
            .iter()
            .flat_map(|c| c.errors.iter().map(|e| format!("{}: {}", c.content_type, e)))
            .collect();
        errors.extend(manifest.errors());

        let result = MigrationResult {
            run_id,
            status: status.as_str().to_string(),
            duration_seconds: duration,
            started_at,
            completed_at,
            items_migrated: content_types.iter().map(|c| c.counts.migrated).sum(),
            items_failed: content_types.iter().map(|c| c.counts.failed).sum(),
            content_types,
            errors,
        };

        info!(
            "Migration {}: {} items migrated, {} failed in {:.1}s",
            result.status, result.items_migrated, result.items_failed, result.duration_seconds
        );
        if let Some(file) = manifest_file {
            info!("Manifest written with {} entries", file.entries.len());
        }

        outcome?;
        Ok(result)
    }

    /// Save the manifest to file.
    fn save_manifest(&self, manifest: &MigrationManifest, status: RunStatus) -> Result<()> {
        Self::save_manifest_file(&self.manifest_file, manifest, status).map(|_| ())
    }

    fn save_manifest_file(
        path: &Option<PathBuf>,
        manifest: &MigrationManifest,
        status: RunStatus,
    ) -> Result<Option<ManifestFile>> {
        match path {
            Some(path) => {
                let mut file = manifest.to_file(status);
                file.save(path).map_err(|e| {
                    MigrateError::Manifest(format!("Failed to write {:?}: {}", path, e))
                })?;
                Ok(Some(file))
            }
            None => Ok(None),
        }
    }
}

impl MigrationResult {
    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EndpointConfig, MigrationConfig};
    use crate::content::{User, Workbook};
    use crate::endpoints::{InMemorySite, SiteSnapshot};
    use crate::manifest::ManifestEntryStatus;
    use tempfile::TempDir;

    fn config() -> Config {
        Config {
            source: EndpointConfig {
                site: "prod".into(),
                snapshot: "prod.json".into(),
            },
            destination: EndpointConfig {
                site: "cloud".into(),
                snapshot: "cloud.json".into(),
            },
            migration: MigrationConfig {
                parallelism: Some(2),
                ..Default::default()
            },
        }
    }

    fn sites() -> (Arc<InMemorySite>, Arc<InMemorySite>) {
        let alice = User::new("local", "alice");
        let workbook = Workbook::new("Finance/Sales", alice.reference.clone());
        let source = InMemorySite::new(
            "prod",
            SiteSnapshot {
                users: vec![alice],
                workbooks: vec![workbook],
                ..Default::default()
            },
        );
        (
            Arc::new(source),
            Arc::new(InMemorySite::new("cloud", SiteSnapshot::default())),
        )
    }

    #[tokio::test]
    async fn test_run_writes_manifest_and_result() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("manifest.json");
        let (source, destination) = sites();

        let result = Orchestrator::new(config(), source, destination.clone())
            .with_manifest_file(path.clone())
            .run(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.status, "completed");
        assert_eq!(result.items_migrated, 2);
        assert_eq!(result.content_types.len(), 5);
        assert_eq!(destination.snapshot().workbooks.len(), 1);

        let file = ManifestFile::load(&path).unwrap();
        assert_eq!(file.status, RunStatus::Completed);
        assert_eq!(file.run_id, result.run_id);
        assert_eq!(file.summary(ContentType::Workbook).migrated, 1);

        let json = result.to_json().unwrap();
        assert!(json.contains("\"content_type\": \"workbook\""));
    }

    #[tokio::test]
    async fn test_resume_skips_migrated_items() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("manifest.json");
        let (source, destination) = sites();
        destination.reject(ContentType::Workbook, "Finance/Sales");

        let first = Orchestrator::new(config(), source.clone(), destination.clone())
            .with_manifest_file(path.clone())
            .run(&CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(first.items_failed, 1);

        let destination = Arc::new(InMemorySite::new("cloud", destination.snapshot()));
        let second = Orchestrator::new(config(), source, destination.clone())
            .with_manifest_file(path.clone())
            .resume(false)
            .unwrap()
            .run(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(second.run_id, first.run_id);
        assert_eq!(second.status, "completed");
        let users = &second.content_types[0];
        assert_eq!(users.counts.skipped, 1);
        assert_eq!(destination.snapshot().workbooks.len(), 1);

        let file = ManifestFile::load(&path).unwrap();
        let workbook = file
            .entries
            .iter()
            .find(|r| r.content_type == ContentType::Workbook)
            .unwrap();
        assert_eq!(workbook.status, ManifestEntryStatus::Migrated);
        assert!(workbook.destination.is_some());
    }

    #[tokio::test]
    async fn test_resume_rejects_changed_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("manifest.json");
        let (source, destination) = sites();

        Orchestrator::new(config(), source.clone(), destination.clone())
            .with_manifest_file(path.clone())
            .run(&CancellationToken::new())
            .await
            .unwrap();

        let mut changed = config();
        changed.migration.parallelism = Some(8);

        let err = Orchestrator::new(changed.clone(), source.clone(), destination.clone())
            .with_manifest_file(path.clone())
            .resume(false)
            .err()
            .unwrap();
        assert!(matches!(err, MigrateError::ConfigChanged));

        assert!(Orchestrator::new(changed, source, destination)
            .with_manifest_file(path)
            .resume(true)
            .is_ok());
    }

    #[tokio::test]
    async fn test_cancelled_run_saves_manifest() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("manifest.json");
        let (source, destination) = sites();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = Orchestrator::new(config(), source, destination)
            .with_manifest_file(path.clone())
            .run(&cancel)
            .await
            .unwrap_err();

        assert!(err.is_cancellation());
        assert_eq!(ManifestFile::load(&path).unwrap().status, RunStatus::Cancelled);
    }
}
