//! Migration manifest: the record of what happened to every source item.
//!
//! The live [`MigrationManifest`] is shared by all workers of a run. At the
//! end of a run it is written out as a [`ManifestFile`], which a later run
//! can load to resume.

mod builder;
mod entry;

pub use builder::ManifestEntryBuilder;
pub use entry::{ManifestEntry, ManifestEntryRecord, ManifestEntryStatus};

use crate::content::{ContentReference, ContentType};
use crate::error::{MigrateError, Result};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::collections::HashMap;
use std::fmt::Display;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

type EntryKey = (ContentType, Uuid);

/// Overall run status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Cancelled => "cancelled",
        }
    }
}

/// Entry counts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub migrated: usize,
    pub failed: usize,
    pub skipped: usize,
    pub canceled: usize,
}

impl StatusCounts {
    fn add(&mut self, status: ManifestEntryStatus) {
        match status {
            ManifestEntryStatus::Pending => self.pending += 1,
            ManifestEntryStatus::Migrated => self.migrated += 1,
            ManifestEntryStatus::Failed => self.failed += 1,
            ManifestEntryStatus::Skipped => self.skipped += 1,
            ManifestEntryStatus::Canceled => self.canceled += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.pending + self.migrated + self.failed + self.skipped + self.canceled
    }
}

/// Live manifest of one migration run.
#[derive(Debug)]
pub struct MigrationManifest {
    run_id: String,
    plan_hash: String,
    started_at: DateTime<Utc>,
    entries: DashMap<EntryKey, Arc<ManifestEntry>>,
    previous: HashMap<EntryKey, ManifestEntryRecord>,
    errors: Mutex<Vec<String>>,
}

impl MigrationManifest {
    pub fn new(run_id: impl Into<String>, plan_hash: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            plan_hash: plan_hash.into(),
            started_at: Utc::now(),
            entries: DashMap::new(),
            previous: HashMap::new(),
            errors: Mutex::new(Vec::new()),
        }
    }

    /// A manifest whose entries are seeded from a previous run.
    pub fn with_previous(
        run_id: impl Into<String>,
        plan_hash: impl Into<String>,
        previous: &ManifestFile,
    ) -> Self {
        let mut manifest = Self::new(run_id, plan_hash);
        manifest.previous = previous
            .entries
            .iter()
            .map(|r| ((r.content_type, r.source.id), r.clone()))
            .collect();
        manifest
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn plan_hash(&self) -> &str {
        &self.plan_hash
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// The entry for a source item, created on first use.
    pub fn get_or_create(
        &self,
        content_type: ContentType,
        source: &ContentReference,
    ) -> Arc<ManifestEntry> {
        self.entries
            .entry((content_type, source.id))
            .or_insert_with(|| {
                let entry = match self.previous.get(&(content_type, source.id)) {
                    Some(record) => ManifestEntry::from_previous(source.clone(), record),
                    None => ManifestEntry::new(content_type, source.clone()),
                };
                Arc::new(entry)
            })
            .clone()
    }

    pub fn find(&self, content_type: ContentType, source_id: Uuid) -> Option<Arc<ManifestEntry>> {
        self.entries
            .get(&(content_type, source_id))
            .map(|e| e.value().clone())
    }

    /// Destination of a source item, from this run or a previous one.
    pub fn destination_for(
        &self,
        content_type: ContentType,
        source_id: Uuid,
    ) -> Option<ContentReference> {
        match self.find(content_type, source_id) {
            Some(entry) => entry.destination(),
            None => self
                .previous
                .get(&(content_type, source_id))
                .and_then(|r| r.destination.clone()),
        }
    }

    /// Entries of one content type, ordered by source location.
    pub fn entries(&self, content_type: ContentType) -> Vec<Arc<ManifestEntry>> {
        let mut entries: Vec<_> = self
            .entries
            .iter()
            .filter(|e| e.key().0 == content_type)
            .map(|e| e.value().clone())
            .collect();
        entries.sort_by(|a, b| a.source().location.cmp(&b.source().location));
        entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record an error that does not belong to a single item.
    pub fn add_error(&self, error: impl Display) {
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(error.to_string());
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn summary(&self, content_type: ContentType) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for entry in self.entries.iter().filter(|e| e.key().0 == content_type) {
            counts.add(entry.value().status());
        }
        counts
    }

    /// Snapshot the manifest for persistence.
    ///
    /// Previous entries not seen again in this run are carried over so a
    /// later resume still knows their destinations.
    pub fn to_file(&self, status: RunStatus) -> ManifestFile {
        let mut entries: Vec<ManifestEntryRecord> = Vec::with_capacity(self.entries.len());
        for content_type in ContentType::MIGRATION_ORDER {
            entries.extend(self.entries(content_type).iter().map(|e| e.to_record()));
        }

        let mut carried: Vec<_> = self
            .previous
            .iter()
            .filter(|(key, _)| !self.entries.contains_key(key))
            .map(|(_, record)| record.clone())
            .collect();
        carried.sort_by(|a, b| {
            (a.content_type, &a.source.location).cmp(&(b.content_type, &b.source.location))
        });
        entries.extend(carried);

        let completed_at = match status {
            RunStatus::Running => None,
            _ => Some(Utc::now()),
        };

        ManifestFile {
            run_id: self.run_id.clone(),
            plan_hash: self.plan_hash.clone(),
            started_at: self.started_at,
            status,
            completed_at,
            entries,
            errors: self.errors(),
            hmac: None,
        }
    }
}

/// Persisted manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestFile {
    /// Unique run identifier.
    pub run_id: String,

    /// SHA256 hash of the configuration the run was planned with.
    pub plan_hash: String,

    /// When the migration started.
    pub started_at: DateTime<Utc>,

    /// Run status when the file was written.
    pub status: RunStatus,

    /// When the migration completed (if finished).
    pub completed_at: Option<DateTime<Utc>>,

    /// One record per source item.
    pub entries: Vec<ManifestEntryRecord>,

    /// Errors not tied to a single item.
    #[serde(default)]
    pub errors: Vec<String>,

    /// HMAC-SHA256 signature for integrity validation.
    /// Computed over the serialized manifest (excluding this field) using plan_hash as key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hmac: Option<String>,
}

impl ManifestFile {
    /// Compute HMAC-SHA256 signature for manifest integrity validation.
    fn compute_hmac(&self) -> Result<String> {
        let mut unsigned = self.clone();
        unsigned.hmac = None;

        let content = serde_json::to_string(&unsigned).map_err(|e| {
            MigrateError::Manifest(format!("Failed to serialize manifest for HMAC: {}", e))
        })?;

        let mut mac = HmacSha256::new_from_slice(self.plan_hash.as_bytes())
            .map_err(|e| MigrateError::Manifest(format!("Failed to create HMAC: {}", e)))?;

        mac.update(content.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Load a manifest from a file with integrity validation.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let manifest: Self = serde_json::from_str(&content)?;

        match &manifest.hmac {
            Some(stored) => {
                if stored != &manifest.compute_hmac()? {
                    return Err(MigrateError::Manifest(
                        "Manifest integrity check failed: HMAC mismatch (possible tampering)"
                            .to_string(),
                    ));
                }
            }
            None => {
                tracing::warn!("Manifest has no HMAC signature, integrity cannot be verified");
            }
        }

        Ok(manifest)
    }

    /// Save the manifest to a file (atomic write with HMAC).
    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();

        self.hmac = Some(self.compute_hmac()?);

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| MigrateError::Manifest(format!("Failed to serialize manifest: {}", e)))?;

        // Atomic write: write to temp file, then rename
        let temp_path = path.with_extension("tmp");
        std::fs::write(&temp_path, &content)?;
        std::fs::rename(&temp_path, path)?;

        Ok(())
    }

    /// Validate that the plan hash matches for resume.
    pub fn validate_plan(&self, plan_hash: &str) -> Result<()> {
        if self.plan_hash != plan_hash {
            return Err(MigrateError::ConfigChanged);
        }
        Ok(())
    }

    pub fn summary(&self, content_type: ContentType) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for record in self.entries.iter().filter(|r| r.content_type == content_type) {
            counts.add(record.status);
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn reference(path: &str) -> ContentReference {
        ContentReference::generate(path)
    }

    #[test]
    fn test_get_or_create_returns_same_entry() {
        let manifest = MigrationManifest::new("run", "hash");
        let source = reference("local/alice");

        let first = manifest.get_or_create(ContentType::User, &source);
        let second = manifest.get_or_create(ContentType::User, &source);

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(manifest.len(), 1);
    }

    #[test]
    fn test_entries_are_partitioned_by_type() {
        let manifest = MigrationManifest::new("run", "hash");
        let source = reference("Finance");
        manifest.get_or_create(ContentType::Project, &source);
        manifest.get_or_create(ContentType::Workbook, &source);

        assert_eq!(manifest.entries(ContentType::Project).len(), 1);
        assert_eq!(manifest.entries(ContentType::Workbook).len(), 1);
        assert!(manifest.entries(ContentType::User).is_empty());
    }

    #[test]
    fn test_summary_counts_statuses() {
        let manifest = MigrationManifest::new("run", "hash");
        manifest
            .get_or_create(ContentType::User, &reference("local/a"))
            .set_migrated();
        manifest
            .get_or_create(ContentType::User, &reference("local/b"))
            .set_failed(["boom"]);
        manifest.get_or_create(ContentType::User, &reference("local/c"));

        let counts = manifest.summary(ContentType::User);
        assert_eq!(counts.migrated, 1);
        assert_eq!(counts.failed, 1);
        assert_eq!(counts.pending, 1);
        assert_eq!(counts.total(), 3);
    }

    #[test]
    fn test_manifest_file_save_load() {
        let manifest = MigrationManifest::new("test-run", "abc123");
        let source = reference("local/alice");
        let entry = manifest.get_or_create(ContentType::User, &source);
        entry.destination_found(reference("local/alice"));
        entry.set_migrated();
        manifest.add_error("site unreachable");

        let file = NamedTempFile::new().unwrap();
        manifest.to_file(RunStatus::Completed).save(file.path()).unwrap();

        let loaded = ManifestFile::load(file.path()).unwrap();
        assert_eq!(loaded.run_id, "test-run");
        assert_eq!(loaded.status, RunStatus::Completed);
        assert_eq!(loaded.entries.len(), 1);
        assert_eq!(loaded.entries[0].status, ManifestEntryStatus::Migrated);
        assert_eq!(loaded.errors, vec!["site unreachable".to_string()]);
        assert!(loaded.completed_at.is_some());
    }

    #[test]
    fn test_tampered_manifest_is_rejected() {
        let manifest = MigrationManifest::new("test-run", "abc123");
        manifest.get_or_create(ContentType::User, &reference("local/alice"));

        let file = NamedTempFile::new().unwrap();
        manifest.to_file(RunStatus::Failed).save(file.path()).unwrap();

        let content = std::fs::read_to_string(file.path()).unwrap();
        std::fs::write(file.path(), content.replace("pending", "migrated")).unwrap();

        let err = ManifestFile::load(file.path()).unwrap_err();
        assert!(matches!(err, MigrateError::Manifest(_)));
    }

    #[test]
    fn test_validate_plan() {
        let file = MigrationManifest::new("run", "abc123").to_file(RunStatus::Running);
        assert!(file.validate_plan("abc123").is_ok());
        assert!(matches!(
            file.validate_plan("different"),
            Err(MigrateError::ConfigChanged)
        ));
    }

    #[test]
    fn test_previous_entries_seed_new_run() {
        let first = MigrationManifest::new("first", "hash");
        let source = reference("local/alice");
        let destination = reference("local/alice");
        let entry = first.get_or_create(ContentType::User, &source);
        entry.destination_found(destination.clone());
        entry.set_migrated();
        let previous = first.to_file(RunStatus::Completed);

        let second = MigrationManifest::with_previous("second", "hash", &previous);
        assert_eq!(
            second.destination_for(ContentType::User, source.id),
            Some(destination.clone())
        );

        let entry = second.get_or_create(ContentType::User, &source);
        assert_eq!(entry.status(), ManifestEntryStatus::Pending);
        assert!(entry.has_migrated());
        assert_eq!(entry.destination(), Some(destination));
    }

    #[test]
    fn test_unseen_previous_entries_are_carried_over() {
        let first = MigrationManifest::new("first", "hash");
        first.get_or_create(ContentType::Group, &reference("local/Sales"));
        let previous = first.to_file(RunStatus::Completed);

        let second = MigrationManifest::with_previous("second", "hash", &previous);
        let file = second.to_file(RunStatus::Completed);
        assert_eq!(file.entries.len(), 1);
        assert_eq!(file.entries[0].content_type, ContentType::Group);
    }
}
