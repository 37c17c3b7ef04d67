//! Results of migrating items, batches and content types.

use std::marker::PhantomData;
use std::sync::Arc;

use crate::content::ContentType;
use crate::error::MigrateError;
use crate::manifest::ManifestEntry;

/// Outcome of one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemMigrationStatus {
    Succeeded,
    Failed,
    Canceled,
}

/// Result of migrating one item of a batch.
#[derive(Debug)]
pub struct ContentItemMigrationResult<T> {
    status: ItemMigrationStatus,
    continue_batch: bool,
    manifest_entry: Arc<ManifestEntry>,
    errors: Vec<MigrateError>,
    _content: PhantomData<fn() -> T>,
}

impl<T> ContentItemMigrationResult<T> {
    fn new(
        status: ItemMigrationStatus,
        continue_batch: bool,
        manifest_entry: Arc<ManifestEntry>,
        errors: Vec<MigrateError>,
    ) -> Self {
        Self {
            status,
            continue_batch,
            manifest_entry,
            errors,
            _content: PhantomData,
        }
    }

    pub fn succeeded(manifest_entry: Arc<ManifestEntry>) -> Self {
        Self::new(ItemMigrationStatus::Succeeded, true, manifest_entry, Vec::new())
    }

    pub fn failed(manifest_entry: Arc<ManifestEntry>, errors: Vec<MigrateError>) -> Self {
        let continue_batch = !errors.iter().any(MigrateError::halts_batch);
        Self::new(ItemMigrationStatus::Failed, continue_batch, manifest_entry, errors)
    }

    pub fn canceled(manifest_entry: Arc<ManifestEntry>) -> Self {
        Self::new(ItemMigrationStatus::Canceled, true, manifest_entry, Vec::new())
    }

    /// Classify `error` as a cancellation or a failure.
    pub fn from_error(manifest_entry: Arc<ManifestEntry>, error: MigrateError) -> Self {
        if error.is_cancellation() {
            Self::canceled(manifest_entry)
        } else {
            Self::failed(manifest_entry, vec![error])
        }
    }

    /// Copy of this result that stops (or resumes) the rest of the batch.
    pub fn with_continue_batch(self, continue_batch: bool) -> Self {
        Self {
            continue_batch,
            ..self
        }
    }

    pub fn status(&self) -> ItemMigrationStatus {
        self.status
    }

    pub fn is_success(&self) -> bool {
        self.status == ItemMigrationStatus::Succeeded
    }

    pub fn is_canceled(&self) -> bool {
        self.status == ItemMigrationStatus::Canceled
    }

    /// Whether the remaining items of the batch should still run.
    pub fn continue_batch(&self) -> bool {
        self.continue_batch
    }

    pub fn manifest_entry(&self) -> &Arc<ManifestEntry> {
        &self.manifest_entry
    }

    pub fn errors(&self) -> &[MigrateError] {
        &self.errors
    }
}

/// Result of migrating one batch.
#[derive(Debug)]
pub struct ContentBatchMigrationResult<T> {
    success: bool,
    perform_next_batch: bool,
    item_results: Vec<ContentItemMigrationResult<T>>,
    errors: Vec<MigrateError>,
}

impl<T> ContentBatchMigrationResult<T> {
    pub fn succeeded(item_results: Vec<ContentItemMigrationResult<T>>) -> Self {
        Self {
            success: true,
            perform_next_batch: true,
            item_results,
            errors: Vec::new(),
        }
    }

    pub fn failed(
        item_results: Vec<ContentItemMigrationResult<T>>,
        errors: Vec<MigrateError>,
    ) -> Self {
        Self {
            success: false,
            perform_next_batch: true,
            item_results,
            errors,
        }
    }

    /// Copy of this result with a different continuation.
    pub fn with_perform_next_batch(self, perform_next_batch: bool) -> Self {
        Self {
            perform_next_batch,
            ..self
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn perform_next_batch(&self) -> bool {
        self.perform_next_batch
    }

    /// Item results in completion order.
    pub fn item_results(&self) -> &[ContentItemMigrationResult<T>] {
        &self.item_results
    }

    pub fn errors(&self) -> &[MigrateError] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<MigrateError> {
        self.errors
    }
}

/// Result of migrating every batch of one content type.
#[derive(Debug)]
pub struct ContentMigrationResult {
    pub content_type: ContentType,
    /// Batches handed to the batch migrator.
    pub batches: usize,
    /// Item results received from all batches.
    pub items: usize,
    /// Batch and content-type level failures.
    pub errors: Vec<MigrateError>,
}

impl ContentMigrationResult {
    pub fn new(content_type: ContentType) -> Self {
        Self {
            content_type,
            batches: 0,
            items: 0,
            errors: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    pub(crate) fn record_batch<T>(&mut self, batch: ContentBatchMigrationResult<T>) {
        self.batches += 1;
        self.items += batch.item_results().len();
        self.errors.extend(batch.into_errors());
    }
}
