//! Contexts passed to migration hooks.

use std::sync::Arc;

use crate::engine::ContentBatchMigrationResult;
use crate::manifest::ManifestEntry;

/// Passed to post-publish hooks after one item was published.
#[derive(Debug, Clone)]
pub struct ItemPublishedContext<P, R> {
    pub manifest_entry: Arc<ManifestEntry>,
    /// The payload that was sent.
    pub publishable: P,
    /// The item the destination returned.
    pub destination_item: R,
}

impl<P, R> ItemPublishedContext<P, R> {
    pub fn new(manifest_entry: Arc<ManifestEntry>, publishable: P, destination_item: R) -> Self {
        Self {
            manifest_entry,
            publishable,
            destination_item,
        }
    }
}

/// Passed to bulk post-publish hooks once per successful bulk publish.
#[derive(Debug, Clone)]
pub struct BulkPublishedContext<P> {
    pub manifest_entries: Vec<Arc<ManifestEntry>>,
    /// Payloads in the same order as `manifest_entries`.
    pub publishables: Vec<P>,
}

impl<P> BulkPublishedContext<P> {
    pub fn new(manifest_entries: Vec<Arc<ManifestEntry>>, publishables: Vec<P>) -> Self {
        Self {
            manifest_entries,
            publishables,
        }
    }
}

/// Passed to batch-completed hooks. A hook can stop the content type by
/// replacing the result with one that does not perform the next batch.
#[derive(Debug)]
pub struct BatchCompletedContext<T> {
    pub batch_result: ContentBatchMigrationResult<T>,
}

impl<T> BatchCompletedContext<T> {
    pub fn new(batch_result: ContentBatchMigrationResult<T>) -> Self {
        Self { batch_result }
    }

    pub fn into_result(self) -> ContentBatchMigrationResult<T> {
        self.batch_result
    }
}
