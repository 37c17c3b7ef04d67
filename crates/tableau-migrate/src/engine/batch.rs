use crossbeam::queue::SegQueue;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{ContentItemMigrationResult, ContentMigrationItem};
use crate::content::Publishable;

/// Working state of one batch while its items are migrated.
///
/// The batch token is a child of the migration token: cancelling the batch
/// stops this batch only, cancelling the migration stops every batch.
pub struct ContentMigrationBatch<T, P: Publishable> {
    items: Vec<ContentMigrationItem<T>>,
    cancel: CancellationToken,
    results: SegQueue<ContentItemMigrationResult<T>>,
    prepared: DashMap<usize, P>,
    disposed: AtomicBool,
}

impl<T, P: Publishable> ContentMigrationBatch<T, P> {
    pub fn new(items: Vec<ContentMigrationItem<T>>, migration_cancel: &CancellationToken) -> Self {
        Self {
            items,
            cancel: migration_cancel.child_token(),
            results: SegQueue::new(),
            prepared: DashMap::new(),
            disposed: AtomicBool::new(false),
        }
    }

    pub fn items(&self) -> &[ContentMigrationItem<T>] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn push_result(&self, result: ContentItemMigrationResult<T>) {
        self.results.push(result);
    }

    /// Drain the item results collected so far, in completion order.
    pub fn take_results(&self) -> Vec<ContentItemMigrationResult<T>> {
        let mut results = Vec::with_capacity(self.results.len());
        while let Some(result) = self.results.pop() {
            results.push(result);
        }
        results
    }

    /// Keep the prepared payload of item `index` until the batch is disposed.
    pub fn store_prepared(&self, index: usize, payload: P) {
        self.prepared.insert(index, payload);
    }

    /// Prepared payloads with their item index, in item order.
    pub fn prepared_payloads(&self) -> Vec<(usize, P)> {
        let mut payloads: Vec<_> = self
            .prepared
            .iter()
            .map(|e| (*e.key(), e.value().clone()))
            .collect();
        payloads.sort_by_key(|(index, _)| *index);
        payloads
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Release every prepared payload. Only the first call does anything.
    pub async fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        let indices: Vec<usize> = self.prepared.iter().map(|e| *e.key()).collect();
        let mut payloads = Vec::with_capacity(indices.len());
        for index in indices {
            if let Some((_, payload)) = self.prepared.remove(&index) {
                payloads.push(payload);
            }
        }

        futures::future::join_all(payloads.iter().map(|p| p.release())).await;
        debug!("Released {} prepared payloads", payloads.len());
    }
}
