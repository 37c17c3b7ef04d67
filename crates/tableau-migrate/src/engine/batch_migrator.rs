//! Batch migration: prepare every item of a batch, hand each prepared
//! payload to a publish strategy, and collect per-item results.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{
    ContentBatchMigrationResult, ContentItemMigrationResult, ContentItemPreparer,
    ContentMigrationBatch, ContentMigrationItem, ItemMigrationStatus,
};
use crate::config::ConfigReader;
use crate::content::{Content, Publishable};
use crate::error::{MigrateError, Result};

/// Migrates one batch of items of a content type.
#[async_trait]
pub trait ContentBatchMigrator<T: Content>: Send + Sync {
    /// Migrate `items` under a batch token derived from `cancel`.
    ///
    /// Item failures are recorded in the manifest and do not fail the call.
    /// Returns `Err` only when `cancel` itself was cancelled.
    async fn migrate(
        &self,
        items: Vec<ContentMigrationItem<T>>,
        cancel: &CancellationToken,
    ) -> Result<ContentBatchMigrationResult<T>>;
}

/// What happens to an item once its payload is prepared.
#[async_trait]
pub trait PublishStrategy<T: Content, P: Publishable>: Send + Sync + 'static {
    /// Migrate one item whose payload is ready.
    ///
    /// An `Err` fails this item only; a cancellation error marks it canceled
    /// and `MigrateError::halts_batch` errors stop the rest of the batch.
    async fn migrate_prepared_item(
        &self,
        item: &ContentMigrationItem<T>,
        payload: &P,
        cancel: &CancellationToken,
    ) -> Result<()>;

    /// Runs once after every item of a batch that was not cancelled.
    async fn complete_batch(&self, _batch: &ContentMigrationBatch<T, P>) -> Result<()> {
        Ok(())
    }
}

struct BatchWorker<T, P, S> {
    preparer: Arc<dyn ContentItemPreparer<T, P>>,
    strategy: S,
    config: Arc<dyn ConfigReader>,
}

impl<T, P, S> BatchWorker<T, P, S>
where
    T: Content,
    P: Publishable,
    S: PublishStrategy<T, P>,
{
    async fn prepare_and_migrate(
        &self,
        batch: &ContentMigrationBatch<T, P>,
        index: usize,
    ) -> Result<()> {
        let item = &batch.items()[index];
        let payload = self.preparer.prepare(item, batch.cancel_token()).await?;
        batch.store_prepared(index, payload.clone());
        self.strategy
            .migrate_prepared_item(item, &payload, batch.cancel_token())
            .await
    }

    async fn migrate_batch_item(&self, batch: &ContentMigrationBatch<T, P>, index: usize) {
        let entry = batch.items()[index].manifest_entry().clone();

        let result = if batch.is_cancelled() {
            ContentItemMigrationResult::canceled(entry.clone())
        } else {
            match self.prepare_and_migrate(batch, index).await {
                Ok(()) => ContentItemMigrationResult::succeeded(entry.clone()),
                Err(e) => ContentItemMigrationResult::from_error(entry.clone(), e),
            }
        };

        match result.status() {
            ItemMigrationStatus::Failed => {
                for e in result.errors() {
                    warn!("{} {} failed: {}", T::CONTENT_TYPE, entry.source().location, e);
                }
                entry.set_failed(result.errors());
            }
            ItemMigrationStatus::Canceled => {
                entry.set_canceled();
            }
            ItemMigrationStatus::Succeeded => {}
        }

        let continue_batch = result.continue_batch();
        batch.push_result(result);

        if !continue_batch {
            warn!(
                "{} {}: halting the rest of the batch",
                T::CONTENT_TYPE,
                entry.source().location
            );
            batch.cancel_token().cancel();
        }
    }
}

/// Batch migrator that runs the items of a batch concurrently, up to the
/// configured parallelism.
pub struct ParallelContentBatchMigrator<T, P, S> {
    worker: Arc<BatchWorker<T, P, S>>,
}

impl<T, P, S> ParallelContentBatchMigrator<T, P, S>
where
    T: Content,
    P: Publishable,
    S: PublishStrategy<T, P>,
{
    pub fn new(
        preparer: Arc<dyn ContentItemPreparer<T, P>>,
        strategy: S,
        config: Arc<dyn ConfigReader>,
    ) -> Self {
        Self {
            worker: Arc::new(BatchWorker {
                preparer,
                strategy,
                config,
            }),
        }
    }

    async fn migrate_batch(&self, batch: &Arc<ContentMigrationBatch<T, P>>) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let parallelism = self.worker.config.snapshot().get_parallelism().max(1);
        let semaphore = Arc::new(Semaphore::new(parallelism));
        let mut handles = Vec::with_capacity(batch.len());

        for index in 0..batch.len() {
            // Once the batch is cancelled the remaining items run inline and
            // fail fast, so every item still gets a result.
            let permit = tokio::select! {
                biased;
                _ = batch.cancel_token().cancelled() => None,
                permit = semaphore.clone().acquire_owned() => permit.ok(),
            };

            match permit {
                Some(permit) => {
                    let worker = Arc::clone(&self.worker);
                    let task_batch = Arc::clone(batch);
                    let handle = tokio::spawn(async move {
                        let _permit = permit;
                        worker.migrate_batch_item(&task_batch, index).await;
                    });
                    handles.push((index, handle));
                }
                None => self.worker.migrate_batch_item(batch, index).await,
            }
        }

        for (index, handle) in handles {
            if let Err(e) = handle.await {
                let entry = batch.items()[index].manifest_entry().clone();
                let error = MigrateError::Task(format!("item task failed: {}", e));
                error!("{} {}: {}", T::CONTENT_TYPE, entry.source().location, error);
                entry.set_failed([&error]);
                batch.push_result(ContentItemMigrationResult::failed(entry, vec![error]));
            }
        }

        if batch.is_cancelled() {
            return Err(MigrateError::Cancelled);
        }

        self.worker.strategy.complete_batch(batch).await
    }
}

#[async_trait]
impl<T, P, S> ContentBatchMigrator<T> for ParallelContentBatchMigrator<T, P, S>
where
    T: Content,
    P: Publishable,
    S: PublishStrategy<T, P>,
{
    async fn migrate(
        &self,
        items: Vec<ContentMigrationItem<T>>,
        cancel: &CancellationToken,
    ) -> Result<ContentBatchMigrationResult<T>> {
        let batch = Arc::new(ContentMigrationBatch::new(items, cancel));
        debug!("Migrating batch of {} {} items", batch.len(), T::CONTENT_TYPE);

        let result = match self.migrate_batch(&batch).await {
            Ok(()) => Ok(ContentBatchMigrationResult::succeeded(batch.take_results())),
            Err(e) if e.is_cancellation() => {
                let mut canceled = 0;
                for item in batch.items() {
                    if item.manifest_entry().set_canceled() {
                        canceled += 1;
                    }
                }
                if cancel.is_cancelled() {
                    info!("{} migration cancelled", T::CONTENT_TYPE);
                    Err(e)
                } else {
                    debug!("Batch cancelled, {} {} items canceled", canceled, T::CONTENT_TYPE);
                    Ok(ContentBatchMigrationResult::succeeded(batch.take_results()))
                }
            }
            Err(e) => {
                // Per-item outcome lives in the manifest; a terminal entry
                // keeps its status and only gains the error.
                error!("Batch of {} items failed: {}", T::CONTENT_TYPE, e);
                for item in batch.items() {
                    item.manifest_entry().set_failed([&e]);
                }
                Ok(ContentBatchMigrationResult::succeeded(batch.take_results()))
            }
        };

        batch.dispose().await;
        result
    }
}
