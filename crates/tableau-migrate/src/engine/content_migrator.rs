//! Migration of every item of one content type, batch by batch.

use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::{ContentBatchMigrator, ContentMigrationResult};
use crate::config::ConfigReader;
use crate::content::Content;
use crate::endpoints::SourceEndpoint;
use crate::error::{MigrateError, Result};
use crate::hooks::{BatchCompletedContext, ContentFilterRunner, MigrationHookRunner};
use crate::manifest::ManifestEntryBuilder;

/// Pages through the source items of `T` and hands each page to the batch
/// migrator. Batches run one after the other.
pub struct ContentMigrator<T: Content> {
    source: Arc<dyn SourceEndpoint<T>>,
    entry_builder: ManifestEntryBuilder,
    filters: Arc<ContentFilterRunner>,
    hooks: Arc<MigrationHookRunner>,
    batch_migrator: Arc<dyn ContentBatchMigrator<T>>,
    config: Arc<dyn ConfigReader>,
}

impl<T: Content> ContentMigrator<T> {
    pub fn new(
        source: Arc<dyn SourceEndpoint<T>>,
        entry_builder: ManifestEntryBuilder,
        filters: Arc<ContentFilterRunner>,
        hooks: Arc<MigrationHookRunner>,
        batch_migrator: Arc<dyn ContentBatchMigrator<T>>,
        config: Arc<dyn ConfigReader>,
    ) -> Self {
        Self {
            source,
            entry_builder,
            filters,
            hooks,
            batch_migrator,
            config,
        }
    }

    /// Migrate every source item of `T`.
    ///
    /// Failures are collected in the result; only cancellation of `cancel`
    /// is returned as an error.
    pub async fn migrate(&self, cancel: &CancellationToken) -> Result<ContentMigrationResult> {
        let mut result = ContentMigrationResult::new(T::CONTENT_TYPE);

        match self.migrate_pages(&mut result, cancel).await {
            Ok(()) => {}
            Err(e) if e.is_cancellation() && cancel.is_cancelled() => {
                info!("{} migration cancelled", T::CONTENT_TYPE);
                return Err(e);
            }
            Err(e) => {
                error!("{} migration stopped: {}", T::CONTENT_TYPE, e);
                result.errors.push(e);
            }
        }

        info!(
            "{}: {} items in {} batches, {} errors",
            T::CONTENT_TYPE,
            result.items,
            result.batches,
            result.errors.len()
        );
        Ok(result)
    }

    async fn migrate_pages(
        &self,
        result: &mut ContentMigrationResult,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let config = self.config.snapshot();
        let page_size = config.batch_size_for(T::CONTENT_TYPE);
        let max_batches = config.max_batches_for(T::CONTENT_TYPE);
        let mut pager = self.source.pager(page_size).await?;

        while let Some(page) = pager.next_page().await? {
            if cancel.is_cancelled() {
                return Err(MigrateError::Cancelled);
            }

            let items = self.entry_builder.create_entries(page, cancel).await?;
            let listed: Vec<_> = items.iter().map(|i| i.manifest_entry().clone()).collect();

            let items = self.filters.execute(items, cancel).await?;
            let kept: HashSet<Uuid> = items.iter().map(|i| i.source_item().id()).collect();
            for entry in listed.iter().filter(|e| !kept.contains(&e.source().id)) {
                entry.set_skipped();
            }
            if listed.len() > items.len() {
                debug!(
                    "{}: {} of {} items filtered out",
                    T::CONTENT_TYPE,
                    listed.len() - items.len(),
                    listed.len()
                );
            }

            if items.is_empty() {
                continue;
            }

            let batch_result = self.batch_migrator.migrate(items, cancel).await?;
            let context = self
                .hooks
                .execute(BatchCompletedContext::new(batch_result), cancel)
                .await?;
            let batch_result = context.into_result();

            let perform_next_batch = batch_result.perform_next_batch();
            result.record_batch(batch_result);

            if !perform_next_batch {
                info!("{}: stopping after batch {}", T::CONTENT_TYPE, result.batches);
                break;
            }
            if max_batches.is_some_and(|max| result.batches >= max) {
                info!(
                    "{}: batch limit of {} reached",
                    T::CONTENT_TYPE,
                    result.batches
                );
                break;
            }
        }

        Ok(())
    }
}
