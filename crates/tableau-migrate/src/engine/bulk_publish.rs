//! Publishing a whole batch with a single bulk call.

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{
    ContentMigrationBatch, ContentMigrationItem, ParallelContentBatchMigrator, PublishStrategy,
};
use crate::content::{Content, Publishable};
use crate::endpoints::BulkDestinationEndpoint;
use crate::error::{MigrateError, Result};
use crate::hooks::{BulkPublishedContext, MigrationHookRunner};
use crate::manifest::ManifestEntry;

/// Prepares every item, then publishes the prepared payloads in one call.
///
/// Items count as migrated only once the bulk call succeeds. A failed bulk
/// call fails every item of the batch with the same errors.
pub struct BulkPublishStrategy<P> {
    destination: Arc<dyn BulkDestinationEndpoint<P>>,
    hooks: Arc<MigrationHookRunner>,
}

impl<P> BulkPublishStrategy<P> {
    pub fn new(
        destination: Arc<dyn BulkDestinationEndpoint<P>>,
        hooks: Arc<MigrationHookRunner>,
    ) -> Self {
        Self { destination, hooks }
    }
}

#[async_trait]
impl<T, P> PublishStrategy<T, P> for BulkPublishStrategy<P>
where
    T: Content,
    P: Publishable,
{
    async fn migrate_prepared_item(
        &self,
        _item: &ContentMigrationItem<T>,
        _payload: &P,
        _cancel: &CancellationToken,
    ) -> Result<()> {
        Ok(())
    }

    async fn complete_batch(&self, batch: &ContentMigrationBatch<T, P>) -> Result<()> {
        if batch.is_cancelled() {
            return Err(MigrateError::Cancelled);
        }

        let prepared = batch.prepared_payloads();
        if prepared.is_empty() {
            return Ok(());
        }

        let entries: Vec<Arc<ManifestEntry>> = prepared
            .iter()
            .map(|(index, _)| batch.items()[*index].manifest_entry().clone())
            .collect();
        let payloads: Vec<P> = prepared.into_iter().map(|(_, payload)| payload).collect();

        match self
            .destination
            .publish_batch(&payloads, batch.cancel_token())
            .await
        {
            Ok(references) => {
                for (entry, reference) in entries.iter().zip(references) {
                    entry.destination_found(reference);
                }
                for entry in &entries {
                    entry.set_migrated();
                }
                info!("Bulk published {} {} items", entries.len(), T::CONTENT_TYPE);

                let context = BulkPublishedContext::new(entries, payloads);
                self.hooks.execute(context, batch.cancel_token()).await?;
                Ok(())
            }
            Err(e) if e.is_cancellation() => Err(e),
            Err(e) => {
                warn!(
                    "Bulk publish of {} {} items failed: {}",
                    entries.len(),
                    T::CONTENT_TYPE,
                    e
                );
                let errors = [e.to_string()];
                for entry in &entries {
                    entry.set_failed(&errors);
                }
                Ok(())
            }
        }
    }
}

/// Batch migrator that publishes each batch with one bulk call.
pub type BulkPublishContentBatchMigrator<T, P> =
    ParallelContentBatchMigrator<T, P, BulkPublishStrategy<P>>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MigrationConfig, SharedConfigReader};
    use crate::content::User;
    use crate::engine::test_support::{
        users, ReleaseLog, TestDestination, TestPreparer, TrackedPayload,
    };
    use crate::engine::{ContentBatchMigrator, ContentItemPreparer};
    use crate::hooks::MigrationHook;
    use crate::manifest::ManifestEntryStatus;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct BulkHook {
        calls: AtomicUsize,
        payloads: AtomicUsize,
    }

    #[async_trait]
    impl MigrationHook<BulkPublishedContext<TrackedPayload>> for Arc<BulkHook> {
        async fn execute(
            &self,
            context: BulkPublishedContext<TrackedPayload>,
            _cancel: &CancellationToken,
        ) -> Result<BulkPublishedContext<TrackedPayload>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.payloads
                .fetch_add(context.publishables.len(), Ordering::SeqCst);
            Ok(context)
        }
    }

    fn migrator(
        destination: Arc<TestDestination>,
        preparer: TestPreparer,
        hook: Arc<BulkHook>,
    ) -> BulkPublishContentBatchMigrator<User, TrackedPayload> {
        let mut hooks = MigrationHookRunner::new();
        hooks.register::<BulkPublishedContext<TrackedPayload>, _>(hook);
        let config = Arc::new(SharedConfigReader::new(MigrationConfig {
            parallelism: Some(4),
            ..Default::default()
        }));
        let preparer: Arc<dyn ContentItemPreparer<User, TrackedPayload>> = Arc::new(preparer);
        ParallelContentBatchMigrator::new(
            preparer,
            BulkPublishStrategy::<TrackedPayload>::new(destination, Arc::new(hooks)),
            config,
        )
    }

    #[tokio::test]
    async fn test_bulk_success_marks_all_migrated_and_runs_hook_once() {
        let log = ReleaseLog::default();
        let destination = Arc::new(TestDestination::default());
        let hook = Arc::new(BulkHook::default());
        let items = users(&["a", "b", "c"]);

        let result = migrator(destination.clone(), TestPreparer::new(&log), hook.clone())
            .migrate(items.clone(), &CancellationToken::new())
            .await
            .unwrap();

        assert!(result.item_results().iter().all(|r| r.is_success()));
        assert_eq!(destination.bulk_calls(), 1);
        assert_eq!(hook.calls.load(Ordering::SeqCst), 1);
        assert_eq!(hook.payloads.load(Ordering::SeqCst), 3);
        for item in &items {
            assert_eq!(item.manifest_entry().status(), ManifestEntryStatus::Migrated);
            assert!(item.manifest_entry().destination().is_some());
        }
        assert_eq!(log.released().len(), 3);
    }

    #[tokio::test]
    async fn test_bulk_failure_fails_every_entry_with_shared_errors() {
        let log = ReleaseLog::default();
        let destination = Arc::new(
            TestDestination::default()
                .fail_bulk(|| MigrateError::Endpoint("import job failed".into())),
        );
        let hook = Arc::new(BulkHook::default());
        let items = users(&["a", "b"]);

        migrator(destination.clone(), TestPreparer::new(&log), hook.clone())
            .migrate(items.clone(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(destination.bulk_calls(), 1);
        assert_eq!(hook.calls.load(Ordering::SeqCst), 0);
        let first = items[0].manifest_entry();
        let second = items[1].manifest_entry();
        assert_eq!(first.status(), ManifestEntryStatus::Failed);
        assert_eq!(second.status(), ManifestEntryStatus::Failed);
        assert_eq!(first.errors(), second.errors());
        assert!(first.errors()[0].contains("import job failed"));
        assert_eq!(log.released().len(), 2);
    }

    #[tokio::test]
    async fn test_bulk_hook_failure_keeps_batch_succeeded() {
        struct FailingBulkHook;

        #[async_trait]
        impl MigrationHook<BulkPublishedContext<TrackedPayload>> for FailingBulkHook {
            async fn execute(
                &self,
                _context: BulkPublishedContext<TrackedPayload>,
                _cancel: &CancellationToken,
            ) -> Result<BulkPublishedContext<TrackedPayload>> {
                Err(MigrateError::hook("group sync rejected"))
            }
        }

        let log = ReleaseLog::default();
        let destination = Arc::new(TestDestination::default());
        let mut hooks = MigrationHookRunner::new();
        hooks.register::<BulkPublishedContext<TrackedPayload>, _>(FailingBulkHook);
        let config = Arc::new(SharedConfigReader::new(MigrationConfig::default()));
        let preparer: Arc<dyn ContentItemPreparer<User, TrackedPayload>> =
            Arc::new(TestPreparer::new(&log));
        let migrator = ParallelContentBatchMigrator::new(
            preparer,
            BulkPublishStrategy::<TrackedPayload>::new(destination.clone(), Arc::new(hooks)),
            config,
        );
        let items = users(&["a", "b"]);

        let result = migrator
            .migrate(items.clone(), &CancellationToken::new())
            .await
            .unwrap();

        assert!(result.is_success());
        assert!(result.errors().is_empty());
        assert_eq!(destination.bulk_calls(), 1);
        for item in &items {
            let entry = item.manifest_entry();
            assert_eq!(entry.status(), ManifestEntryStatus::Migrated);
            assert!(entry.destination().is_some());
            assert!(entry.errors()[0].contains("group sync rejected"));
        }
    }

    #[tokio::test]
    async fn test_bulk_publishes_only_prepared_items() {
        let log = ReleaseLog::default();
        let destination = Arc::new(TestDestination::default());
        let hook = Arc::new(BulkHook::default());
        let items = users(&["a", "b", "c"]);

        migrator(destination.clone(), TestPreparer::new(&log).fail("b"), hook.clone())
            .migrate(items.clone(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(destination.published(), vec!["a".to_string(), "c".to_string()]);
        assert_eq!(items[1].manifest_entry().status(), ManifestEntryStatus::Failed);
        assert_eq!(hook.payloads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cancelled_migration_skips_bulk_publish() {
        let log = ReleaseLog::default();
        let destination = Arc::new(TestDestination::default());
        let hook = Arc::new(BulkHook::default());
        let items = users(&["a", "b"]);
        let migration = CancellationToken::new();
        migration.cancel();

        let err = migrator(destination.clone(), TestPreparer::new(&log), hook)
            .migrate(items.clone(), &migration)
            .await
            .unwrap_err();

        assert!(err.is_cancellation());
        assert_eq!(destination.bulk_calls(), 0);
        assert_eq!(items[0].manifest_entry().status(), ManifestEntryStatus::Canceled);
    }
}
