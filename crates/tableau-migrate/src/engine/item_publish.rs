//! Publishing each item right after it is prepared.

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{ContentMigrationItem, ParallelContentBatchMigrator, PublishStrategy};
use crate::content::{Content, Publishable};
use crate::endpoints::DestinationEndpoint;
use crate::error::{MigrateError, Result};
use crate::hooks::{ItemPublishedContext, MigrationHookRunner};

/// Publishes one item at a time and runs the post-publish hooks for it.
pub struct ItemPublishStrategy<P, R> {
    destination: Arc<dyn DestinationEndpoint<P, R>>,
    hooks: Arc<MigrationHookRunner>,
}

impl<P, R> ItemPublishStrategy<P, R> {
    pub fn new(
        destination: Arc<dyn DestinationEndpoint<P, R>>,
        hooks: Arc<MigrationHookRunner>,
    ) -> Self {
        Self { destination, hooks }
    }
}

#[async_trait]
impl<T, P, R> PublishStrategy<T, P> for ItemPublishStrategy<P, R>
where
    T: Content,
    P: Publishable,
    R: Content,
{
    async fn migrate_prepared_item(
        &self,
        item: &ContentMigrationItem<T>,
        payload: &P,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(MigrateError::Cancelled);
        }

        let published = self.destination.publish(payload, cancel).await?;

        let entry = item.manifest_entry();
        entry.destination_found(published.reference().clone());
        entry.set_migrated();
        debug!(
            "Published {} {} as {}",
            T::CONTENT_TYPE,
            entry.source().location,
            published.location()
        );

        let context = ItemPublishedContext::new(entry.clone(), payload.clone(), published);
        self.hooks.execute(context, cancel).await?;
        Ok(())
    }
}

/// Batch migrator that publishes items one by one.
pub type ItemPublishContentBatchMigrator<T, P, R> =
    ParallelContentBatchMigrator<T, P, ItemPublishStrategy<P, R>>;

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

    /// Counts invocations and checks the entry was completed first.
    #[derive(Default)]
    struct RecordingHook {
        calls: AtomicUsize,
        completed_before: AtomicUsize,
    }

    #[async_trait]
    impl MigrationHook<ItemPublishedContext<TrackedPayload, User>> for Arc<RecordingHook> {
        async fn execute(
            &self,
            context: ItemPublishedContext<TrackedPayload, User>,
            _cancel: &CancellationToken,
        ) -> Result<ItemPublishedContext<TrackedPayload, User>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let entry = &context.manifest_entry;
            if entry.status() == ManifestEntryStatus::Migrated
                && entry.destination() == Some(context.destination_item.reference.clone())
            {
                self.completed_before.fetch_add(1, Ordering::SeqCst);
            }
            Ok(context)
        }
    }

    fn migrator(
        destination: Arc<TestDestination>,
        hooks: MigrationHookRunner,
        log: &ReleaseLog,
    ) -> ItemPublishContentBatchMigrator<User, TrackedPayload, User> {
        let config = Arc::new(SharedConfigReader::new(MigrationConfig {
            parallelism: Some(2),
            ..Default::default()
        }));
        let preparer: Arc<dyn ContentItemPreparer<User, TrackedPayload>> =
            Arc::new(TestPreparer::new(log));
        ParallelContentBatchMigrator::new(
            preparer,
            ItemPublishStrategy::<TrackedPayload, User>::new(destination, Arc::new(hooks)),
            config,
        )
    }

    #[tokio::test]
    async fn test_publish_sets_destination_then_runs_hook_once_per_success() {
        let log = ReleaseLog::default();
        let destination = Arc::new(
            TestDestination::default().fail("b", || MigrateError::publish("local/b", "409")),
        );
        let hook = Arc::new(RecordingHook::default());
        let mut hooks = MigrationHookRunner::new();
        hooks.register::<ItemPublishedContext<TrackedPayload, User>, _>(hook.clone());

        let items = users(&["a", "b", "c"]);
        let result = migrator(destination.clone(), hooks, &log)
            .migrate(items.clone(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.item_results().len(), 3);
        assert_eq!(hook.calls.load(Ordering::SeqCst), 2);
        assert_eq!(hook.completed_before.load(Ordering::SeqCst), 2);

        let a = items[0].manifest_entry();
        assert_eq!(a.status(), ManifestEntryStatus::Migrated);
        assert!(a.destination().is_some());

        let b = items[1].manifest_entry();
        assert_eq!(b.status(), ManifestEntryStatus::Failed);
        assert!(b.destination().is_none());

        assert_eq!(destination.published(), vec!["a".to_string(), "c".to_string()]);
        assert_eq!(log.released().len(), 3);
    }

    #[tokio::test]
    async fn test_hook_failure_fails_result_but_keeps_migrated() {
        struct FailingHook;

        #[async_trait]
        impl MigrationHook<ItemPublishedContext<TrackedPayload, User>> for FailingHook {
            async fn execute(
                &self,
                _context: ItemPublishedContext<TrackedPayload, User>,
                _cancel: &CancellationToken,
            ) -> Result<ItemPublishedContext<TrackedPayload, User>> {
                Err(MigrateError::hook("permissions update rejected"))
            }
        }

        let log = ReleaseLog::default();
        let mut hooks = MigrationHookRunner::new();
        hooks.register::<ItemPublishedContext<TrackedPayload, User>, _>(FailingHook);

        let items = users(&["a"]);
        let result = migrator(Arc::new(TestDestination::default()), hooks, &log)
            .migrate(items.clone(), &CancellationToken::new())
            .await
            .unwrap();

        assert!(!result.item_results()[0].is_success());
        let entry = items[0].manifest_entry();
        assert_eq!(entry.status(), ManifestEntryStatus::Migrated);
        assert!(entry.errors()[0].contains("permissions update rejected"));
    }
}
