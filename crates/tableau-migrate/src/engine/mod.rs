//! Migration engine.
//!
//! A [`ContentMigrator`] pages through the source items of one content type
//! and hands each page to a [`ContentBatchMigrator`]. The batch migrator
//! prepares every item with a [`ContentItemPreparer`] and publishes it
//! according to its [`PublishStrategy`]:
//!
//! - [`ItemPublishStrategy`]: one publish call per item
//! - [`BulkPublishStrategy`]: one publish call per batch

mod batch;
mod batch_migrator;
mod bulk_publish;
mod content_migrator;
mod item;
mod item_publish;
mod preparer;
mod result;

#[cfg(test)]
pub(crate) mod test_support;

pub use batch::ContentMigrationBatch;
pub use batch_migrator::{ContentBatchMigrator, ParallelContentBatchMigrator, PublishStrategy};
pub use bulk_publish::{BulkPublishContentBatchMigrator, BulkPublishStrategy};
pub use content_migrator::ContentMigrator;
pub use item::ContentMigrationItem;
pub use item_publish::{ItemPublishContentBatchMigrator, ItemPublishStrategy};
pub use preparer::{ContentItemPreparer, EndpointContentItemPreparer, SourceContentItemPreparer};
pub use result::{
    ContentBatchMigrationResult, ContentItemMigrationResult, ContentMigrationResult,
    ItemMigrationStatus,
};
