use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::MigrationManifest;
use crate::content::Content;
use crate::engine::ContentMigrationItem;
use crate::error::{MigrateError, Result};
use crate::hooks::{ContentMappingContext, ContentMappingRunner};

/// Creates manifest entries for listed source items and maps each one to
/// its destination location.
#[derive(Clone)]
pub struct ManifestEntryBuilder {
    manifest: Arc<MigrationManifest>,
    mappings: Arc<ContentMappingRunner>,
}

impl ManifestEntryBuilder {
    pub fn new(manifest: Arc<MigrationManifest>, mappings: Arc<ContentMappingRunner>) -> Self {
        Self { manifest, mappings }
    }

    pub async fn create_entries<T: Content>(
        &self,
        items: Vec<T>,
        cancel: &CancellationToken,
    ) -> Result<Vec<ContentMigrationItem<T>>> {
        let items: Vec<_> = items
            .into_iter()
            .map(|item| {
                let entry = self.manifest.get_or_create(T::CONTENT_TYPE, item.reference());
                ContentMigrationItem::new(item, entry)
            })
            .collect();

        self.map_entries(&items, cancel).await?;
        Ok(items)
    }

    /// Run the mappings for each item and record the chosen location.
    pub async fn map_entries<T: Content>(
        &self,
        items: &[ContentMigrationItem<T>],
        cancel: &CancellationToken,
    ) -> Result<()> {
        for item in items {
            if cancel.is_cancelled() {
                return Err(MigrateError::Cancelled);
            }
            let context = ContentMappingContext::new(item.source_item().clone());
            let context = self.mappings.execute(context, cancel).await?;
            item.manifest_entry().map_to_destination(context.mapped_location);
        }
        Ok(())
    }
}
