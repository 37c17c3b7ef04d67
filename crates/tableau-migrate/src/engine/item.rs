use std::sync::Arc;

use crate::manifest::ManifestEntry;

/// A source item paired with its manifest entry.
#[derive(Debug, Clone)]
pub struct ContentMigrationItem<T> {
    source_item: T,
    manifest_entry: Arc<ManifestEntry>,
}

impl<T> ContentMigrationItem<T> {
    pub fn new(source_item: T, manifest_entry: Arc<ManifestEntry>) -> Self {
        Self {
            source_item,
            manifest_entry,
        }
    }

    pub fn source_item(&self) -> &T {
        &self.source_item
    }

    pub fn manifest_entry(&self) -> &Arc<ManifestEntry> {
        &self.manifest_entry
    }
}
