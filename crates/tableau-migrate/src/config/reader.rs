//! Read access to the migration configuration.

use std::sync::{Arc, PoisonError, RwLock};

use super::MigrationConfig;

/// Source of immutable migration configuration snapshots.
///
/// Callers take one snapshot per operation (a content type, a batch
/// schedule) and use it for the whole operation.
pub trait ConfigReader: Send + Sync {
    fn snapshot(&self) -> Arc<MigrationConfig>;
}

/// A [`ConfigReader`] whose configuration can be replaced between operations.
#[derive(Debug)]
pub struct SharedConfigReader {
    current: RwLock<Arc<MigrationConfig>>,
}

impl SharedConfigReader {
    pub fn new(config: MigrationConfig) -> Self {
        Self {
            current: RwLock::new(Arc::new(config)),
        }
    }

    /// Install a new configuration. Snapshots already handed out are unaffected.
    pub fn replace(&self, config: MigrationConfig) {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *current = Arc::new(config);
    }
}

impl ConfigReader for SharedConfigReader {
    fn snapshot(&self) -> Arc<MigrationConfig> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
