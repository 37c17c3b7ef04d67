//! Filters decide which source items of a page are migrated.

use async_trait::async_trait;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::TypedRegistry;
use crate::config::ConfigReader;
use crate::content::Content;
use crate::engine::ContentMigrationItem;
use crate::error::Result;

/// Narrows a page of items. Items absent from the returned list are skipped.
#[async_trait]
pub trait ContentFilter<T: Content>: Send + Sync {
    async fn execute(
        &self,
        items: Vec<ContentMigrationItem<T>>,
        cancel: &CancellationToken,
    ) -> Result<Vec<ContentMigrationItem<T>>>;
}

/// Runs every filter registered for a content type.
#[derive(Debug, Default)]
pub struct ContentFilterRunner {
    registry: TypedRegistry,
}

impl ContentFilterRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T, F>(&mut self, filter: F)
    where
        T: Content,
        F: ContentFilter<T> + 'static,
    {
        self.registry.push::<Arc<dyn ContentFilter<T>>>(Arc::new(filter));
    }

    pub fn count<T: Content>(&self) -> usize {
        self.registry.list::<Arc<dyn ContentFilter<T>>>().len()
    }

    pub async fn execute<T: Content>(
        &self,
        mut items: Vec<ContentMigrationItem<T>>,
        cancel: &CancellationToken,
    ) -> Result<Vec<ContentMigrationItem<T>>> {
        for filter in self.registry.list::<Arc<dyn ContentFilter<T>>>() {
            if items.is_empty() {
                break;
            }
            items = filter.execute(items, cancel).await?;
        }
        Ok(items)
    }
}

/// Keeps the items a predicate accepts.
pub struct PredicateFilter<T, F> {
    predicate: F,
    _content: PhantomData<fn(&T)>,
}

impl<T, F> PredicateFilter<T, F>
where
    T: Content,
    F: Fn(&ContentMigrationItem<T>) -> bool + Send + Sync,
{
    pub fn new(predicate: F) -> Self {
        Self {
            predicate,
            _content: PhantomData,
        }
    }
}

#[async_trait]
impl<T, F> ContentFilter<T> for PredicateFilter<T, F>
where
    T: Content,
    F: Fn(&ContentMigrationItem<T>) -> bool + Send + Sync,
{
    async fn execute(
        &self,
        items: Vec<ContentMigrationItem<T>>,
        _cancel: &CancellationToken,
    ) -> Result<Vec<ContentMigrationItem<T>>> {
        Ok(items.into_iter().filter(|i| (self.predicate)(i)).collect())
    }
}

/// Drops items a previous run already migrated, when
/// `skip_previously_migrated` is enabled.
pub struct PreviouslyMigratedFilter {
    config: Arc<dyn ConfigReader>,
}

impl PreviouslyMigratedFilter {
    pub fn new(config: Arc<dyn ConfigReader>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl<T: Content> ContentFilter<T> for PreviouslyMigratedFilter {
    async fn execute(
        &self,
        items: Vec<ContentMigrationItem<T>>,
        _cancel: &CancellationToken,
    ) -> Result<Vec<ContentMigrationItem<T>>> {
        if !self.config.snapshot().skip_previously_migrated {
            return Ok(items);
        }
        Ok(items
            .into_iter()
            .filter(|item| {
                let migrated = item.manifest_entry().has_migrated();
                if migrated {
                    debug!("{} {} was migrated by a previous run", T::CONTENT_TYPE, item.source_item().location());
                }
                !migrated
            })
            .collect())
    }
}

/// Drops items under the `exclude` locations configured for their type.
pub struct LocationExclusionFilter {
    config: Arc<dyn ConfigReader>,
}

impl LocationExclusionFilter {
    pub fn new(config: Arc<dyn ConfigReader>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl<T: Content> ContentFilter<T> for LocationExclusionFilter {
    async fn execute(
        &self,
        items: Vec<ContentMigrationItem<T>>,
        _cancel: &CancellationToken,
    ) -> Result<Vec<ContentMigrationItem<T>>> {
        let config = self.config.snapshot();
        let excluded = config.exclusions_for(T::CONTENT_TYPE);
        if excluded.is_empty() {
            return Ok(items);
        }
        Ok(items
            .into_iter()
            .filter(|item| {
                let location = item.source_item().location();
                !excluded.iter().any(|prefix| location.starts_with(prefix))
            })
            .collect())
    }
}
