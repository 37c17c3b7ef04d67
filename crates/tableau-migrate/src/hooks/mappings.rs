//! Mappings choose where a source item lands on the destination.

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::TypedRegistry;
use crate::config::ConfigReader;
use crate::content::{Content, ContentLocation};
use crate::error::Result;

/// A source item and the destination location chosen for it so far.
#[derive(Debug, Clone)]
pub struct ContentMappingContext<T> {
    pub content_item: T,
    pub mapped_location: ContentLocation,
}

impl<T: Content> ContentMappingContext<T> {
    /// Context that maps the item to its own source location.
    pub fn new(content_item: T) -> Self {
        let mapped_location = content_item.location().clone();
        Self {
            content_item,
            mapped_location,
        }
    }

    pub fn map_to(mut self, location: ContentLocation) -> Self {
        self.mapped_location = location;
        self
    }
}

#[async_trait]
pub trait ContentMapping<T: Content>: Send + Sync {
    async fn execute(
        &self,
        context: ContentMappingContext<T>,
        cancel: &CancellationToken,
    ) -> Result<ContentMappingContext<T>>;
}

/// Runs every mapping registered for a content type.
#[derive(Debug, Default)]
pub struct ContentMappingRunner {
    registry: TypedRegistry,
}

impl ContentMappingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T, M>(&mut self, mapping: M)
    where
        T: Content,
        M: ContentMapping<T> + 'static,
    {
        self.registry.push::<Arc<dyn ContentMapping<T>>>(Arc::new(mapping));
    }

    pub fn count<T: Content>(&self) -> usize {
        self.registry.list::<Arc<dyn ContentMapping<T>>>().len()
    }

    pub async fn execute<T: Content>(
        &self,
        mut context: ContentMappingContext<T>,
        cancel: &CancellationToken,
    ) -> Result<ContentMappingContext<T>> {
        for mapping in self.registry.list::<Arc<dyn ContentMapping<T>>>() {
            context = mapping.execute(context, cancel).await?;
        }
        Ok(context)
    }
}

/// Applies the configured `location_mappings`. The first mapping whose
/// `from` prefix matches wins.
pub struct PrefixLocationMapping {
    config: Arc<dyn ConfigReader>,
}

impl PrefixLocationMapping {
    pub fn new(config: Arc<dyn ConfigReader>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl<T: Content> ContentMapping<T> for PrefixLocationMapping {
    async fn execute(
        &self,
        context: ContentMappingContext<T>,
        _cancel: &CancellationToken,
    ) -> Result<ContentMappingContext<T>> {
        let config = self.config.snapshot();
        let mapped = config
            .location_mappings_for(T::CONTENT_TYPE)
            .find_map(|m| context.mapped_location.replace_prefix(&m.from, &m.to));

        Ok(match mapped {
            Some(location) => {
                debug!(
                    "Mapped {} {} to {}",
                    T::CONTENT_TYPE,
                    context.mapped_location,
                    location
                );
                context.map_to(location)
            }
            None => context,
        })
    }
}
