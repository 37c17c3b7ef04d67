//! Conversion of source items into publish payloads.

use async_trait::async_trait;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::ContentMigrationItem;
use crate::content::{Content, Publishable};
use crate::endpoints::PullEndpoint;
use crate::error::{MigrateError, Result};
use crate::hooks::ContentTransformerRunner;
use crate::manifest::ManifestEntry;

/// Turns a source item into the payload published to the destination.
#[async_trait]
pub trait ContentItemPreparer<T: Content, P: Publishable>: Send + Sync {
    async fn prepare(&self, item: &ContentMigrationItem<T>, cancel: &CancellationToken)
        -> Result<P>;
}

/// Move the payload to its mapped location, then run the transformers.
async fn finish<P: Publishable>(
    mut payload: P,
    entry: &ManifestEntry,
    transformers: &ContentTransformerRunner,
    cancel: &CancellationToken,
) -> Result<P> {
    payload.apply_mapped_location(&entry.mapped_location());
    transformers.execute(payload, cancel).await
}

/// Publishes the listed source item itself.
pub struct SourceContentItemPreparer<T> {
    transformers: Arc<ContentTransformerRunner>,
    _content: PhantomData<fn() -> T>,
}

impl<T> SourceContentItemPreparer<T> {
    pub fn new(transformers: Arc<ContentTransformerRunner>) -> Self {
        Self {
            transformers,
            _content: PhantomData,
        }
    }
}

#[async_trait]
impl<T> ContentItemPreparer<T, T> for SourceContentItemPreparer<T>
where
    T: Content + Publishable,
{
    async fn prepare(&self, item: &ContentMigrationItem<T>, cancel: &CancellationToken) -> Result<T> {
        if cancel.is_cancelled() {
            return Err(MigrateError::Cancelled);
        }
        let payload = item.source_item().clone();
        finish(payload, item.manifest_entry(), &self.transformers, cancel).await
    }
}

/// Pulls the full item (content files included) from the source endpoint.
pub struct EndpointContentItemPreparer<T, P> {
    source: Arc<dyn PullEndpoint<T, P>>,
    transformers: Arc<ContentTransformerRunner>,
}

impl<T, P> EndpointContentItemPreparer<T, P> {
    pub fn new(
        source: Arc<dyn PullEndpoint<T, P>>,
        transformers: Arc<ContentTransformerRunner>,
    ) -> Self {
        Self {
            source,
            transformers,
        }
    }
}

#[async_trait]
impl<T, P> ContentItemPreparer<T, P> for EndpointContentItemPreparer<T, P>
where
    T: Content,
    P: Publishable,
{
    async fn prepare(&self, item: &ContentMigrationItem<T>, cancel: &CancellationToken) -> Result<P> {
        if cancel.is_cancelled() {
            return Err(MigrateError::Cancelled);
        }
        let payload = self.source.pull(item.source_item(), cancel).await?;
        finish(payload, item.manifest_entry(), &self.transformers, cancel).await
    }
}
