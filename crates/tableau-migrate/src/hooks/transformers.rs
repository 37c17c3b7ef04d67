//! Transformers rewrite publish payloads for the destination site.

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::TypedRegistry;
use crate::content::{ContentType, Group, OwnedContent, Publishable};
use crate::error::{MigrateError, Result};
use crate::manifest::MigrationManifest;

#[async_trait]
pub trait ContentTransformer<P: Publishable>: Send + Sync {
    async fn execute(&self, item: P, cancel: &CancellationToken) -> Result<P>;
}

/// Runs every transformer registered for a payload type.
#[derive(Debug, Default)]
pub struct ContentTransformerRunner {
    registry: TypedRegistry,
}

impl ContentTransformerRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<P, X>(&mut self, transformer: X)
    where
        P: Publishable,
        X: ContentTransformer<P> + 'static,
    {
        self.registry
            .push::<Arc<dyn ContentTransformer<P>>>(Arc::new(transformer));
    }

    pub fn count<P: Publishable>(&self) -> usize {
        self.registry.list::<Arc<dyn ContentTransformer<P>>>().len()
    }

    pub async fn execute<P: Publishable>(&self, mut item: P, cancel: &CancellationToken) -> Result<P> {
        for transformer in self.registry.list::<Arc<dyn ContentTransformer<P>>>() {
            item = transformer.execute(item, cancel).await?;
        }
        Ok(item)
    }
}

/// Points the owner at the matching destination user. Fails when the owner
/// has no destination user.
pub struct OwnershipTransformer {
    manifest: Arc<MigrationManifest>,
}

impl OwnershipTransformer {
    pub fn new(manifest: Arc<MigrationManifest>) -> Self {
        Self { manifest }
    }
}

#[async_trait]
impl<P> ContentTransformer<P> for OwnershipTransformer
where
    P: Publishable + OwnedContent,
{
    async fn execute(&self, mut item: P, _cancel: &CancellationToken) -> Result<P> {
        let owner = item.owner().clone();
        let destination = self
            .manifest
            .destination_for(ContentType::User, owner.id)
            .ok_or_else(|| MigrateError::ReferenceNotMapped {
                content_type: ContentType::User,
                location: owner.location.path(),
            })?;
        item.set_owner(destination);
        Ok(item)
    }
}

/// Points group members at destination users. Members without a
/// destination user are dropped.
pub struct GroupUsersTransformer {
    manifest: Arc<MigrationManifest>,
}

impl GroupUsersTransformer {
    pub fn new(manifest: Arc<MigrationManifest>) -> Self {
        Self { manifest }
    }
}

#[async_trait]
impl ContentTransformer<Group> for GroupUsersTransformer {
    async fn execute(&self, mut group: Group, _cancel: &CancellationToken) -> Result<Group> {
        let mut members = Vec::with_capacity(group.users.len());
        for user in &group.users {
            match self.manifest.destination_for(ContentType::User, user.id) {
                Some(destination) => members.push(destination),
                None => warn!(
                    "Group {}: member {} has no destination user, leaving it out",
                    group.reference.location, user.location
                ),
            }
        }
        group.users = members;
        Ok(group)
    }
}
