//! Extension points run by the migration engine.
//!
//! - Hooks ([`MigrationHook`]) run after publishing and after each batch
//! - Filters ([`ContentFilter`]) decide which source items are migrated
//! - Mappings ([`ContentMapping`]) choose destination locations
//! - Transformers ([`ContentTransformer`]) rewrite payloads before publishing
//!
//! Each kind has a runner that keeps registrations per Rust type and runs
//! them in registration order, threading the context through the chain.

mod context;
mod filters;
mod mappings;
mod permissions;
mod registry;
mod transformers;

pub use context::{BatchCompletedContext, BulkPublishedContext, ItemPublishedContext};
pub use filters::{
    ContentFilter, ContentFilterRunner, LocationExclusionFilter, PredicateFilter,
    PreviouslyMigratedFilter,
};
pub use mappings::{ContentMapping, ContentMappingContext, ContentMappingRunner, PrefixLocationMapping};
pub use permissions::PermissionsPostPublishHook;
pub use registry::TypedRegistry;
pub use transformers::{
    ContentTransformer, ContentTransformerRunner, GroupUsersTransformer, OwnershipTransformer,
};

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// A hook over context `C`. Returns the context, possibly replaced.
#[async_trait]
pub trait MigrationHook<C: Send + 'static>: Send + Sync {
    async fn execute(&self, context: C, cancel: &CancellationToken) -> Result<C>;
}

/// Runs every hook registered for a context type.
#[derive(Debug, Default)]
pub struct MigrationHookRunner {
    registry: TypedRegistry,
}

impl MigrationHookRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<C, H>(&mut self, hook: H)
    where
        C: Send + 'static,
        H: MigrationHook<C> + 'static,
    {
        self.registry
            .push::<Arc<dyn MigrationHook<C>>>(Arc::new(hook));
    }

    /// Number of hooks registered for context `C`.
    pub fn count<C: Send + 'static>(&self) -> usize {
        self.registry.list::<Arc<dyn MigrationHook<C>>>().len()
    }

    /// Run the hooks for `C` in order. The first failure stops the chain.
    pub async fn execute<C: Send + 'static>(
        &self,
        mut context: C,
        cancel: &CancellationToken,
    ) -> Result<C> {
        for hook in self.registry.list::<Arc<dyn MigrationHook<C>>>() {
            context = hook.execute(context, cancel).await?;
        }
        Ok(context)
    }
}
