//! Source and destination endpoint contracts.
//!
//! Endpoints talk to a site. The engine only needs a pager over source
//! content, a way to pull a publish payload, single and bulk publish, and
//! permission reads and writes.

mod memory;

pub use memory::{ContentPermissions, InMemorySite, SiteContent, SiteSnapshot, VecPager};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::content::{
    Content, ContentReference, ContentType, DataSource, Group, Permissions, Project, Publishable,
    User, Workbook,
};
use crate::error::Result;

/// Pages through source content. `None` means the content is exhausted.
#[async_trait]
pub trait ContentPager<T>: Send {
    async fn next_page(&mut self) -> Result<Option<Vec<T>>>;
}

#[async_trait]
pub trait SourceEndpoint<T: Content>: Send + Sync {
    /// A pager returning at most `page_size` items per page.
    async fn pager(&self, page_size: usize) -> Result<Box<dyn ContentPager<T>>>;
}

/// Downloads the publishable form of a source item.
#[async_trait]
pub trait PullEndpoint<T: Content, P: Publishable>: Send + Sync {
    async fn pull(&self, item: &T, cancel: &CancellationToken) -> Result<P>;
}

#[async_trait]
pub trait DestinationEndpoint<P: Publishable, R: Content>: Send + Sync {
    /// Publish one item and return it as the destination now has it.
    async fn publish(&self, item: &P, cancel: &CancellationToken) -> Result<R>;
}

#[async_trait]
pub trait BulkDestinationEndpoint<P: Publishable>: Send + Sync {
    /// Publish every item in one call. Either all items are published or
    /// none are. Returns destination references in input order.
    async fn publish_batch(
        &self,
        items: &[P],
        cancel: &CancellationToken,
    ) -> Result<Vec<ContentReference>>;
}

#[async_trait]
pub trait PermissionsEndpoint: Send + Sync {
    async fn get_permissions(
        &self,
        content_type: ContentType,
        id: Uuid,
        cancel: &CancellationToken,
    ) -> Result<Permissions>;

    async fn update_permissions(
        &self,
        content_type: ContentType,
        id: Uuid,
        permissions: &Permissions,
        cancel: &CancellationToken,
    ) -> Result<()>;
}

/// Everything a migration reads from the source site.
pub trait SiteSource:
    SourceEndpoint<User>
    + SourceEndpoint<Group>
    + SourceEndpoint<Project>
    + SourceEndpoint<DataSource>
    + SourceEndpoint<Workbook>
    + PullEndpoint<DataSource, DataSource>
    + PullEndpoint<Workbook, Workbook>
    + PermissionsEndpoint
    + 'static
{
}

impl<S> SiteSource for S where
    S: SourceEndpoint<User>
        + SourceEndpoint<Group>
        + SourceEndpoint<Project>
        + SourceEndpoint<DataSource>
        + SourceEndpoint<Workbook>
        + PullEndpoint<DataSource, DataSource>
        + PullEndpoint<Workbook, Workbook>
        + PermissionsEndpoint
        + 'static
{
}

/// Everything a migration writes to the destination site.
pub trait SiteDestination:
    DestinationEndpoint<User, User>
    + DestinationEndpoint<Group, Group>
    + DestinationEndpoint<Project, Project>
    + DestinationEndpoint<DataSource, DataSource>
    + DestinationEndpoint<Workbook, Workbook>
    + BulkDestinationEndpoint<User>
    + PermissionsEndpoint
    + 'static
{
}

impl<D> SiteDestination for D where
    D: DestinationEndpoint<User, User>
        + DestinationEndpoint<Group, Group>
        + DestinationEndpoint<Project, Project>
        + DestinationEndpoint<DataSource, DataSource>
        + DestinationEndpoint<Workbook, Workbook>
        + BulkDestinationEndpoint<User>
        + PermissionsEndpoint
        + 'static
{
}
