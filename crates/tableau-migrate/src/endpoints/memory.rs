//! A site held in memory, loaded from and saved to a JSON snapshot file.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use super::{
    BulkDestinationEndpoint, ContentPager, DestinationEndpoint, PermissionsEndpoint, PullEndpoint,
    SourceEndpoint,
};
use crate::content::{
    Content, ContentLocation, ContentReference, ContentType, DataSource, Group, Permissions,
    Project, Publishable, User, Workbook,
};
use crate::error::{MigrateError, Result};

/// Permissions of one content item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentPermissions {
    pub content_type: ContentType,
    pub id: Uuid,
    #[serde(flatten)]
    pub permissions: Permissions,
}

/// Serialized content of a site.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteSnapshot {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub groups: Vec<Group>,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub data_sources: Vec<DataSource>,
    #[serde(default)]
    pub workbooks: Vec<Workbook>,
    #[serde(default)]
    pub permissions: Vec<ContentPermissions>,
}

impl SiteSnapshot {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save the snapshot (atomic write).
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self)?;

        let temp_path = path.with_extension("tmp");
        std::fs::write(&temp_path, &content)?;
        std::fs::rename(&temp_path, path)?;

        Ok(())
    }

    pub fn count(&self, content_type: ContentType) -> usize {
        match content_type {
            ContentType::User => self.users.len(),
            ContentType::Group => self.groups.len(),
            ContentType::Project => self.projects.len(),
            ContentType::DataSource => self.data_sources.len(),
            ContentType::Workbook => self.workbooks.len(),
        }
    }

    pub fn find<T: SiteContent>(&self, location: &ContentLocation) -> Option<&T> {
        T::collection(self).iter().find(|i| i.location() == location)
    }
}

/// Content stored in a [`SiteSnapshot`].
pub trait SiteContent: Content + Publishable {
    fn collection(snapshot: &SiteSnapshot) -> &Vec<Self>;

    fn collection_mut(snapshot: &mut SiteSnapshot) -> &mut Vec<Self>;

    fn reference_mut(&mut self) -> &mut ContentReference;
}

macro_rules! impl_site_content {
    ($ty:ty, $field:ident) => {
        impl SiteContent for $ty {
            fn collection(snapshot: &SiteSnapshot) -> &Vec<Self> {
                &snapshot.$field
            }

            fn collection_mut(snapshot: &mut SiteSnapshot) -> &mut Vec<Self> {
                &mut snapshot.$field
            }

            fn reference_mut(&mut self) -> &mut ContentReference {
                &mut self.reference
            }
        }
    };
}

impl_site_content!(User, users);
impl_site_content!(Group, groups);
impl_site_content!(Project, projects);
impl_site_content!(DataSource, data_sources);
impl_site_content!(Workbook, workbooks);

/// Pager over items collected up front.
pub struct VecPager<T> {
    items: std::vec::IntoIter<T>,
    page_size: usize,
}

impl<T> VecPager<T> {
    pub fn new(items: Vec<T>, page_size: usize) -> Self {
        Self {
            items: items.into_iter(),
            page_size: page_size.max(1),
        }
    }
}

#[async_trait]
impl<T: Send> ContentPager<T> for VecPager<T> {
    async fn next_page(&mut self) -> Result<Option<Vec<T>>> {
        let page: Vec<T> = self.items.by_ref().take(self.page_size).collect();
        Ok(if page.is_empty() { None } else { Some(page) })
    }
}

/// Site endpoint backed by a [`SiteSnapshot`].
///
/// Publishing upserts by location: an item published where one already
/// exists replaces it and keeps the existing id. Locations registered with
/// [`InMemorySite::reject`] fail to publish.
#[derive(Debug)]
pub struct InMemorySite {
    name: String,
    snapshot: Mutex<SiteSnapshot>,
    rejected: Mutex<HashSet<(ContentType, ContentLocation)>>,
}

impl InMemorySite {
    pub fn new(name: impl Into<String>, snapshot: SiteSnapshot) -> Self {
        Self {
            name: name.into(),
            snapshot: Mutex::new(snapshot),
            rejected: Mutex::new(HashSet::new()),
        }
    }

    /// Load a site from a snapshot file.
    pub fn load<P: AsRef<Path>>(name: impl Into<String>, path: P) -> Result<Self> {
        Ok(Self::new(name, SiteSnapshot::load(path)?))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn lock(&self) -> MutexGuard<'_, SiteSnapshot> {
        self.snapshot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A copy of the site's current content.
    pub fn snapshot(&self) -> SiteSnapshot {
        self.lock().clone()
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.snapshot().save(path)
    }

    /// Make publishing `content_type` items to `location` fail.
    pub fn reject(&self, content_type: ContentType, location: impl Into<ContentLocation>) {
        self.rejected
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((content_type, location.into()));
    }

    pub fn permissions(&self, content_type: ContentType, id: Uuid) -> Permissions {
        self.lock()
            .permissions
            .iter()
            .find(|p| p.content_type == content_type && p.id == id)
            .map(|p| p.permissions.clone())
            .unwrap_or_default()
    }

    pub fn set_permissions(&self, content_type: ContentType, id: Uuid, permissions: Permissions) {
        let mut snapshot = self.lock();
        snapshot
            .permissions
            .retain(|p| !(p.content_type == content_type && p.id == id));
        if !permissions.is_empty() {
            snapshot.permissions.push(ContentPermissions {
                content_type,
                id,
                permissions,
            });
        }
    }

    fn check_rejected<T: SiteContent>(&self, item: &T) -> Result<()> {
        let rejected = self.rejected.lock().unwrap_or_else(PoisonError::into_inner);
        if rejected.contains(&(T::CONTENT_TYPE, item.location().clone())) {
            return Err(MigrateError::publish(
                item.location().path(),
                format!("rejected by site {}", self.name),
            ));
        }
        Ok(())
    }

    /// Insert or replace `item` by location, returning the stored item.
    fn upsert<T: SiteContent>(snapshot: &mut SiteSnapshot, item: &T) -> T {
        let mut stored = item.clone();
        let items = T::collection_mut(snapshot);
        match items.iter().position(|i| i.location() == item.location()) {
            Some(index) => {
                stored.reference_mut().id = items[index].id();
                items[index] = stored.clone();
            }
            None => {
                stored.reference_mut().id = Uuid::new_v4();
                items.push(stored.clone());
            }
        }
        stored
    }
}

#[async_trait]
impl<T: SiteContent> SourceEndpoint<T> for InMemorySite {
    async fn pager(&self, page_size: usize) -> Result<Box<dyn ContentPager<T>>> {
        let items = T::collection(&self.lock()).clone();
        Ok(Box::new(VecPager::new(items, page_size)))
    }
}

#[async_trait]
impl<T: SiteContent> PullEndpoint<T, T> for InMemorySite {
    async fn pull(&self, item: &T, cancel: &CancellationToken) -> Result<T> {
        if cancel.is_cancelled() {
            return Err(MigrateError::Cancelled);
        }
        let snapshot = self.lock();
        let found = T::collection(&snapshot)
            .iter()
            .find(|i| i.id() == item.id())
            .cloned();
        found.ok_or(MigrateError::NotFound {
            content_type: T::CONTENT_TYPE,
            id: item.id(),
        })
    }
}

#[async_trait]
impl<T: SiteContent> DestinationEndpoint<T, T> for InMemorySite {
    async fn publish(&self, item: &T, cancel: &CancellationToken) -> Result<T> {
        if cancel.is_cancelled() {
            return Err(MigrateError::Cancelled);
        }
        self.check_rejected(item)?;
        let stored = Self::upsert(&mut self.lock(), item);
        debug!("{}: published {} {}", self.name, T::CONTENT_TYPE, stored.location());
        Ok(stored)
    }
}

#[async_trait]
impl<T: SiteContent> BulkDestinationEndpoint<T> for InMemorySite {
    async fn publish_batch(
        &self,
        items: &[T],
        cancel: &CancellationToken,
    ) -> Result<Vec<ContentReference>> {
        if cancel.is_cancelled() {
            return Err(MigrateError::Cancelled);
        }
        for item in items {
            self.check_rejected(item)?;
        }

        let mut snapshot = self.lock();
        let references = items
            .iter()
            .map(|item| Self::upsert(&mut snapshot, item).reference().clone())
            .collect();
        debug!("{}: bulk published {} {} items", self.name, items.len(), T::CONTENT_TYPE);
        Ok(references)
    }
}

#[async_trait]
impl PermissionsEndpoint for InMemorySite {
    async fn get_permissions(
        &self,
        content_type: ContentType,
        id: Uuid,
        cancel: &CancellationToken,
    ) -> Result<Permissions> {
        if cancel.is_cancelled() {
            return Err(MigrateError::Cancelled);
        }
        Ok(self.permissions(content_type, id))
    }

    async fn update_permissions(
        &self,
        content_type: ContentType,
        id: Uuid,
        permissions: &Permissions,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(MigrateError::Cancelled);
        }
        self.set_permissions(content_type, id, permissions.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site_with_users(names: &[&str]) -> InMemorySite {
        let snapshot = SiteSnapshot {
            users: names.iter().map(|n| User::new("local", n)).collect(),
            ..Default::default()
        };
        InMemorySite::new("test", snapshot)
    }

    #[tokio::test]
    async fn test_pager_returns_pages_of_requested_size() {
        let site = site_with_users(&["a", "b", "c"]);
        let mut pager = SourceEndpoint::<User>::pager(&site, 2).await.unwrap();

        assert_eq!(pager.next_page().await.unwrap().unwrap().len(), 2);
        assert_eq!(pager.next_page().await.unwrap().unwrap().len(), 1);
        assert!(pager.next_page().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_publish_upserts_by_location() {
        let site = InMemorySite::new("dest", SiteSnapshot::default());
        let cancel = CancellationToken::new();

        let first = site.publish(&User::new("local", "alice"), &cancel).await.unwrap();
        let mut again = User::new("local", "alice");
        again.site_role = "Creator".to_string();
        let second = site.publish(&again, &cancel).await.unwrap();

        assert_eq!(first.id(), second.id());
        let snapshot = site.snapshot();
        assert_eq!(snapshot.users.len(), 1);
        assert_eq!(snapshot.users[0].site_role, "Creator");
    }

    #[tokio::test]
    async fn test_published_items_get_destination_ids() {
        let site = InMemorySite::new("dest", SiteSnapshot::default());
        let source = User::new("local", "alice");
        let published = site.publish(&source, &CancellationToken::new()).await.unwrap();
        assert_ne!(published.id(), source.id());
        assert_eq!(published.location(), source.location());
    }

    #[tokio::test]
    async fn test_rejected_location_fails_publish() {
        let site = InMemorySite::new("dest", SiteSnapshot::default());
        site.reject(ContentType::User, "local/bob");

        let err = site
            .publish(&User::new("local", "bob"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, MigrateError::Publish { .. }));
        assert!(site.snapshot().users.is_empty());
    }

    #[tokio::test]
    async fn test_bulk_publish_is_all_or_nothing() {
        let site = InMemorySite::new("dest", SiteSnapshot::default());
        site.reject(ContentType::User, "local/bob");
        let users = vec![User::new("local", "alice"), User::new("local", "bob")];

        assert!(site
            .publish_batch(&users[..], &CancellationToken::new())
            .await
            .is_err());
        assert!(site.snapshot().users.is_empty());

        let references = site
            .publish_batch(&users[..1], &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(references.len(), 1);
        assert_eq!(references[0].location.path(), "local/alice");
    }

    #[tokio::test]
    async fn test_pull_missing_item() {
        let site = InMemorySite::new("source", SiteSnapshot::default());
        let missing = User::new("local", "x");
        let err = PullEndpoint::<User, User>::pull(&site, &missing, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, MigrateError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_cancelled_publish() {
        let site = InMemorySite::new("dest", SiteSnapshot::default());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = site.publish(&User::new("local", "a"), &cancel).await.unwrap_err();
        assert!(err.is_cancellation());
    }

    #[test]
    fn test_snapshot_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("site.json");
        let site = site_with_users(&["alice"]);
        site.set_permissions(ContentType::User, uuid::Uuid::new_v4(), Permissions::default());
        site.save(&path).unwrap();

        let loaded = InMemorySite::load("copy", &path).unwrap();
        assert_eq!(loaded.snapshot(), site.snapshot());
        assert_eq!(loaded.snapshot().count(ContentType::User), 1);
    }
}
