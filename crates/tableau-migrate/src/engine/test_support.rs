//! Fakes shared by the engine tests.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

use super::{ContentItemPreparer, ContentMigrationItem};
use crate::content::{Content, ContentLocation, ContentReference, ContentType, Publishable, User};
use crate::endpoints::{BulkDestinationEndpoint, DestinationEndpoint};
use crate::error::{MigrateError, Result};
use crate::manifest::ManifestEntry;

/// Names of payloads released so far.
#[derive(Debug, Clone, Default)]
pub(crate) struct ReleaseLog(Arc<Mutex<Vec<String>>>);

impl ReleaseLog {
    pub(crate) fn released(&self) -> Vec<String> {
        let mut released = self.0.lock().unwrap().clone();
        released.sort();
        released
    }
}

/// Payload that records its release in a [`ReleaseLog`].
#[derive(Debug, Clone)]
pub(crate) struct TrackedPayload {
    pub name: String,
    pub location: ContentLocation,
    log: ReleaseLog,
}

impl TrackedPayload {
    pub(crate) fn new(name: &str, log: &ReleaseLog) -> Self {
        Self {
            name: name.to_string(),
            location: ContentLocation::for_username("local", name),
            log: log.clone(),
        }
    }
}

#[async_trait]
impl Publishable for TrackedPayload {
    fn apply_mapped_location(&mut self, location: &ContentLocation) {
        self.location = location.clone();
    }

    async fn release(&self) {
        self.log.0.lock().unwrap().push(self.name.clone());
    }
}

/// One user item per name, each with its own manifest entry.
pub(crate) fn users(names: &[&str]) -> Vec<ContentMigrationItem<User>> {
    names
        .iter()
        .map(|name| {
            let user = User::new("local", name);
            let entry = ManifestEntry::new(ContentType::User, user.reference().clone());
            ContentMigrationItem::new(user, Arc::new(entry))
        })
        .collect()
}

/// Preparer producing a [`TrackedPayload`] named after the username.
pub(crate) struct TestPreparer {
    log: ReleaseLog,
    failing: HashSet<String>,
}

impl TestPreparer {
    pub(crate) fn new(log: &ReleaseLog) -> Self {
        Self {
            log: log.clone(),
            failing: HashSet::new(),
        }
    }

    pub(crate) fn fail(mut self, name: &str) -> Self {
        self.failing.insert(name.to_string());
        self
    }
}

#[async_trait]
impl ContentItemPreparer<User, TrackedPayload> for TestPreparer {
    async fn prepare(
        &self,
        item: &ContentMigrationItem<User>,
        cancel: &CancellationToken,
    ) -> Result<TrackedPayload> {
        if cancel.is_cancelled() {
            return Err(MigrateError::Cancelled);
        }
        let name = item.source_item().username();
        if self.failing.contains(name) {
            return Err(MigrateError::Endpoint(format!("download of {} failed", name)));
        }
        let mut payload = TrackedPayload::new(name, &self.log);
        payload.apply_mapped_location(&item.manifest_entry().mapped_location());
        Ok(payload)
    }
}

/// Destination recording the names it published.
#[derive(Default)]
pub(crate) struct TestDestination {
    failures: HashMap<String, fn() -> MigrateError>,
    bulk_failure: Option<fn() -> MigrateError>,
    published: Mutex<Vec<String>>,
    bulk_calls: AtomicUsize,
}

impl TestDestination {
    pub(crate) fn fail(mut self, name: &str, error: fn() -> MigrateError) -> Self {
        self.failures.insert(name.to_string(), error);
        self
    }

    pub(crate) fn fail_bulk(mut self, error: fn() -> MigrateError) -> Self {
        self.bulk_failure = Some(error);
        self
    }

    pub(crate) fn published(&self) -> Vec<String> {
        let mut published = self.published.lock().unwrap().clone();
        published.sort();
        published
    }

    pub(crate) fn bulk_calls(&self) -> usize {
        self.bulk_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DestinationEndpoint<TrackedPayload, User> for TestDestination {
    async fn publish(&self, item: &TrackedPayload, cancel: &CancellationToken) -> Result<User> {
        if cancel.is_cancelled() {
            return Err(MigrateError::Cancelled);
        }
        if let Some(error) = self.failures.get(&item.name) {
            return Err(error());
        }
        self.published.lock().unwrap().push(item.name.clone());

        let mut user = User::new("local", &item.name);
        user.reference = ContentReference::generate(item.location.clone());
        Ok(user)
    }
}

#[async_trait]
impl BulkDestinationEndpoint<TrackedPayload> for TestDestination {
    async fn publish_batch(
        &self,
        items: &[TrackedPayload],
        cancel: &CancellationToken,
    ) -> Result<Vec<ContentReference>> {
        self.bulk_calls.fetch_add(1, Ordering::SeqCst);
        if cancel.is_cancelled() {
            return Err(MigrateError::Cancelled);
        }
        if let Some(error) = self.bulk_failure {
            return Err(error());
        }

        let mut published = self.published.lock().unwrap();
        Ok(items
            .iter()
            .map(|item| {
                published.push(item.name.clone());
                ContentReference::generate(item.location.clone())
            })
            .collect())
    }
}
