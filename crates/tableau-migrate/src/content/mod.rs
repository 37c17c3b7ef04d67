//! Content model shared by endpoints, hooks and the migration engine.
//!
//! - [`ContentType`]: the kinds of content a migration moves, in dependency order
//! - [`ContentLocation`] / [`ContentReference`]: where an item lives and its identity
//! - [`Content`]: implemented by every source/destination content type
//! - [`Publishable`]: implemented by every publish payload type

mod location;
mod types;

pub use location::{ContentLocation, PATH_SEPARATOR};
pub use types::{
    Capability, CapabilityMode, DataSource, GranteeCapability, GranteeType, Group, Permissions,
    Project, User, Workbook,
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Kind of content moved by a migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    User,
    Group,
    Project,
    DataSource,
    Workbook,
}

impl ContentType {
    /// Every content type, in the order a migration has to move them:
    /// users before the groups that contain them, projects before the
    /// content they hold.
    pub const MIGRATION_ORDER: [ContentType; 5] = [
        ContentType::User,
        ContentType::Group,
        ContentType::Project,
        ContentType::DataSource,
        ContentType::Workbook,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::User => "user",
            ContentType::Group => "group",
            ContentType::Project => "project",
            ContentType::DataSource => "data_source",
            ContentType::Workbook => "workbook",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity and location of a content item on one site.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentReference {
    pub id: Uuid,
    pub location: ContentLocation,
}

impl ContentReference {
    pub fn new(id: Uuid, location: impl Into<ContentLocation>) -> Self {
        Self {
            id,
            location: location.into(),
        }
    }

    /// A reference with a freshly generated id.
    pub fn generate(location: impl Into<ContentLocation>) -> Self {
        Self::new(Uuid::new_v4(), location)
    }

    pub fn name(&self) -> &str {
        self.location.name()
    }
}

/// A content item that can be listed on a source or returned by a destination.
pub trait Content: Clone + fmt::Debug + Send + Sync + 'static {
    /// Type tag used for manifest partitioning and configuration lookups.
    const CONTENT_TYPE: ContentType;

    fn reference(&self) -> &ContentReference;

    fn id(&self) -> Uuid {
        self.reference().id
    }

    fn location(&self) -> &ContentLocation {
        &self.reference().location
    }
}

/// A payload ready to be sent to a destination.
#[async_trait]
pub trait Publishable: Clone + fmt::Debug + Send + Sync + 'static {
    /// Move the payload to the location chosen by the mapping hooks.
    fn apply_mapped_location(&mut self, _location: &ContentLocation) {}

    /// Release resources held by the payload (downloaded files, streams).
    ///
    /// Called once per prepared payload when its batch is disposed, whether
    /// or not it was published.
    async fn release(&self) {}
}

/// Content that records an owning user.
pub trait OwnedContent {
    fn owner(&self) -> &ContentReference;

    fn set_owner(&mut self, owner: ContentReference);
}
