//! Content item definitions.

use serde::{Deserialize, Serialize};

use super::{Content, ContentLocation, ContentReference, ContentType, OwnedContent, Publishable};

/// A site user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(flatten)]
    pub reference: ContentReference,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Site role (e.g. "Creator", "Viewer", "Unlicensed").
    #[serde(default = "default_site_role")]
    pub site_role: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_setting: Option<String>,
}

impl User {
    pub fn new(domain: &str, username: &str) -> Self {
        Self {
            reference: ContentReference::generate(ContentLocation::for_username(domain, username)),
            email: None,
            site_role: default_site_role(),
            auth_setting: None,
        }
    }

    pub fn username(&self) -> &str {
        self.reference.name()
    }
}

/// A group of users.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    #[serde(flatten)]
    pub reference: ContentReference,

    /// Members, by reference on the site the group belongs to.
    #[serde(default)]
    pub users: Vec<ContentReference>,
}

impl Group {
    pub fn new(domain: &str, name: &str) -> Self {
        Self {
            reference: ContentReference::generate(ContentLocation::new([domain, name])),
            users: Vec::new(),
        }
    }
}

/// A project; its location is the path of nested project names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    #[serde(flatten)]
    pub reference: ContentReference,

    #[serde(default)]
    pub description: String,

    pub owner: ContentReference,
}

impl Project {
    pub fn new(location: impl Into<ContentLocation>, owner: ContentReference) -> Self {
        Self {
            reference: ContentReference::generate(location),
            description: String::new(),
            owner,
        }
    }
}

/// A published data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSource {
    #[serde(flatten)]
    pub reference: ContentReference,

    #[serde(default)]
    pub description: String,

    pub owner: ContentReference,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub encrypt_extracts: bool,
}

impl DataSource {
    pub fn new(location: impl Into<ContentLocation>, owner: ContentReference) -> Self {
        Self {
            reference: ContentReference::generate(location),
            description: String::new(),
            owner,
            tags: Vec::new(),
            encrypt_extracts: false,
        }
    }
}

/// A workbook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workbook {
    #[serde(flatten)]
    pub reference: ContentReference,

    #[serde(default)]
    pub description: String,

    pub owner: ContentReference,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default = "default_true")]
    pub show_tabs: bool,
}

impl Workbook {
    pub fn new(location: impl Into<ContentLocation>, owner: ContentReference) -> Self {
        Self {
            reference: ContentReference::generate(location),
            description: String::new(),
            owner,
            tags: Vec::new(),
            show_tabs: true,
        }
    }
}

macro_rules! impl_content {
    ($ty:ty, $content_type:expr) => {
        impl Content for $ty {
            const CONTENT_TYPE: ContentType = $content_type;

            fn reference(&self) -> &ContentReference {
                &self.reference
            }
        }

        impl Publishable for $ty {
            fn apply_mapped_location(&mut self, location: &ContentLocation) {
                self.reference.location = location.clone();
            }
        }
    };
}

impl_content!(User, ContentType::User);
impl_content!(Group, ContentType::Group);
impl_content!(Project, ContentType::Project);
impl_content!(DataSource, ContentType::DataSource);
impl_content!(Workbook, ContentType::Workbook);

macro_rules! impl_owned {
    ($ty:ty) => {
        impl OwnedContent for $ty {
            fn owner(&self) -> &ContentReference {
                &self.owner
            }

            fn set_owner(&mut self, owner: ContentReference) {
                self.owner = owner;
            }
        }
    };
}

impl_owned!(Project);
impl_owned!(DataSource);
impl_owned!(Workbook);

/// Whether a grantee is a user or a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GranteeType {
    User,
    Group,
}

impl GranteeType {
    pub fn content_type(self) -> ContentType {
        match self {
            GranteeType::User => ContentType::User,
            GranteeType::Group => ContentType::Group,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityMode {
    Allow,
    Deny,
}

/// A single capability rule (e.g. `Read: Allow`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capability {
    pub name: String,
    pub mode: CapabilityMode,
}

/// Capabilities granted to one user or group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GranteeCapability {
    pub grantee_type: GranteeType,
    pub grantee_id: uuid::Uuid,
    pub capabilities: Vec<Capability>,
}

/// Permission rules attached to a content item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Permissions {
    #[serde(default)]
    pub grantee_capabilities: Vec<GranteeCapability>,
}

impl Permissions {
    pub fn is_empty(&self) -> bool {
        self.grantee_capabilities.is_empty()
    }
}

fn default_site_role() -> String {
    "Viewer".to_string()
}

fn default_true() -> bool {
    true
}
