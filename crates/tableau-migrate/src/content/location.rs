//! Hierarchical content locations (`Parent/Child/Name`).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator between location segments.
pub const PATH_SEPARATOR: char = '/';

/// Position of a content item in a site's hierarchy.
///
/// Projects nest, so a workbook's location is its project path followed by
/// its own name. Users are located by `domain/username`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ContentLocation {
    segments: Vec<String>,
}

impl ContentLocation {
    /// Create a location from its segments. Empty segments are dropped.
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments
                .into_iter()
                .map(Into::into)
                .filter(|s: &String| !s.is_empty())
                .collect(),
        }
    }

    /// Parse a `/`-separated path.
    pub fn parse(path: &str) -> Self {
        Self::new(path.split(PATH_SEPARATOR).map(str::trim))
    }

    /// Location of a user in a domain.
    pub fn for_username(domain: &str, username: &str) -> Self {
        Self::new([domain, username])
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The last segment, or an empty string for the root.
    pub fn name(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or("")
    }

    /// The containing location, `None` for top-level items.
    pub fn parent(&self) -> Option<ContentLocation> {
        if self.segments.len() < 2 {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// A child location below this one.
    pub fn append(&self, name: impl Into<String>) -> ContentLocation {
        let mut segments = self.segments.clone();
        segments.push(name.into());
        Self::new(segments)
    }

    /// Same parent, different name.
    pub fn rename(&self, name: impl Into<String>) -> ContentLocation {
        match self.parent() {
            Some(parent) => parent.append(name),
            None => Self::new([name.into()]),
        }
    }

    /// Whether `prefix` is this location or one of its ancestors.
    pub fn starts_with(&self, prefix: &ContentLocation) -> bool {
        self.segments.len() >= prefix.segments.len()
            && self.segments[..prefix.segments.len()] == prefix.segments[..]
    }

    /// Move this location from under `from` to under `to`.
    ///
    /// Returns `None` when `from` is not a prefix of this location.
    pub fn replace_prefix(&self, from: &ContentLocation, to: &ContentLocation) -> Option<Self> {
        if !self.starts_with(from) {
            return None;
        }
        let mut segments = to.segments.clone();
        segments.extend(self.segments[from.segments.len()..].iter().cloned());
        Some(Self::new(segments))
    }

    /// The `/`-joined path.
    pub fn path(&self) -> String {
        self.segments.join("/")
    }
}

impl fmt::Display for ContentLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

impl From<String> for ContentLocation {
    fn from(path: String) -> Self {
        Self::parse(&path)
    }
}

impl From<&str> for ContentLocation {
    fn from(path: &str) -> Self {
        Self::parse(path)
    }
}

impl From<ContentLocation> for String {
    fn from(location: ContentLocation) -> Self {
        location.path()
    }
}
