//! Per-item migration state.

use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::content::{ContentLocation, ContentReference, ContentType};

/// Status of one item within a migration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManifestEntryStatus {
    Pending,
    Migrated,
    Failed,
    Skipped,
    Canceled,
}

impl ManifestEntryStatus {
    pub fn is_terminal(self) -> bool {
        self != ManifestEntryStatus::Pending
    }
}

#[derive(Debug)]
struct EntryState {
    status: ManifestEntryStatus,
    mapped_location: ContentLocation,
    destination: Option<ContentReference>,
    errors: Vec<String>,
    has_migrated: bool,
}

/// Mutable status cell for one source item.
///
/// Shared between the content migrator, batch workers and hooks. Status
/// leaves `Pending` at most once per run; the `set_*` transitions return
/// whether they applied.
#[derive(Debug)]
pub struct ManifestEntry {
    content_type: ContentType,
    source: ContentReference,
    state: Mutex<EntryState>,
}

impl ManifestEntry {
    pub fn new(content_type: ContentType, source: ContentReference) -> Self {
        let mapped_location = source.location.clone();
        Self {
            content_type,
            source,
            state: Mutex::new(EntryState {
                status: ManifestEntryStatus::Pending,
                mapped_location,
                destination: None,
                errors: Vec::new(),
                has_migrated: false,
            }),
        }
    }

    /// Recreate an entry from a previous run's record.
    ///
    /// The entry starts `Pending` again but keeps its destination and
    /// whether it was ever migrated.
    pub fn from_previous(source: ContentReference, previous: &ManifestEntryRecord) -> Self {
        let entry = Self::new(previous.content_type, source);
        {
            let mut state = entry.lock();
            state.mapped_location = previous.mapped_location.clone();
            state.destination = previous.destination.clone();
            state.has_migrated =
                previous.has_migrated || previous.status == ManifestEntryStatus::Migrated;
        }
        entry
    }

    fn lock(&self) -> MutexGuard<'_, EntryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn content_type(&self) -> ContentType {
        self.content_type
    }

    pub fn source(&self) -> &ContentReference {
        &self.source
    }

    pub fn status(&self) -> ManifestEntryStatus {
        self.lock().status
    }

    pub fn mapped_location(&self) -> ContentLocation {
        self.lock().mapped_location.clone()
    }

    pub fn destination(&self) -> Option<ContentReference> {
        self.lock().destination.clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.lock().errors.clone()
    }

    /// Whether this item was migrated in this run or any previous one.
    pub fn has_migrated(&self) -> bool {
        self.lock().has_migrated
    }

    /// Set the location the item will be published to.
    ///
    /// A known destination at a different location no longer applies and
    /// is dropped.
    pub fn map_to_destination(&self, location: ContentLocation) {
        let mut state = self.lock();
        if state
            .destination
            .as_ref()
            .is_some_and(|d| d.location != location)
        {
            state.destination = None;
        }
        state.mapped_location = location;
    }

    /// Record the destination item, independently of the status.
    pub fn destination_found(&self, destination: ContentReference) {
        let mut state = self.lock();
        state.mapped_location = destination.location.clone();
        state.destination = Some(destination);
    }

    fn transition(&self, status: ManifestEntryStatus) -> bool {
        let mut state = self.lock();
        if state.status.is_terminal() {
            return false;
        }
        state.status = status;
        if status == ManifestEntryStatus::Migrated {
            state.has_migrated = true;
        }
        true
    }

    pub fn set_migrated(&self) -> bool {
        self.transition(ManifestEntryStatus::Migrated)
    }

    pub fn set_skipped(&self) -> bool {
        self.transition(ManifestEntryStatus::Skipped)
    }

    pub fn set_canceled(&self) -> bool {
        self.transition(ManifestEntryStatus::Canceled)
    }

    /// Mark the entry failed with `errors`.
    ///
    /// Errors are always recorded; the status only changes from `Pending`.
    pub fn set_failed<I, E>(&self, errors: I) -> bool
    where
        I: IntoIterator<Item = E>,
        E: ToString,
    {
        let mut state = self.lock();
        state.errors.extend(errors.into_iter().map(|e| e.to_string()));
        if state.status.is_terminal() {
            return false;
        }
        state.status = ManifestEntryStatus::Failed;
        true
    }

    pub fn to_record(&self) -> ManifestEntryRecord {
        let state = self.lock();
        ManifestEntryRecord {
            content_type: self.content_type,
            source: self.source.clone(),
            mapped_location: state.mapped_location.clone(),
            destination: state.destination.clone(),
            status: state.status,
            errors: state.errors.clone(),
            has_migrated: state.has_migrated,
        }
    }
}

/// Serialized form of a [`ManifestEntry`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntryRecord {
    pub content_type: ContentType,
    pub source: ContentReference,
    pub mapped_location: ContentLocation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<ContentReference>,
    pub status: ManifestEntryStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    #[serde(default)]
    pub has_migrated: bool,
}
