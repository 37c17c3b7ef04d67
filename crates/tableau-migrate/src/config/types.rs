//! Configuration type definitions with auto-tuning based on system resources.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use sysinfo::System;
use tracing::info;

use crate::content::{ContentLocation, ContentType};

/// Default number of items per batch (and per source page).
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Default number of items of one batch processed concurrently.
pub const DEFAULT_PARALLELISM: usize = 10;

/// System resource information for auto-tuning.
#[derive(Debug, Clone)]
pub struct SystemResources {
    /// Number of CPU cores.
    pub cpu_cores: usize,
}

impl SystemResources {
    /// Detect system resources.
    pub fn detect() -> Self {
        let mut sys = System::new();
        sys.refresh_cpu();

        Self {
            cpu_cores: sys.cpus().len().max(1),
        }
    }

    /// Log detected system resources.
    pub fn log(&self) {
        info!("System resources: {} CPU cores", self.cpu_cores);
    }
}

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Site content is read from.
    pub source: EndpointConfig,

    /// Site content is published to.
    pub destination: EndpointConfig,

    /// Migration behavior configuration.
    #[serde(default)]
    pub migration: MigrationConfig,
}

impl Config {
    /// Apply auto-tuned defaults based on system resources.
    /// Only fills in values that weren't explicitly set in the config file.
    pub fn with_auto_tuning(mut self) -> Self {
        let resources = SystemResources::detect();
        resources.log();
        self.migration = self.migration.with_auto_tuning(&resources);
        self
    }
}

/// One side of the migration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Site name, used in logs and results.
    pub site: String,

    /// Path of the site snapshot file backing this endpoint.
    pub snapshot: PathBuf,
}

/// Migration behavior configuration.
/// Tuning fields use Option<T> to distinguish between "not set" (use the
/// auto-tuned default) and "explicitly set" (use the provided value).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Items of one batch migrated concurrently. Auto-tuned from CPU cores if not set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallelism: Option<usize>,

    /// Items per batch for content types without their own batch size.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,

    /// Skip items a previous run already migrated (default: true).
    #[serde(default = "default_true")]
    pub skip_previously_migrated: bool,

    /// Per content type overrides.
    #[serde(default)]
    pub content_types: Vec<ContentTypeConfig>,

    /// Location rewrites applied while building manifest entries.
    #[serde(default)]
    pub location_mappings: Vec<LocationMappingConfig>,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            parallelism: None,
            batch_size: None,
            skip_previously_migrated: true,
            content_types: Vec::new(),
            location_mappings: Vec::new(),
        }
    }
}

/// Settings for one content type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentTypeConfig {
    #[serde(rename = "type")]
    pub content_type: ContentType,

    /// Items per batch for this content type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,

    /// Stop this content type after this many batches (default: no limit).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_batches: Option<usize>,

    /// Publish each batch with a single bulk call (default: false).
    #[serde(default)]
    pub batch_publishing: bool,

    /// Source location prefixes to leave out of the migration.
    #[serde(default)]
    pub exclude: Vec<ContentLocation>,
}

impl ContentTypeConfig {
    pub fn new(content_type: ContentType) -> Self {
        Self {
            content_type,
            batch_size: None,
            max_batches: None,
            batch_publishing: false,
            exclude: Vec::new(),
        }
    }
}

/// Moves every item of a content type found under `from` to under `to`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationMappingConfig {
    #[serde(rename = "type")]
    pub content_type: ContentType,

    pub from: ContentLocation,

    pub to: ContentLocation,
}

impl MigrationConfig {
    /// Apply auto-tuned defaults based on system resources.
    /// Only fills in values that are None (not explicitly set).
    pub fn with_auto_tuning(mut self, resources: &SystemResources) -> Self {
        // Item work is remote API calls, so run more items than cores.
        if self.parallelism.is_none() {
            let parallelism = (resources.cpu_cores * 2).clamp(4, 32);
            self.parallelism = Some(parallelism);
        }

        if self.batch_size.is_none() {
            self.batch_size = Some(DEFAULT_BATCH_SIZE);
        }

        info!(
            "Auto-tuned config: parallelism={}, batch_size={}",
            self.get_parallelism(),
            self.get_batch_size(),
        );

        self
    }

    pub fn get_parallelism(&self) -> usize {
        self.parallelism.unwrap_or(DEFAULT_PARALLELISM)
    }

    pub fn get_batch_size(&self) -> usize {
        self.batch_size.unwrap_or(DEFAULT_BATCH_SIZE)
    }

    /// Settings section for a content type, if one was configured.
    pub fn content_type(&self, content_type: ContentType) -> Option<&ContentTypeConfig> {
        self.content_types
            .iter()
            .find(|c| c.content_type == content_type)
    }

    /// Effective batch size for a content type, falling back to the global default.
    pub fn batch_size_for(&self, content_type: ContentType) -> usize {
        self.content_type(content_type)
            .and_then(|c| c.batch_size)
            .unwrap_or_else(|| self.get_batch_size())
    }

    pub fn max_batches_for(&self, content_type: ContentType) -> Option<usize> {
        self.content_type(content_type).and_then(|c| c.max_batches)
    }

    pub fn batch_publishing_enabled(&self, content_type: ContentType) -> bool {
        self.content_type(content_type)
            .map(|c| c.batch_publishing)
            .unwrap_or(false)
    }

    pub fn exclusions_for(&self, content_type: ContentType) -> &[ContentLocation] {
        self.content_type(content_type)
            .map(|c| c.exclude.as_slice())
            .unwrap_or(&[])
    }

    pub fn location_mappings_for(
        &self,
        content_type: ContentType,
    ) -> impl Iterator<Item = &LocationMappingConfig> {
        self.location_mappings
            .iter()
            .filter(move |m| m.content_type == content_type)
    }
}

fn default_true() -> bool {
    true
}
