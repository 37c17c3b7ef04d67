//! Configuration validation.

use std::collections::HashSet;

use super::Config;
use crate::content::ContentType;
use crate::error::{MigrateError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    // Endpoint validation
    if config.source.site.is_empty() {
        return Err(MigrateError::Config("source.site is required".into()));
    }
    if config.source.snapshot.as_os_str().is_empty() {
        return Err(MigrateError::Config("source.snapshot is required".into()));
    }
    if config.destination.site.is_empty() {
        return Err(MigrateError::Config("destination.site is required".into()));
    }
    if config.destination.snapshot.as_os_str().is_empty() {
        return Err(MigrateError::Config(
            "destination.snapshot is required".into(),
        ));
    }

    // Cannot migrate a site onto itself
    if config.source.snapshot == config.destination.snapshot {
        return Err(MigrateError::Config(
            "source and destination cannot be the same snapshot".into(),
        ));
    }

    // Migration config validation - only check if explicitly set
    if let Some(0) = config.migration.parallelism {
        return Err(MigrateError::Config(
            "migration.parallelism must be at least 1".into(),
        ));
    }
    if let Some(0) = config.migration.batch_size {
        return Err(MigrateError::Config(
            "migration.batch_size must be at least 1".into(),
        ));
    }

    let mut seen = HashSet::new();
    for section in &config.migration.content_types {
        if !seen.insert(section.content_type) {
            return Err(MigrateError::Config(format!(
                "migration.content_types has more than one '{}' section",
                section.content_type
            )));
        }
        if let Some(0) = section.batch_size {
            return Err(MigrateError::Config(format!(
                "migration.content_types.{}.batch_size must be at least 1",
                section.content_type
            )));
        }
        if let Some(0) = section.max_batches {
            return Err(MigrateError::Config(format!(
                "migration.content_types.{}.max_batches must be at least 1",
                section.content_type
            )));
        }
        if section.batch_publishing && section.content_type != ContentType::User {
            return Err(MigrateError::Config(format!(
                "batch_publishing is only supported for users, not '{}'",
                section.content_type
            )));
        }
    }

    for mapping in &config.migration.location_mappings {
        if mapping.from.is_empty() {
            return Err(MigrateError::Config(format!(
                "migration.location_mappings for '{}' needs a non-empty 'from'",
                mapping.content_type
            )));
        }
    }

    Ok(())
}
