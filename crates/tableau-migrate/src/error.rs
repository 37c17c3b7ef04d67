//! Error types for the migration library.

use thiserror::Error;
use uuid::Uuid;

use crate::content::ContentType;

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Source or destination endpoint rejected a request.
    #[error("Endpoint error: {0}")]
    Endpoint(String),

    /// The endpoint session is no longer authorized.
    #[error("Not authorized: {0}")]
    Unauthorized(String),

    /// Content item does not exist on the endpoint.
    #[error("{content_type} {id} was not found")]
    NotFound { content_type: ContentType, id: Uuid },

    /// Publishing a single item failed.
    #[error("Publish failed for {location}: {message}")]
    Publish { location: String, message: String },

    /// The endpoint cannot publish this content type in bulk.
    #[error("Bulk publishing is not supported for {0}")]
    BulkPublishUnsupported(ContentType),

    /// A referenced item has no known destination yet.
    #[error("No destination {content_type} found for source {location}")]
    ReferenceNotMapped {
        content_type: ContentType,
        location: String,
    },

    /// A user-supplied hook, filter, mapping or transformer failed.
    #[error("Hook error: {0}")]
    Hook(String),

    /// Manifest file error
    #[error("Manifest error: {0}")]
    Manifest(String),

    /// Config hash mismatch on resume
    #[error("Config has changed since the manifest was written - cannot resume. Use --force to start fresh.")]
    ConfigChanged,

    /// A spawned task failed to complete.
    #[error("Task failed: {0}")]
    Task(String),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Migration was cancelled (SIGINT, batch halt, etc.)
    #[error("Migration cancelled")]
    Cancelled,
}

impl MigrateError {
    /// Create a Publish error for the item at `location`.
    pub fn publish(location: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::Publish {
            location: location.into(),
            message: message.into(),
        }
    }

    /// Create a Hook error.
    pub fn hook(message: impl Into<String>) -> Self {
        MigrateError::Hook(message.into())
    }

    /// Whether this error means the work was cancelled rather than failed.
    ///
    /// Every place that has to tell cancellation apart from failure goes
    /// through this predicate.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, MigrateError::Cancelled)
    }

    /// Whether the remaining items of a batch cannot succeed after this error.
    pub fn halts_batch(&self) -> bool {
        matches!(self, MigrateError::Unauthorized(_))
    }

    /// Process exit code for the CLI.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) | MigrateError::ConfigChanged => 2,
            MigrateError::Cancelled => 130,
            _ => 1,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
