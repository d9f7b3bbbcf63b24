//! Error types for Warden.
//!
//! Every failure the launcher can observe is a variant here. Runtime outcomes
//! of `ensure_running` (query failures, launch failures) are carried inside
//! `LaunchResult` rather than returned as `Err`, so callers always learn
//! which step failed.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the Warden library.
#[derive(Debug, Error)]
pub enum WardenError {
    // Validation errors
    #[error("Validation error for {field}: {message}")]
    Validation { field: String, message: String },

    // Process table errors
    #[error("Process query failed: {message}")]
    ProcessQueryFailed {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    // Launch errors
    #[error("Failed to start {name}: {source}")]
    LaunchFailed {
        name: String,
        #[source]
        source: std::io::Error,
    },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Result type alias for Warden operations.
pub type Result<T> = std::result::Result<T, WardenError>;

impl From<std::io::Error> for WardenError {
    fn from(err: std::io::Error) -> Self {
        WardenError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl WardenError {
    /// Create a validation error for a named field.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        WardenError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        WardenError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Which step of the launch sequence produced this error.
    ///
    /// Used for the user-facing failure line so query and launch failures
    /// are never confused.
    pub fn step(&self) -> &'static str {
        match self {
            WardenError::Validation { .. }
            | WardenError::Config { .. }
            | WardenError::Json { .. } => "configuration",
            WardenError::ProcessQueryFailed { .. } => "query",
            WardenError::LaunchFailed { .. } => "launch",
            WardenError::Io { .. } => "io",
        }
    }

    /// The underlying OS error, if this error wraps one.
    pub fn os_error(&self) -> Option<&std::io::Error> {
        match self {
            WardenError::LaunchFailed { source, .. } => Some(source),
            WardenError::ProcessQueryFailed { source, .. } | WardenError::Io { source, .. } => {
                source.as_ref()
            }
            _ => None,
        }
    }

    /// Whether this error means the caller supplied an unusable configuration.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            WardenError::Validation { .. } | WardenError::Config { .. } | WardenError::Json { .. }
        )
    }
}
