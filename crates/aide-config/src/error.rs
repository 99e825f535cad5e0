//! Error types for configuration resolution.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while resolving settings or preparing directories.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required field was not supplied by any source.
    #[error("missing required setting '{0}' (set {upper} in the environment or .env)", upper = .0.to_uppercase())]
    Missing(&'static str),

    /// A field was supplied but could not be parsed.
    #[error("invalid value for setting '{field}': {value:?} ({reason})")]
    Invalid {
        /// The settings field name.
        field: &'static str,
        /// The raw value as found in the source.
        value: String,
        /// Why parsing failed.
        reason: String,
    },

    /// The override file exists but could not be read or parsed.
    #[error("failed to read override file {path}: {source}")]
    OverrideFile {
        /// Path of the override file.
        path: PathBuf,
        /// The underlying dotenv error.
        source: dotenvy::Error,
    },

    /// A required directory could not be created.
    #[error("failed to create directory {path}: {source}")]
    Directory {
        /// The directory that could not be created.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The current working directory could not be determined.
    #[error("failed to determine working directory: {0}")]
    WorkingDir(#[source] std::io::Error),
}
