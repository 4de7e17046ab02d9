//! Typed errors for the library seams.
//!
//! Orchestration code follows the `anyhow::Result` convention; these types
//! exist where a caller can meaningfully distinguish failure causes
//! (configuration, catalog loading, artifact storage). UI-interaction
//! failures inside the export flow are not errors at all: they are classified
//! into [`crate::models::DownloadFailure`] records.

use thiserror::Error;

/// Configuration/setup errors. All of these abort the run.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {var}")]
    Missing { var: String },

    #[error("invalid value for {var}: '{value}' (expected {expected})")]
    InvalidValue {
        var: String,
        value: String,
        expected: String,
    },
}

/// Catalog loading errors.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog file not found: {path}")]
    NotFound { path: String },

    #[error("failed to read catalog {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse catalog {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("catalog {path} contains no datasets")]
    Empty { path: String },
}

/// Artifact store errors, shared by both backends.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("artifact not found: {key}")]
    NotFound { key: String },

    #[error("i/o error on {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {key}: {source}")]
    Json {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("s3 operation failed on {key}: {message}")]
    Remote { key: String, message: String },
}

impl StorageError {
    pub fn io(key: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            key: key.into(),
            source,
        }
    }

    pub fn remote(key: impl Into<String>, message: impl ToString) -> Self {
        Self::Remote {
            key: key.into(),
            message: message.to_string(),
        }
    }
}
