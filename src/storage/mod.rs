//! Artifact persistence behind a backend-agnostic trait.
//!
//! Artifacts are addressed by `(logical folder, filename)`, where the logical
//! folder is date-scoped (`18-10-2025/raw`, `18-10-2025/reportes`). The two
//! backends must satisfy identical semantics; the one documented exception is
//! `rename` on S3, which is copy-then-delete and therefore not atomic.
//!
//! The store is an explicitly constructed dependency passed down from the
//! orchestrator. There is no process-wide singleton; tests build their own.

pub mod local;
pub mod s3;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::config::{Config, StorageBackend};
use crate::error::StorageError;

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Persists a byte blob under `folder/filename`.
    async fn save(&self, data: &[u8], filename: &str, folder: &str) -> Result<(), StorageError>;

    /// Loads a byte blob back.
    async fn load(&self, filename: &str, folder: &str) -> Result<Vec<u8>, StorageError>;

    /// Persists a structured report as pretty-printed JSON.
    async fn save_json(
        &self,
        value: &JsonValue,
        filename: &str,
        folder: &str,
    ) -> Result<(), StorageError>;

    /// Loads a structured report.
    async fn load_json(&self, filename: &str, folder: &str) -> Result<JsonValue, StorageError>;

    /// Lists filenames in a logical folder matching a simple glob pattern
    /// (`*`, `*.csv`, `paso*`).
    async fn list(&self, folder: &str, pattern: &str) -> Result<Vec<String>, StorageError>;

    /// Renames a file within a folder, returning its size in bytes. Not
    /// atomic on the S3 backend.
    async fn rename(&self, old: &str, new: &str, folder: &str) -> Result<u64, StorageError>;

    /// Whether a logical folder holds any artifacts.
    async fn folder_exists(&self, folder: &str) -> Result<bool, StorageError>;

    /// Deletes a logical folder and everything under it. Returns `false`
    /// when there was nothing to delete.
    async fn delete_folder(&self, folder: &str) -> Result<bool, StorageError>;

    /// The externally meaningful path of an artifact, recorded in reports.
    fn path_for(&self, filename: &str, folder: &str) -> String;
}

/// Builds the artifact store selected by the configuration.
pub async fn from_config(config: &Config) -> Result<Arc<dyn ArtifactStore>, StorageError> {
    match config.storage_backend {
        StorageBackend::Local => Ok(Arc::new(local::LocalStore::new(&config.output_dir))),
        StorageBackend::S3 => Ok(Arc::new(s3::S3Store::from_config(config).await?)),
    }
}

/// Minimal glob matching shared by both backends: `*` matches everything,
/// a single `*` may appear as a prefix or suffix wildcard.
pub(crate) fn pattern_matches(pattern: &str, name: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    if let Some(suffix) = pattern.strip_prefix('*') {
        return name.ends_with(suffix);
    }
    if let Some(prefix) = pattern.strip_suffix('*') {
        return name.starts_with(prefix);
    }
    name == pattern
}

#[cfg(test)]
mod tests {
    use super::pattern_matches;

    #[test]
    fn pattern_matching_covers_the_pipeline_cases() {
        assert!(pattern_matches("*", "anything.bin"));
        assert!(pattern_matches("*.csv", "Aire_PM25.csv"));
        assert!(!pattern_matches("*.csv", "paso1_scraper.json"));
        assert!(pattern_matches("paso*", "paso1_scraper.json"));
        assert!(pattern_matches("pipeline_completo.json", "pipeline_completo.json"));
    }
}
