//! Local filesystem backend.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tracing::{debug, info};

use super::{pattern_matches, ArtifactStore};
use crate::error::StorageError;

pub struct LocalStore {
    base_dir: PathBuf,
}

impl LocalStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        info!("💾 Storage backend: LOCAL ({})", base_dir.display());
        Self { base_dir }
    }

    fn full_path(&self, filename: &str, folder: &str) -> PathBuf {
        self.base_dir.join(folder).join(filename)
    }

    async fn ensure_parent(&self, path: &Path, key: &str) -> Result<(), StorageError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::io(key, e))?;
        }
        Ok(())
    }
}

#[async_trait]
impl ArtifactStore for LocalStore {
    async fn save(&self, data: &[u8], filename: &str, folder: &str) -> Result<(), StorageError> {
        let key = self.path_for(filename, folder);
        let path = self.full_path(filename, folder);
        self.ensure_parent(&path, &key).await?;

        tokio::fs::write(&path, data)
            .await
            .map_err(|e| StorageError::io(&key, e))?;

        debug!("[LOCAL] saved {} ({:.1} KB)", key, data.len() as f64 / 1024.0);
        Ok(())
    }

    async fn load(&self, filename: &str, folder: &str) -> Result<Vec<u8>, StorageError> {
        let key = self.path_for(filename, folder);
        let path = self.full_path(filename, folder);

        if !path.exists() {
            return Err(StorageError::NotFound { key });
        }
        tokio::fs::read(&path)
            .await
            .map_err(|e| StorageError::io(&key, e))
    }

    async fn save_json(
        &self,
        value: &JsonValue,
        filename: &str,
        folder: &str,
    ) -> Result<(), StorageError> {
        let key = self.path_for(filename, folder);
        let data = serde_json::to_vec_pretty(value).map_err(|e| StorageError::Json {
            key: key.clone(),
            source: e,
        })?;
        self.save(&data, filename, folder).await
    }

    async fn load_json(&self, filename: &str, folder: &str) -> Result<JsonValue, StorageError> {
        let key = self.path_for(filename, folder);
        let data = self.load(filename, folder).await?;
        serde_json::from_slice(&data).map_err(|e| StorageError::Json { key, source: e })
    }

    async fn list(&self, folder: &str, pattern: &str) -> Result<Vec<String>, StorageError> {
        let dir = self.base_dir.join(folder);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| StorageError::io(folder, e))?;

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::io(folder, e))?
        {
            let name = entry.file_name().to_string_lossy().to_string();
            if entry.path().is_file() && pattern_matches(pattern, &name) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    async fn rename(&self, old: &str, new: &str, folder: &str) -> Result<u64, StorageError> {
        let old_path = self.full_path(old, folder);
        let new_path = self.full_path(new, folder);
        let key = self.path_for(old, folder);

        if !old_path.exists() {
            return Err(StorageError::NotFound { key });
        }
        tokio::fs::rename(&old_path, &new_path)
            .await
            .map_err(|e| StorageError::io(&key, e))?;

        let meta = tokio::fs::metadata(&new_path)
            .await
            .map_err(|e| StorageError::io(self.path_for(new, folder), e))?;
        Ok(meta.len())
    }

    async fn folder_exists(&self, folder: &str) -> Result<bool, StorageError> {
        Ok(self.base_dir.join(folder).is_dir())
    }

    async fn delete_folder(&self, folder: &str) -> Result<bool, StorageError> {
        let dir = self.base_dir.join(folder);
        if !dir.exists() {
            debug!("[LOCAL] folder does not exist: {}", dir.display());
            return Ok(false);
        }
        tokio::fs::remove_dir_all(&dir)
            .await
            .map_err(|e| StorageError::io(folder, e))?;
        info!("[LOCAL] 🗑 deleted folder {}", dir.display());
        Ok(true)
    }

    fn path_for(&self, filename: &str, folder: &str) -> String {
        if folder.is_empty() {
            filename.to_string()
        } else {
            format!("{}/{}", folder, filename)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> (tempfile::TempDir, LocalStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = LocalStore::new(dir.path());
        (dir, store)
    }

    #[tokio::test]
    async fn byte_round_trip_is_identity() {
        let (_dir, store) = store();
        let payload = b"estacion;fecha;valor\nE-001;2025-01-01;42\n";

        store
            .save(payload, "Aire_PM25.csv", "18-10-2025/raw")
            .await
            .unwrap();
        let loaded = store.load("Aire_PM25.csv", "18-10-2025/raw").await.unwrap();
        assert_eq!(loaded, payload);
    }

    #[tokio::test]
    async fn json_round_trip_and_listing() {
        let (_dir, store) = store();
        let report = json!({"resumen": {"total": 3, "exitosos": 2}});

        store
            .save_json(&report, "paso1_scraper.json", "18-10-2025/reportes")
            .await
            .unwrap();
        store
            .save(b"x", "notas.txt", "18-10-2025/reportes")
            .await
            .unwrap();

        let loaded = store
            .load_json("paso1_scraper.json", "18-10-2025/reportes")
            .await
            .unwrap();
        assert_eq!(loaded, report);

        let jsons = store.list("18-10-2025/reportes", "*.json").await.unwrap();
        assert_eq!(jsons, vec!["paso1_scraper.json"]);
    }

    #[tokio::test]
    async fn rename_reports_size_and_moves_the_file() {
        let (_dir, store) = store();
        store.save(b"12345", "a.csv", "f").await.unwrap();

        let size = store.rename("a.csv", "b.csv", "f").await.unwrap();
        assert_eq!(size, 5);
        assert!(store.load("a.csv", "f").await.is_err());
        assert_eq!(store.load("b.csv", "f").await.unwrap(), b"12345");
    }

    #[tokio::test]
    async fn delete_folder_is_idempotent_about_absence() {
        let (_dir, store) = store();
        store.save(b"x", "a.csv", "18-10-2025/raw").await.unwrap();

        assert!(store.folder_exists("18-10-2025").await.unwrap());
        assert!(store.delete_folder("18-10-2025").await.unwrap());
        assert!(!store.folder_exists("18-10-2025").await.unwrap());
        assert!(!store.delete_folder("18-10-2025").await.unwrap());
    }

    #[tokio::test]
    async fn loading_a_missing_artifact_is_not_found() {
        let (_dir, store) = store();
        let err = store.load("missing.csv", "f").await.unwrap_err();
        assert!(matches!(err, crate::error::StorageError::NotFound { .. }));
    }
}
