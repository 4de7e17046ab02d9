//! AWS S3 backend.
//!
//! Mirrors the local backend's semantics over object keys. All keys live
//! under the `executions/` prefix so the bucket can also hold unrelated
//! deployment artifacts. `rename` is load + re-upload + delete, so callers
//! must not rely on atomicity.

use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use serde_json::Value as JsonValue;
use tracing::{debug, info};

use super::{pattern_matches, ArtifactStore};
use crate::config::Config;
use crate::error::StorageError;

const KEY_PREFIX: &str = "executions";

pub struct S3Store {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3Store {
    /// Builds the S3 client from the validated configuration. Credentials
    /// are required up front; a missing bucket or key pair has already been
    /// rejected by `Config::validate`.
    pub async fn from_config(config: &Config) -> Result<Self, StorageError> {
        let bucket = config
            .s3_bucket
            .clone()
            .ok_or_else(|| StorageError::remote("<setup>", "S3_BUCKET_NAME not configured"))?;
        let access_key = config
            .aws_access_key_id
            .clone()
            .ok_or_else(|| StorageError::remote("<setup>", "AWS credentials not configured"))?;
        let secret_key = config
            .aws_secret_access_key
            .clone()
            .ok_or_else(|| StorageError::remote("<setup>", "AWS credentials not configured"))?;

        let credentials =
            aws_sdk_s3::config::Credentials::new(access_key, secret_key, None, None, "env");
        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new(config.aws_region.clone()))
            .credentials_provider(credentials)
            .load()
            .await;

        info!(
            "💾 Storage backend: S3 (bucket: {}, region: {})",
            bucket, config.aws_region
        );

        Ok(Self {
            client: aws_sdk_s3::Client::new(&sdk_config),
            bucket,
        })
    }

    fn key(&self, filename: &str, folder: &str) -> String {
        if folder.is_empty() {
            format!("{}/{}", KEY_PREFIX, filename)
        } else {
            format!("{}/{}/{}", KEY_PREFIX, folder, filename)
        }
    }

    async fn put(&self, key: &str, data: Vec<u8>) -> Result<(), StorageError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| StorageError::remote(key, DisplayErrorContext(&e)))?;
        Ok(())
    }

    async fn keys_under(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .into_paginator()
            .send();

        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| StorageError::remote(prefix, DisplayErrorContext(&e)))?;
            for object in page.contents() {
                if let Some(key) = object.key() {
                    keys.push(key.to_string());
                }
            }
        }
        Ok(keys)
    }

    async fn delete_key(&self, key: &str) -> Result<(), StorageError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::remote(key, DisplayErrorContext(&e)))?;
        Ok(())
    }
}

#[async_trait]
impl ArtifactStore for S3Store {
    async fn save(&self, data: &[u8], filename: &str, folder: &str) -> Result<(), StorageError> {
        let key = self.key(filename, folder);
        self.put(&key, data.to_vec()).await?;
        debug!("[S3] saved {} ({:.1} KB)", key, data.len() as f64 / 1024.0);
        Ok(())
    }

    async fn load(&self, filename: &str, folder: &str) -> Result<Vec<u8>, StorageError> {
        let key = self.key(filename, folder);

        let output = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
        {
            Ok(output) => output,
            Err(err) => {
                let not_found = err
                    .as_service_error()
                    .map(|e| e.is_no_such_key())
                    .unwrap_or(false);
                return Err(if not_found {
                    StorageError::NotFound { key }
                } else {
                    StorageError::remote(&key, DisplayErrorContext(&err))
                });
            }
        };

        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| StorageError::remote(&key, e))?;
        Ok(bytes.into_bytes().to_vec())
    }

    async fn save_json(
        &self,
        value: &JsonValue,
        filename: &str,
        folder: &str,
    ) -> Result<(), StorageError> {
        let key = self.key(filename, folder);
        let data = serde_json::to_vec_pretty(value).map_err(|e| StorageError::Json {
            key: key.clone(),
            source: e,
        })?;
        self.put(&key, data).await
    }

    async fn load_json(&self, filename: &str, folder: &str) -> Result<JsonValue, StorageError> {
        let key = self.key(filename, folder);
        let data = self.load(filename, folder).await?;
        serde_json::from_slice(&data).map_err(|e| StorageError::Json { key, source: e })
    }

    async fn list(&self, folder: &str, pattern: &str) -> Result<Vec<String>, StorageError> {
        let prefix = format!("{}/{}/", KEY_PREFIX, folder);
        let mut names: Vec<String> = self
            .keys_under(&prefix)
            .await?
            .into_iter()
            .filter_map(|key| key.strip_prefix(&prefix).map(str::to_string))
            .filter(|name| !name.contains('/') && pattern_matches(pattern, name))
            .collect();
        names.sort();
        Ok(names)
    }

    async fn rename(&self, old: &str, new: &str, folder: &str) -> Result<u64, StorageError> {
        // Copy-then-delete; a crash between the two leaves both objects.
        let data = self.load(old, folder).await?;
        let size = data.len() as u64;
        self.put(&self.key(new, folder), data).await?;
        self.delete_key(&self.key(old, folder)).await?;
        Ok(size)
    }

    async fn folder_exists(&self, folder: &str) -> Result<bool, StorageError> {
        let prefix = format!("{}/{}/", KEY_PREFIX, folder);
        Ok(!self.keys_under(&prefix).await?.is_empty())
    }

    async fn delete_folder(&self, folder: &str) -> Result<bool, StorageError> {
        let prefix = format!("{}/{}/", KEY_PREFIX, folder);
        let keys = self.keys_under(&prefix).await?;
        if keys.is_empty() {
            return Ok(false);
        }

        info!("[S3] deleting {} objects under {}", keys.len(), prefix);
        for key in &keys {
            self.delete_key(key).await?;
        }
        Ok(true)
    }

    fn path_for(&self, filename: &str, folder: &str) -> String {
        format!("s3://{}/{}", self.bucket, self.key(filename, folder))
    }
}
