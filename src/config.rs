//! Runtime configuration, loaded from environment variables.
//!
//! Every knob has a default suitable for a local development run; the
//! production deployment overrides them through the environment.

use crate::error::ConfigError;

/// Storage backend selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageBackend {
    /// Local filesystem under `output_dir`.
    Local,
    /// AWS S3 (requires bucket + credentials).
    S3,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// Number of concurrent browser sessions (workers).
    pub max_concurrent_browsers: usize,
    /// Timeout for each individual download, in seconds.
    pub download_timeout_secs: u64,
    /// Politeness pause between downloads per worker, in seconds.
    pub delay_between_downloads_secs: f64,
    /// Run Chromium headless.
    pub headless: bool,
    /// Browser viewport width.
    pub viewport_width: u32,
    /// Browser viewport height.
    pub viewport_height: u32,
    /// User agent sent by every browser session.
    pub user_agent: String,
    /// Cap on the number of datasets to process (test mode); `None` = all.
    pub max_datasets: Option<usize>,
    /// Path to the JSON dataset catalog.
    pub catalog_path: String,
    /// Root directory for local artifacts.
    pub output_dir: String,
    /// Which artifact store backend to build.
    pub storage_backend: StorageBackend,
    /// S3 bucket name (required when `storage_backend` is `S3`).
    pub s3_bucket: Option<String>,
    /// AWS region for the S3 backend.
    pub aws_region: String,
    /// AWS access key id (required when `storage_backend` is `S3`).
    pub aws_access_key_id: Option<String>,
    /// AWS secret access key (required when `storage_backend` is `S3`).
    pub aws_secret_access_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_concurrent_browsers: 4,
            download_timeout_secs: 60,
            delay_between_downloads_secs: 1.0,
            headless: true,
            viewport_width: 1920,
            viewport_height: 1080,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
            max_datasets: None,
            catalog_path: "ine_catalog.json".to_string(),
            output_dir: "outputs".to_string(),
            storage_backend: StorageBackend::Local,
            s3_bucket: None,
            aws_region: "us-east-1".to_string(),
            aws_access_key_id: None,
            aws_secret_access_key: None,
        }
    }
}

impl Config {
    /// Builds the configuration from environment variables, falling back to
    /// the defaults above for anything unset or unparsable.
    pub fn from_env() -> Result<Self, ConfigError> {
        let default = Self::default();

        let storage_backend = match std::env::var("STORAGE_BACKEND") {
            Ok(v) if v.eq_ignore_ascii_case("s3") => StorageBackend::S3,
            Ok(v) if v.eq_ignore_ascii_case("local") => StorageBackend::Local,
            Ok(v) => {
                return Err(ConfigError::InvalidValue {
                    var: "STORAGE_BACKEND".to_string(),
                    value: v,
                    expected: "local | s3".to_string(),
                })
            }
            Err(_) => StorageBackend::Local,
        };

        let config = Self {
            max_concurrent_browsers: env_parse("MAX_CONCURRENT_BROWSERS", "a positive integer")?
                .unwrap_or(default.max_concurrent_browsers),
            download_timeout_secs: env_parse("DOWNLOAD_TIMEOUT", "seconds as an integer")?
                .unwrap_or(default.download_timeout_secs),
            delay_between_downloads_secs: env_parse("DELAY_BETWEEN_DOWNLOADS", "seconds")?
                .unwrap_or(default.delay_between_downloads_secs),
            headless: env_parse("HEADLESS", "true | false")?.unwrap_or(default.headless),
            viewport_width: env_parse("VIEWPORT_WIDTH", "pixels")?
                .unwrap_or(default.viewport_width),
            viewport_height: env_parse("VIEWPORT_HEIGHT", "pixels")?
                .unwrap_or(default.viewport_height),
            user_agent: std::env::var("USER_AGENT").unwrap_or(default.user_agent),
            max_datasets: env_parse("MAX_DATASETS", "a positive integer")?,
            catalog_path: std::env::var("CATALOG_PATH").unwrap_or(default.catalog_path),
            output_dir: std::env::var("OUTPUT_DIR").unwrap_or(default.output_dir),
            storage_backend,
            s3_bucket: std::env::var("S3_BUCKET_NAME").ok(),
            aws_region: std::env::var("AWS_REGION").unwrap_or(default.aws_region),
            aws_access_key_id: std::env::var("AWS_ACCESS_KEY_ID").ok(),
            aws_secret_access_key: std::env::var("AWS_SECRET_ACCESS_KEY").ok(),
        };

        config.validate()?;
        Ok(config)
    }

    /// Setup-time validation. S3 mode without bucket/credentials is fatal.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_browsers == 0 {
            return Err(ConfigError::InvalidValue {
                var: "MAX_CONCURRENT_BROWSERS".to_string(),
                value: "0".to_string(),
                expected: "a positive integer".to_string(),
            });
        }

        if self.storage_backend == StorageBackend::S3 {
            if self.s3_bucket.as_deref().unwrap_or("").is_empty() {
                return Err(ConfigError::Missing {
                    var: "S3_BUCKET_NAME".to_string(),
                });
            }
            if self.aws_access_key_id.is_none() || self.aws_secret_access_key.is_none() {
                return Err(ConfigError::Missing {
                    var: "AWS_ACCESS_KEY_ID / AWS_SECRET_ACCESS_KEY".to_string(),
                });
            }
        }

        Ok(())
    }

    /// Today's date-scoped artifact folder name, e.g. `18-10-2025`.
    pub fn run_date() -> String {
        chrono::Local::now().format("%d-%m-%Y").to_string()
    }
}

/// Reads and parses an environment variable. Unset means "use the default";
/// a value that is present but unparsable is a setup error and aborts the
/// run, the same as an unknown `STORAGE_BACKEND`.
fn env_parse<T: std::str::FromStr>(var: &str, expected: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                var: var.to_string(),
                value: raw,
                expected: expected.to_string(),
            }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_local_mode() {
        let config = Config::default();
        assert_eq!(config.storage_backend, StorageBackend::Local);
        assert_eq!(config.max_concurrent_browsers, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn s3_mode_without_credentials_is_rejected() {
        let config = Config {
            storage_backend: StorageBackend::S3,
            s3_bucket: Some("datasets".to_string()),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn garbage_numeric_env_value_aborts_instead_of_defaulting() {
        std::env::set_var("DOWNLOAD_TIMEOUT", "6O");
        let result = Config::from_env();
        std::env::remove_var("DOWNLOAD_TIMEOUT");

        match result {
            Err(ConfigError::InvalidValue { var, value, .. }) => {
                assert_eq!(var, "DOWNLOAD_TIMEOUT");
                assert_eq!(value, "6O");
            }
            other => panic!("expected InvalidValue, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn unset_env_values_fall_back_to_defaults() {
        std::env::remove_var("VIEWPORT_WIDTH");
        let parsed: Option<u32> = env_parse("VIEWPORT_WIDTH", "pixels").unwrap();
        assert_eq!(parsed, None);
    }

    #[test]
    fn zero_workers_is_rejected() {
        let config = Config {
            max_concurrent_browsers: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
