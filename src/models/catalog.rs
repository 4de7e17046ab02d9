//! Static dataset catalog.
//!
//! The catalog is a JSON file shipped with the deployment; it is loaded once
//! per run and never mutated.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::CatalogError;
use crate::utils::sanitize_filename;

/// One downloadable dataset as listed in the portal catalog.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DatasetDescriptor {
    pub id: String,
    pub url: String,
    pub nombre: String,
    #[serde(default = "default_category")]
    pub categoria: String,
}

pub(crate) fn default_category() -> String {
    "general".to_string()
}

impl DatasetDescriptor {
    /// Stored filename for this dataset's raw CSV, derived deterministically
    /// from its display name.
    pub fn stored_filename(&self) -> String {
        format!("{}.csv", sanitize_filename(&self.nombre))
    }
}

/// Loads the dataset catalog from `path`: a JSON array of descriptors.
///
/// A missing or empty catalog is a setup error and aborts the run. Sanitized
/// filename collisions between distinct dataset names are flagged here with a
/// warning; the download flow resolves them last-write-wins.
pub fn load_catalog(path: &str) -> Result<Vec<DatasetDescriptor>, CatalogError> {
    info!("📖 Loading catalog from {}", path);

    if !Path::new(path).exists() {
        return Err(CatalogError::NotFound {
            path: path.to_string(),
        });
    }

    let raw = std::fs::read_to_string(path).map_err(|source| CatalogError::Read {
        path: path.to_string(),
        source,
    })?;

    let datasets: Vec<DatasetDescriptor> =
        serde_json::from_str(&raw).map_err(|source| CatalogError::Parse {
            path: path.to_string(),
            source,
        })?;

    if datasets.is_empty() {
        return Err(CatalogError::Empty {
            path: path.to_string(),
        });
    }

    flag_filename_collisions(&datasets);

    info!("   ✅ {} datasets loaded", datasets.len());
    Ok(datasets)
}

/// Two distinct dataset names can sanitize to the same storage key. That is a
/// catalog defect, not a download failure, so it is surfaced up front.
fn flag_filename_collisions(datasets: &[DatasetDescriptor]) {
    let mut by_filename: HashMap<String, Vec<&str>> = HashMap::new();
    for dataset in datasets {
        by_filename
            .entry(dataset.stored_filename())
            .or_default()
            .push(&dataset.id);
    }

    for (filename, ids) in by_filename {
        if ids.len() > 1 {
            warn!(
                "⚠️ Datasets {:?} share the stored filename '{}'; the last download wins",
                ids, filename
            );
        }
    }
}
