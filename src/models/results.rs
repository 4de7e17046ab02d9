//! Download tasks and their terminal results.
//!
//! Every dataset in the catalog produces exactly one terminal
//! [`DownloadResult`] per run: either a success after the concurrent pass or
//! the retry pass, or a failure classified with the protocol step where it
//! broke.

use serde::{Deserialize, Serialize};

use super::catalog::DatasetDescriptor;

/// The six steps of the export protocol, used for failure attribution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Navigation,
    MenuSearch,
    CsvOptionSearch,
    ModalAccess,
    ButtonSearch,
    Download,
}

impl Step {
    pub fn as_str(self) -> &'static str {
        match self {
            Step::Navigation => "navigation",
            Step::MenuSearch => "menu_search",
            Step::CsvOptionSearch => "csv_option_search",
            Step::ModalAccess => "modal_access",
            Step::ButtonSearch => "button_search",
            Step::Download => "download",
        }
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of work for a worker: a dataset plus its position in the run.
#[derive(Clone, Debug)]
pub struct DownloadTask {
    /// 1-based sequence index, for `[i/total]` progress lines.
    pub index: usize,
    /// Total number of tasks in this pass.
    pub total: usize,
    pub dataset: DatasetDescriptor,
}

/// A completed download.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadSuccess {
    pub dataset_id: String,
    pub display_name: String,
    pub stored_filename: String,
    pub stored_path: String,
    pub category: String,
    pub byte_size: u64,
    pub size_kb: f64,
    pub elapsed_seconds: f64,
    pub worker_id: usize,
    #[serde(default)]
    pub retried: bool,
    /// Error message from the first attempt, when this success came from the
    /// retry pass.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_error: Option<String>,
}

/// A download that failed, stamped with the step where it broke.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadFailure {
    pub dataset_id: String,
    pub display_name: String,
    pub source_url: String,
    #[serde(default = "super::catalog::default_category")]
    pub category: String,
    pub error_message: String,
    pub failed_step: Step,
    pub elapsed_seconds: f64,
    pub worker_id: usize,
    #[serde(default)]
    pub retried: bool,
}

impl DownloadFailure {
    /// Rebuilds the dataset descriptor for the retry pass.
    pub fn to_descriptor(&self) -> DatasetDescriptor {
        DatasetDescriptor {
            id: self.dataset_id.clone(),
            url: self.source_url.clone(),
            nombre: self.display_name.clone(),
            categoria: self.category.clone(),
        }
    }
}

/// Terminal outcome of one download attempt.
#[derive(Clone, Debug)]
pub enum DownloadResult {
    Success(DownloadSuccess),
    Failure(DownloadFailure),
}

impl DownloadResult {
    pub fn dataset_id(&self) -> &str {
        match self {
            DownloadResult::Success(s) => &s.dataset_id,
            DownloadResult::Failure(f) => &f.dataset_id,
        }
    }
}

/// The shared result collections. Held behind one mutex so classification
/// and append happen under a single exclusive section.
#[derive(Clone, Debug, Default)]
pub struct RunResults {
    pub successes: Vec<DownloadSuccess>,
    pub failures: Vec<DownloadFailure>,
}

impl RunResults {
    /// Classifies and appends one result. Insertion order is the only
    /// ordering the final report preserves.
    pub fn push(&mut self, result: DownloadResult) {
        match result {
            DownloadResult::Success(s) => self.successes.push(s),
            DownloadResult::Failure(f) => self.failures.push(f),
        }
    }

    pub fn total(&self) -> usize {
        self.successes.len() + self.failures.len()
    }

    /// Dataset ids across both collections, for the one-result-per-dataset
    /// invariant check.
    pub fn dataset_ids(&self) -> Vec<&str> {
        self.successes
            .iter()
            .map(|s| s.dataset_id.as_str())
            .chain(self.failures.iter().map(|f| f.dataset_id.as_str()))
            .collect()
    }
}
