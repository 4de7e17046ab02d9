//! Data model: the dataset catalog and download result records.

pub mod catalog;
pub mod results;

pub use catalog::{load_catalog, DatasetDescriptor};
pub use results::{
    DownloadFailure, DownloadResult, DownloadSuccess, DownloadTask, RunResults, Step,
};
