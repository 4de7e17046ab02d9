//! Concurrent dataset downloader for the INE statistics portal.
//!
//! The portal publishes its datasets behind a JavaScript export dialog with
//! no direct file URLs, so every CSV is obtained by driving a real browser
//! through the six-step export flow. The crate is layered:
//!
//! - `infrastructure` owns the browser page and exposes raw capabilities
//! - `workflow` implements the export protocol on top of those capabilities
//! - `orchestrator` fans the catalog out over a worker pool, retries
//!   failures, and runs the pipeline shell
//! - `services` aggregates results into the run report
//! - `storage` persists artifacts locally or on S3
//!
//! The binary entry point is `main.rs`; tests drive the orchestrator through
//! the [`workflow::DownloadDriver`] seam with scripted sessions.

pub mod browser;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod storage;
pub mod utils;
pub mod workflow;

pub use config::Config;
pub use orchestrator::App;
