//! Orchestration layer: wires configuration, storage, driver and stages
//! together and runs the pipeline.

pub mod pipeline;
pub mod retry;
pub mod scrape_stage;
pub mod task_queue;
pub mod worker_pool;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::config::Config;
use crate::storage::{self, ArtifactStore};
use crate::workflow::ChromiumDriver;

pub use pipeline::{Pipeline, PipelineStage};
pub use scrape_stage::ScrapeStage;

pub struct App {
    config: Config,
    storage: Arc<dyn ArtifactStore>,
    date_folder: String,
}

impl App {
    /// Builds the application from configuration: validates it, constructs
    /// the artifact store and fixes the run's date folder.
    pub async fn initialize(config: Config) -> Result<Self> {
        config.validate().context("invalid configuration")?;
        let storage = storage::from_config(&config)
            .await
            .context("failed to initialize the artifact store")?;
        let date_folder = Config::run_date();
        info!(
            "🚀 ine-scraper v{} | {} workers | backend {:?} | run {}",
            env!("CARGO_PKG_VERSION"),
            config.max_concurrent_browsers,
            config.storage_backend,
            date_folder
        );
        Ok(Self {
            config,
            storage,
            date_folder,
        })
    }

    /// Runs the pipeline. Today it holds the download stage only; the
    /// transformation stages plug in as further [`PipelineStage`] boxes.
    pub async fn run(&self) -> Result<()> {
        let driver = Arc::new(ChromiumDriver::new(
            self.config.clone(),
            Arc::clone(&self.storage),
            self.date_folder.clone(),
        ));

        Pipeline::new(Arc::clone(&self.storage), self.date_folder.clone())
            .add_stage(Box::new(ScrapeStage::new(
                self.config.clone(),
                Arc::clone(&self.storage),
                driver,
                self.date_folder.clone(),
            )))
            .run()
            .await
    }
}
