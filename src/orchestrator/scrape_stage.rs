//! The download stage: catalog in, raw CSVs plus a JSON report out.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::Config;
use crate::models::{load_catalog, DownloadTask, RunResults};
use crate::orchestrator::pipeline::PipelineStage;
use crate::orchestrator::retry::RetryCoordinator;
use crate::orchestrator::worker_pool::{log_pool_start, run_pool};
use crate::services::RunReport;
use crate::storage::ArtifactStore;
use crate::workflow::DownloadDriver;

pub struct ScrapeStage {
    config: Config,
    storage: Arc<dyn ArtifactStore>,
    driver: Arc<dyn DownloadDriver>,
    date_folder: String,
}

impl ScrapeStage {
    pub fn new(
        config: Config,
        storage: Arc<dyn ArtifactStore>,
        driver: Arc<dyn DownloadDriver>,
        date_folder: String,
    ) -> Self {
        Self {
            config,
            storage,
            driver,
            date_folder,
        }
    }

    /// Removes artifacts left by an earlier run on the same date, so the raw
    /// folder never mixes two runs.
    async fn clean_previous_run(&self) -> Result<()> {
        if self.storage.folder_exists(&self.date_folder).await? {
            warn!(
                "🧹 Removing artifacts from a previous run of {}",
                self.date_folder
            );
            self.storage.delete_folder(&self.date_folder).await?;
        }
        Ok(())
    }

    fn build_tasks(&self) -> Result<Vec<DownloadTask>> {
        let mut datasets = load_catalog(&self.config.catalog_path)?;
        if let Some(cap) = self.config.max_datasets {
            if datasets.len() > cap {
                info!("Capping run to the first {} of {} datasets", cap, datasets.len());
                datasets.truncate(cap);
            }
        }
        let total = datasets.len();
        Ok(datasets
            .into_iter()
            .enumerate()
            .map(|(i, dataset)| DownloadTask {
                index: i + 1,
                total,
                dataset,
            })
            .collect())
    }

    fn check_coverage(&self, tasks_total: usize, results: &RunResults) {
        if results.total() != tasks_total {
            warn!(
                "⚠️ Result count {} does not match task count {}; some datasets were lost",
                results.total(),
                tasks_total
            );
        }
        let mut ids = results.dataset_ids();
        let before = ids.len();
        ids.sort_unstable();
        ids.dedup();
        if ids.len() != before {
            warn!("⚠️ Duplicate result records detected in the run");
        }
    }

    async fn save_report(&self, report: &RunReport) -> Result<()> {
        let folder = format!("{}/reportes", self.date_folder);
        let json = report.to_json().context("failed to serialize run report")?;
        self.storage
            .save_json(&json, "paso1_scraper.json", &folder)
            .await
            .context("failed to persist run report")?;
        info!(
            "📝 Report saved to {}",
            self.storage.path_for("paso1_scraper.json", &folder)
        );
        Ok(())
    }
}

#[async_trait]
impl PipelineStage for ScrapeStage {
    fn number(&self) -> usize {
        1
    }

    fn name(&self) -> &'static str {
        "scraper"
    }

    fn fatal(&self) -> bool {
        true
    }

    async fn run(&self) -> Result<()> {
        let start = Instant::now();
        self.clean_previous_run().await?;

        let tasks = self.build_tasks()?;
        let tasks_total = tasks.len();
        let workers = self.config.max_concurrent_browsers.min(tasks_total.max(1));
        log_pool_start(tasks_total, workers);

        let delay = Duration::from_secs_f64(self.config.delay_between_downloads_secs);
        let pool_run = run_pool(Arc::clone(&self.driver), tasks, workers, delay).await;
        let mut results = pool_run.results;

        if pool_run.aborted.is_none() && !results.failures.is_empty() {
            RetryCoordinator::new(Arc::clone(&self.driver), delay)
                .run(&mut results)
                .await;
        }
        self.check_coverage(tasks_total, &results);

        // The report is written whether or not the pool survived.
        let report = RunReport::build(&results, &self.config, start.elapsed().as_secs_f64());
        report.render_console();
        self.save_report(&report).await?;

        match pool_run.aborted {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
