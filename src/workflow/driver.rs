//! Session seam between the orchestrator and the browser.
//!
//! The worker pool talks to [`DownloadDriver`] / [`DownloadSession`] only, so
//! pool, retry and report logic can be exercised against a scripted driver
//! without a browser process.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::Browser;
use tracing::{info, warn};

use crate::browser::launch_session;
use crate::config::Config;
use crate::infrastructure::PageDriver;
use crate::models::{DownloadResult, DownloadTask};
use crate::storage::ArtifactStore;
use crate::workflow::download_flow::ExportFlow;

/// A live, exclusively-owned download session. One per worker.
#[async_trait]
pub trait DownloadSession: Send {
    /// Processes one dataset. Infallible by contract: failures come back as
    /// classified [`DownloadResult::Failure`] records.
    async fn download(&mut self, task: &DownloadTask) -> DownloadResult;

    /// Releases the session's resources. Best-effort.
    async fn close(&mut self);
}

/// Opens download sessions. Shared across the worker pool.
#[async_trait]
pub trait DownloadDriver: Send + Sync {
    async fn open_session(&self, worker_id: usize) -> Result<Box<dyn DownloadSession>>;
}

/// The production driver: one Chromium process per session.
pub struct ChromiumDriver {
    config: Config,
    storage: Arc<dyn ArtifactStore>,
    date_folder: String,
}

impl ChromiumDriver {
    pub fn new(config: Config, storage: Arc<dyn ArtifactStore>, date_folder: String) -> Self {
        Self {
            config,
            storage,
            date_folder,
        }
    }
}

#[async_trait]
impl DownloadDriver for ChromiumDriver {
    async fn open_session(&self, worker_id: usize) -> Result<Box<dyn DownloadSession>> {
        let (browser, page) = launch_session(&self.config)
            .await
            .with_context(|| format!("worker {} could not launch a browser", worker_id))?;
        info!("🚀 Worker {} browser ready", worker_id);

        let flow = ExportFlow::new(
            PageDriver::new(page),
            Arc::clone(&self.storage),
            self.config.clone(),
            self.date_folder.clone(),
            worker_id,
        );

        Ok(Box::new(ChromiumSession {
            browser,
            flow,
            worker_id,
        }))
    }
}

struct ChromiumSession {
    browser: Browser,
    flow: ExportFlow,
    worker_id: usize,
}

#[async_trait]
impl DownloadSession for ChromiumSession {
    async fn download(&mut self, task: &DownloadTask) -> DownloadResult {
        self.flow.run(task).await
    }

    async fn close(&mut self) {
        if let Err(e) = self.browser.close().await {
            warn!("⚠️ Worker {} browser close failed: {}", self.worker_id, e);
        }
    }
}
