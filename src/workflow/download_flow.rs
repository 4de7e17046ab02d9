//! The six-step export protocol for one dataset.
//!
//! Step order: navigation → menu_search → csv_option_search → modal_access →
//! button_search → download. Every failure is stamped with the step where it
//! happened so the run report shows where in the chain breakage concentrates
//! (modal_access failures point at an overloaded site, button_search at a
//! layout change).
//!
//! Contract: `run` never returns an error. Step-level failures become
//! classified [`DownloadFailure`] records; the only side effect of a success
//! is exactly one artifact written to the store.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::infrastructure::PageDriver;
use crate::models::{DownloadFailure, DownloadResult, DownloadSuccess, DownloadTask, Step};
use crate::storage::ArtifactStore;
use crate::utils::truncate_text;
use crate::workflow::locator::{click_js, frame_attached_js, hover_js, Locator};

/// Selector of the export modal's iframe.
const DIALOG_FRAME: &str = "iframe#DialogFrame";

/// How long the modal iframe may take to attach.
const MODAL_TIMEOUT: Duration = Duration::from_secs(30);

/// How long the file-download event may take after the click.
const DOWNLOAD_EVENT_TIMEOUT: Duration = Duration::from_secs(45);

/// Links that switch the portal to Spanish.
const LANGUAGE_LINKS: &[Locator] = &[
    Locator::AnchorText("Español"),
    Locator::Css("a[href*=\"lang=es\"]"),
];

/// The "Exportar" menu trigger.
const EXPORT_MENU: &[Locator] = &[
    Locator::Css("li#menubar-export"),
    Locator::Css("li#menubar-export a"),
    Locator::AnchorText("Exportar"),
    Locator::Css("#menubar-export"),
];

/// The CSV option inside the export menu.
const CSV_OPTION: &[Locator] = &[
    Locator::Css("li#menuitemExportCSV a"),
    Locator::AnchorText("Archivo de texto (CSV)"),
    Locator::AnchorText("Text file (CSV)"),
    Locator::Css("[id*=\"ExportCSV\"]"),
];

/// The download button inside the modal iframe.
const DOWNLOAD_BUTTON: &[Locator] = &[
    Locator::InputValueContains(&["Descargar", "Download", "escargar"]),
    Locator::Css("input[value=\"Descargar\"]"),
    Locator::Css("input[value=\"Download\"]"),
    Locator::Css("[id*=\"btnExport\"]"),
];

/// Drives one page through the export protocol for successive datasets.
pub struct ExportFlow {
    driver: PageDriver,
    storage: Arc<dyn ArtifactStore>,
    config: Config,
    /// Date-scoped folder shared by the whole run (e.g. `18-10-2025`).
    date_folder: String,
    download_dir: PathBuf,
    worker_id: usize,
}

impl ExportFlow {
    pub fn new(
        driver: PageDriver,
        storage: Arc<dyn ArtifactStore>,
        config: Config,
        date_folder: String,
        worker_id: usize,
    ) -> Self {
        let download_dir = std::env::temp_dir().join(format!(
            "ine-scraper-{}-w{}",
            std::process::id(),
            worker_id
        ));
        Self {
            driver,
            storage,
            config,
            date_folder,
            download_dir,
            worker_id,
        }
    }

    /// Downloads one dataset, classifying any failure with the step where it
    /// broke. Never returns an error.
    pub async fn run(&self, task: &DownloadTask) -> DownloadResult {
        let start = Instant::now();
        let mut step = Step::Navigation;

        match self.execute(task, &mut step).await {
            Ok(mut success) => {
                success.elapsed_seconds = round2(start.elapsed().as_secs_f64());
                info!(
                    "[{}/{}] ✓ {} ({:.0} KB)",
                    task.index,
                    task.total,
                    task.dataset.nombre,
                    success.size_kb
                );
                DownloadResult::Success(success)
            }
            Err(e) => {
                let message = format!("{:#}", e);
                error!(
                    "[{}/{}] ✗ {} - Error at {}: {}",
                    task.index,
                    task.total,
                    task.dataset.nombre,
                    step,
                    truncate_text(&message, 50)
                );
                DownloadResult::Failure(DownloadFailure {
                    dataset_id: task.dataset.id.clone(),
                    display_name: task.dataset.nombre.clone(),
                    source_url: task.dataset.url.clone(),
                    category: task.dataset.categoria.clone(),
                    error_message: message,
                    failed_step: step,
                    elapsed_seconds: round2(start.elapsed().as_secs_f64()),
                    worker_id: self.worker_id,
                    retried: false,
                })
            }
        }
    }

    async fn execute(&self, task: &DownloadTask, step: &mut Step) -> Result<DownloadSuccess> {
        let dataset = &task.dataset;
        let page_timeout = Duration::from_secs(self.config.download_timeout_secs);

        // Step 1: navigate with the Spanish language forced.
        *step = Step::Navigation;
        let url_es = if dataset.url.contains("lang=es") {
            dataset.url.clone()
        } else {
            format!("{}&lang=es", dataset.url)
        };
        self.driver.goto(&url_es, page_timeout).await?;
        tokio::time::sleep(Duration::from_secs(3)).await;
        self.ensure_spanish().await;

        // Step 2: find and open the export menu.
        *step = Step::MenuSearch;
        if !self.locate_first(EXPORT_MENU, "export-menu", None, false).await? {
            bail!("export menu not found");
        }
        self.driver.eval(hover_js("export-menu")).await?;
        tokio::time::sleep(Duration::from_secs(2)).await;

        // Step 3: find a visible CSV option and click it.
        *step = Step::CsvOptionSearch;
        if !self.locate_first(CSV_OPTION, "csv-option", None, true).await? {
            bail!("no CSV option in the export menu");
        }
        self.driver.eval(click_js("csv-option", None)).await?;
        tokio::time::sleep(Duration::from_secs(3)).await;

        // Step 4: wait for the modal iframe to attach.
        *step = Step::ModalAccess;
        if !self
            .driver
            .wait_until(&frame_attached_js(DIALOG_FRAME), MODAL_TIMEOUT)
            .await?
        {
            bail!("modal iframe did not attach within {:?}", MODAL_TIMEOUT);
        }

        // Step 5: find the download button inside the iframe.
        *step = Step::ButtonSearch;
        if !self
            .locate_first(DOWNLOAD_BUTTON, "download-btn", Some(DIALOG_FRAME), false)
            .await?
        {
            bail!("download button not found in the modal");
        }

        // Step 6: click and capture the file, then persist it.
        *step = Step::Download;
        let bytes = self
            .driver
            .capture_download(
                click_js("download-btn", Some(DIALOG_FRAME)),
                &self.download_dir,
                DOWNLOAD_EVENT_TIMEOUT,
            )
            .await?;

        let stored_filename = dataset.stored_filename();
        let raw_folder = format!("{}/raw", self.date_folder);
        self.storage
            .save(&bytes, &stored_filename, &raw_folder)
            .await
            .context("failed to persist downloaded artifact")?;

        let byte_size = bytes.len() as u64;
        Ok(DownloadSuccess {
            dataset_id: dataset.id.clone(),
            display_name: dataset.nombre.clone(),
            stored_path: self.storage.path_for(&stored_filename, &raw_folder),
            stored_filename,
            category: dataset.categoria.clone(),
            byte_size,
            size_kb: round2(byte_size as f64 / 1024.0),
            elapsed_seconds: 0.0, // stamped by `run`
            worker_id: self.worker_id,
            retried: false,
            previous_error: None,
        })
    }

    /// Tries each locator in order; first match wins.
    async fn locate_first(
        &self,
        locators: &[Locator],
        mark: &str,
        frame: Option<&str>,
        require_visible: bool,
    ) -> Result<bool> {
        for locator in locators {
            match self
                .driver
                .eval_as::<bool>(locator.find_js(mark, frame, require_visible))
                .await
            {
                Ok(true) => return Ok(true),
                Ok(false) => continue,
                // A broken probe on one alternative must not end the chain.
                Err(e) => {
                    warn!("Locator probe failed ({:?}): {}", locator, e);
                    continue;
                }
            }
        }
        Ok(false)
    }

    /// Best-effort language switch; the protocol tolerates a page that stays
    /// in another language, later steps fall back to English labels.
    async fn ensure_spanish(&self) {
        let already_spanish = self
            .driver
            .eval_as::<bool>(
                "(() => location.href.includes('lang=es') || \
                 Array.from(document.querySelectorAll('a'))\
                 .some(a => (a.textContent || '').includes('Exportar')))()",
            )
            .await
            .unwrap_or(false);
        if already_spanish {
            return;
        }

        for locator in LANGUAGE_LINKS {
            let found = self
                .driver
                .eval_as::<bool>(locator.find_js("lang-es", None, false))
                .await
                .unwrap_or(false);
            if !found {
                continue;
            }
            if let Err(e) = self.driver.eval(click_js("lang-es", None)).await {
                warn!("⚠️ Language switch click failed: {}", e);
                return;
            }
            tokio::time::sleep(Duration::from_secs(2)).await;
            return;
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
