//! Single-threaded retry pass.
//!
//! After the concurrent pass, every failure gets exactly one more attempt on
//! a fresh session, sequentially, so transient flakiness (slow modal, lost
//! download event) does not pollute the final report. Runs at most once per
//! run; datasets that fail again keep their second failure record.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use crate::models::{DownloadResult, DownloadTask, RunResults};
use crate::workflow::DownloadDriver;

/// The retry session uses worker id 0 to stand apart from pool workers in
/// the report.
const RETRY_WORKER_ID: usize = 0;

pub struct RetryCoordinator {
    driver: Arc<dyn DownloadDriver>,
    delay_between_downloads: Duration,
}

impl RetryCoordinator {
    pub fn new(driver: Arc<dyn DownloadDriver>, delay_between_downloads: Duration) -> Self {
        Self {
            driver,
            delay_between_downloads,
        }
    }

    /// Re-attempts every failure in `results` once, moving recovered
    /// datasets into the success collection. Returns how many recovered.
    pub async fn run(&self, results: &mut RunResults) -> usize {
        let failures = std::mem::take(&mut results.failures);
        if failures.is_empty() {
            return 0;
        }
        info!("🔄 Retrying {} failed datasets sequentially", failures.len());

        let mut session = match self.driver.open_session(RETRY_WORKER_ID).await {
            Ok(session) => session,
            Err(e) => {
                error!("💥 Retry session could not start: {:#}", e);
                results.failures = failures;
                return 0;
            }
        };

        let total = failures.len();
        let mut recovered = 0;
        for (i, failure) in failures.into_iter().enumerate() {
            let task = DownloadTask {
                index: i + 1,
                total,
                dataset: failure.to_descriptor(),
            };
            match session.download(&task).await {
                DownloadResult::Success(mut success) => {
                    success.retried = true;
                    success.previous_error = Some(failure.error_message.clone());
                    results.successes.push(success);
                    recovered += 1;
                }
                DownloadResult::Failure(mut second) => {
                    second.retried = true;
                    results.failures.push(second);
                }
            }
            tokio::time::sleep(self.delay_between_downloads).await;
        }
        session.close().await;

        info!(
            "🔄 Retry pass recovered {}/{} datasets",
            recovered,
            total
        );
        recovered
    }
}
