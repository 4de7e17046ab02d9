//! Page driver - infrastructure layer.
//!
//! Owns the scarce resource (the `Page`) and exposes capabilities only:
//! navigation, JavaScript evaluation, predicate polling, and file-download
//! capture. It knows nothing about datasets or the export protocol.

use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Result};
use chromiumoxide::cdp::browser_protocol::browser::{
    DownloadProgressState, EventDownloadProgress, EventDownloadWillBegin,
    SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use chromiumoxide::Page;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tracing::debug;

/// How often `wait_until` re-evaluates its predicate.
const POLL_INTERVAL: Duration = Duration::from_millis(500);

pub struct PageDriver {
    page: Page,
}

impl PageDriver {
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Navigates to `url`, bounded by `timeout`. The follow-up navigation
    /// wait is best-effort; dynamic portal pages keep loading resources long
    /// after the DOM is usable.
    pub async fn goto(&self, url: &str, timeout: Duration) -> Result<()> {
        tokio::time::timeout(timeout, self.page.goto(url))
            .await
            .map_err(|_| anyhow!("navigation to {} timed out after {:?}", url, timeout))??;

        let _ = tokio::time::timeout(Duration::from_secs(10), self.page.wait_for_navigation()).await;
        Ok(())
    }

    /// Evaluates JavaScript and returns its JSON result. The script must
    /// produce a JSON-serializable value (not `undefined`).
    pub async fn eval(&self, js_code: impl Into<String>) -> Result<JsonValue> {
        let result = self.page.evaluate(js_code.into()).await?;
        let json_value = result.into_value()?;
        Ok(json_value)
    }

    /// Evaluates JavaScript and deserializes the result.
    pub async fn eval_as<T: DeserializeOwned>(&self, js_code: impl Into<String>) -> Result<T> {
        let json_value = self.eval(js_code).await?;
        let typed_value = serde_json::from_value(json_value)?;
        Ok(typed_value)
    }

    /// Polls a boolean JavaScript predicate until it holds or `timeout`
    /// elapses. Returns whether the predicate ever held.
    pub async fn wait_until(&self, predicate_js: &str, timeout: Duration) -> Result<bool> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.eval_as::<bool>(predicate_js).await.unwrap_or(false) {
                return Ok(true);
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Triggers a download by evaluating `trigger_js` and captures the
    /// resulting file's bytes.
    ///
    /// Downloads are routed into `download_dir` under their CDP guid; the
    /// temp file is removed after reading. Both the download-start event and
    /// completion are bounded by `timeout`.
    pub async fn capture_download(
        &self,
        trigger_js: String,
        download_dir: &Path,
        timeout: Duration,
    ) -> Result<Vec<u8>> {
        tokio::fs::create_dir_all(download_dir).await?;

        let behavior = SetDownloadBehaviorParams::builder()
            .behavior(SetDownloadBehaviorBehavior::AllowAndName)
            .download_path(download_dir.to_string_lossy().to_string())
            .events_enabled(true)
            .build()
            .map_err(|e| anyhow!("failed to build download behavior params: {}", e))?;
        self.page.execute(behavior).await?;

        // Listeners must be attached before the click fires.
        let mut will_begin = self.page.event_listener::<EventDownloadWillBegin>().await?;
        let mut progress = self.page.event_listener::<EventDownloadProgress>().await?;

        self.eval(trigger_js).await?;

        let guid = tokio::time::timeout(timeout, async {
            match will_begin.next().await {
                Some(event) => Ok(event.guid.clone()),
                None => Err(anyhow!("download event stream closed")),
            }
        })
        .await
        .map_err(|_| anyhow!("no download started within {:?}", timeout))??;
        debug!("Download started (guid: {})", guid);

        tokio::time::timeout(timeout, async {
            while let Some(event) = progress.next().await {
                if event.guid != guid {
                    continue;
                }
                match &event.state {
                    DownloadProgressState::Completed => return Ok(()),
                    DownloadProgressState::Canceled => {
                        return Err(anyhow!("download was canceled by the browser"))
                    }
                    _ => {}
                }
            }
            Err(anyhow!("download progress stream closed"))
        })
        .await
        .map_err(|_| anyhow!("download did not complete within {:?}", timeout))??;

        let file_path = download_dir.join(&guid);
        let bytes = tokio::fs::read(&file_path).await?;
        let _ = tokio::fs::remove_file(&file_path).await;
        Ok(bytes)
    }
}
