//! Headless Chromium session launch.
//!
//! Each worker owns one exclusive browser process, so cookies, storage and
//! downloads never leak between workers.

use anyhow::Result;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error};

use crate::config::Config;

/// Launches one browser session and opens a blank page.
///
/// The CDP event handler is drained on a background task for the lifetime of
/// the browser; dropping the returned [`Browser`] ends it.
pub async fn launch_session(config: &Config) -> Result<(Browser, Page)> {
    let mut builder = BrowserConfig::builder()
        .window_size(config.viewport_width, config.viewport_height)
        .request_timeout(Duration::from_secs(config.download_timeout_secs))
        .arg("--disable-gpu")
        .arg("--no-sandbox")
        .arg("--disable-dev-shm-usage")
        .arg("--lang=es-ES")
        .arg(format!("--user-agent={}", config.user_agent));

    if config.headless {
        builder = builder.new_headless_mode();
    } else {
        builder = builder.with_head();
    }

    let browser_config = builder.build().map_err(|e| {
        error!("Failed to build browser config: {}", e);
        anyhow::anyhow!("failed to build browser config: {}", e)
    })?;

    let (browser, mut handler) = Browser::launch(browser_config).await.map_err(|e| {
        error!("Failed to launch headless browser: {}", e);
        anyhow::anyhow!("failed to launch headless browser: {}", e)
    })?;
    debug!("Browser session launched");

    tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });

    // Short pause so the browser state settles before the first command.
    sleep(Duration::from_millis(300)).await;

    let page = browser.new_page("about:blank").await.map_err(|e| {
        error!("Failed to create page: {}", e);
        anyhow::anyhow!("failed to create page: {}", e)
    })?;

    Ok((browser, page))
}
