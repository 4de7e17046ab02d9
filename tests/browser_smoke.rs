//! Real-browser smoke tests. Need a local Chromium install; run with
//! `cargo test -- --ignored`.

use std::time::Duration;

use ine_scraper::browser::launch_session;
use ine_scraper::config::Config;
use ine_scraper::infrastructure::PageDriver;

#[tokio::test]
#[ignore]
async fn launches_and_evaluates_javascript() {
    let config = Config::default();
    let (browser, page) = launch_session(&config).await.expect("browser");
    let driver = PageDriver::new(page);

    let sum: i64 = driver.eval_as("1 + 41").await.expect("eval");
    assert_eq!(sum, 42);

    let attached = driver
        .wait_until("(() => document.readyState === 'complete')()", Duration::from_secs(5))
        .await
        .expect("wait");
    assert!(attached);

    drop(browser);
}
