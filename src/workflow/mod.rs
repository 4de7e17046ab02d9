pub mod download_flow;
pub mod driver;
pub mod locator;

pub use download_flow::ExportFlow;
pub use driver::{ChromiumDriver, DownloadDriver, DownloadSession};
