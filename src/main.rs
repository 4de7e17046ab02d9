use anyhow::Result;

use ine_scraper::{App, Config};
use ine_scraper::utils::logging;

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let config = Config::from_env()?;
    let app = App::initialize(config).await?;
    app.run().await
}
