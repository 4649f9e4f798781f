//! Sub-page discovery only.

use anyhow::Context;
use console::style;
use tracing::warn;
use url::Url;

use threadpress::browser::BrowserSession;
use threadpress::config::Config;
use threadpress::harvest::Harvester;

pub async fn cmd_pages(config: &Config, url: &str) -> anyhow::Result<()> {
    let start = Url::parse(url).with_context(|| format!("Invalid thread URL: {}", url))?;
    let harvester = Harvester::new(config)?;

    let session = BrowserSession::launch(&config.browser).await?;
    let result: anyhow::Result<_> = async {
        let mut page = session.open_page(config).await?;
        harvester
            .discover(&mut page, &start)
            .await
            .context("Discovery failed")
    }
    .await;
    if let Err(e) = session.close().await {
        warn!("Failed to close browser: {}", e);
    }
    let discovery = result?;

    println!(
        "{} {} ({} sub-pages via {})",
        style("✓").green(),
        discovery.head.title,
        discovery.located.pages.len(),
        discovery.located.tier
    );
    for page in &discovery.located.pages {
        println!("  {} {:>3}  {}", style("→").cyan(), page.ordinal, page.url);
    }

    Ok(())
}
