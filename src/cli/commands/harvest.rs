//! Full harvest: locate, expand, extract, render, notify.

use std::path::PathBuf;

use anyhow::Context;
use console::style;
use tokio::sync::mpsc;
use tracing::warn;
use url::Url;

use threadpress::browser::BrowserSession;
use threadpress::config::{Config, RenderStrategy};
use threadpress::harvest::Harvester;
use threadpress::notify::Notifier;
use threadpress::render::renderer_for;

use crate::cli::progress;

/// Command-line overrides for a harvest run.
#[derive(Debug, Default)]
pub struct HarvestOptions {
    pub output: Option<PathBuf>,
    pub renderer: Option<RenderStrategy>,
    pub max_probe_pages: Option<u32>,
    pub max_rounds: Option<u32>,
    pub ntfy: Option<String>,
    pub headed: bool,
}

impl HarvestOptions {
    /// Apply the overrides and return the resolved output path.
    fn apply(self, config: &mut Config) -> PathBuf {
        if let Some(renderer) = self.renderer {
            config.render.strategy = renderer;
        }
        if let Some(max) = self.max_probe_pages {
            config.harvest.max_probe_pages = max;
        }
        if let Some(max) = self.max_rounds {
            config.harvest.max_rounds = max;
        }
        if self.ntfy.is_some() {
            config.notify.ntfy_url = self.ntfy;
        }
        if self.headed {
            config.browser.headless = false;
        }

        match self.output {
            Some(path) => PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).as_ref()),
            None => config.resolve_path(&config.render.output),
        }
    }
}

pub async fn cmd_harvest(mut config: Config, url: &str, options: HarvestOptions) -> anyhow::Result<()> {
    let start = Url::parse(url).with_context(|| format!("Invalid thread URL: {}", url))?;
    let output = options.apply(&mut config);

    let renderer = renderer_for(&config.render);
    let (tx, rx) = mpsc::channel(64);
    let progress = progress::spawn(rx);
    let harvester = Harvester::new(&config)?
        .with_captures(renderer.needs_page_captures())
        .with_events(tx);

    println!(
        "{} Harvesting {} ({} layout)",
        style("→").cyan(),
        start,
        renderer.strategy()
    );

    let session = BrowserSession::launch(&config.browser).await?;
    let result: anyhow::Result<_> = async {
        let mut page = session.open_page(&config).await?;
        harvester
            .harvest(&mut page, &start)
            .await
            .context("Harvest failed")
    }
    .await;

    // Dropping the harvester closes the event channel.
    drop(harvester);
    let _ = progress.await;
    if let Err(e) = session.close().await {
        warn!("Failed to close browser: {}", e);
    }
    let outcome = result?;

    if !outcome.skipped_pages.is_empty() {
        println!(
            "{} Skipped sub-pages: {:?}",
            style("!").yellow(),
            outcome.skipped_pages
        );
    }

    let rendered = renderer
        .render(&outcome.head, &outcome.comments, &outcome.captures)
        .context("Rendering failed")?;
    rendered
        .write_to(&output)
        .await
        .context("Failed to write PDF")?;

    println!(
        "{} {} ({} comments from {} sub-pages, {} expanded, {} PDF pages)",
        style("✓").green(),
        output.display(),
        outcome.comments.len(),
        outcome.pages.len(),
        outcome.expansions,
        rendered.page_count()
    );

    if let Some(notifier) = Notifier::from_config(&config.notify) {
        let message = Notifier::message(
            &outcome.head.title,
            outcome.comments.len(),
            outcome.pages.len(),
            &output,
        );
        if notifier.send(&message).await {
            println!("{} Notification sent", style("✓").green());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_apply_to_config() {
        let mut config = Config::default();
        let options = HarvestOptions {
            output: Some(PathBuf::from("/tmp/thread.pdf")),
            renderer: Some(RenderStrategy::Raster),
            max_probe_pages: Some(7),
            max_rounds: Some(3),
            ntfy: Some("https://ntfy.sh/deals".to_string()),
            headed: true,
        };

        let output = options.apply(&mut config);
        assert_eq!(output, PathBuf::from("/tmp/thread.pdf"));
        assert_eq!(config.render.strategy, RenderStrategy::Raster);
        assert_eq!(config.harvest.max_probe_pages, 7);
        assert_eq!(config.harvest.max_rounds, 3);
        assert_eq!(config.notify.ntfy_url.as_deref(), Some("https://ntfy.sh/deals"));
        assert!(!config.browser.headless);
    }

    #[test]
    fn test_no_overrides_keep_config() {
        let mut config = Config::default();
        let output = HarvestOptions::default().apply(&mut config);
        assert!(output.ends_with("thread-output.pdf"));
        assert_eq!(config, Config::default());
    }
}
