//! Progress display for harvest events.

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use threadpress::harvest::HarvestEvent;

fn page_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("  {prefix:>12} [{bar:40.cyan/dim}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-")
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

/// Drive a progress bar from harvest events until the sender side closes.
pub fn spawn(mut events: mpsc::Receiver<HarvestEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let pb = ProgressBar::new_spinner();
        pb.set_style(spinner_style());
        pb.set_message("Opening thread...");

        while let Some(event) = events.recv().await {
            match event {
                HarvestEvent::Located { pages, tier } => {
                    pb.set_style(page_style());
                    pb.set_length(pages.len() as u64);
                    pb.set_prefix("sub-pages");
                    pb.println(format!(
                        "  {} {} sub-page(s) via {}",
                        style("→").cyan(),
                        pages.len(),
                        tier
                    ));
                }
                HarvestEvent::PageStarted { ordinal } => {
                    pb.set_message(format!("expanding page {}", ordinal));
                }
                HarvestEvent::PageDone {
                    ordinal,
                    comments,
                    expansions,
                } => {
                    pb.inc(1);
                    pb.println(format!(
                        "  {} page {}: {} comments ({} expanded)",
                        style("✓").green(),
                        ordinal,
                        comments,
                        expansions
                    ));
                }
                HarvestEvent::PageSkipped { ordinal, error } => {
                    pb.inc(1);
                    pb.println(format!(
                        "  {} page {} skipped: {}",
                        style("!").yellow(),
                        ordinal,
                        error
                    ));
                }
            }
        }

        pb.finish_and_clear();
    })
}
