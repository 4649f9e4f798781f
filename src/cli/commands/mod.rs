//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod harvest;
mod pages;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use threadpress::config::{Config, RenderStrategy};

#[derive(Parser)]
#[command(name = "threadpress")]
#[command(about = "Harvest paginated discussion threads with hidden replies into a single PDF")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Harvest every sub-page of a thread into one PDF
    Harvest {
        /// Start location of the thread
        url: String,
        /// Output PDF path (default from config: thread-output.pdf)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Output layout
        #[arg(short, long, value_enum)]
        renderer: Option<RenderStrategy>,
        /// Highest page ordinal probed when no pagination links are found
        #[arg(long)]
        max_probe_pages: Option<u32>,
        /// Reply expansion rounds per sub-page
        #[arg(long)]
        max_rounds: Option<u32>,
        /// ntfy topic URL notified after the PDF is written
        #[arg(long, env = "NTFY_URL")]
        ntfy: Option<String>,
        /// Show the browser window
        #[arg(long)]
        headed: bool,
    },

    /// List the sub-pages of a thread without harvesting them
    Pages {
        /// Start location of the thread
        url: String,
    },
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref())
        .await
        .context("Failed to load configuration")?;

    match cli.command {
        Commands::Harvest {
            url,
            output,
            renderer,
            max_probe_pages,
            max_rounds,
            ntfy,
            headed,
        } => {
            let options = harvest::HarvestOptions {
                output,
                renderer,
                max_probe_pages,
                max_rounds,
                ntfy,
                headed,
            };
            harvest::cmd_harvest(config, &url, options).await
        }
        Commands::Pages { url } => pages::cmd_pages(&config, &url).await,
    }
}
