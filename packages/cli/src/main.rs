#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line entry point for the koopi discount crawler.
//!
//! One invocation is one crawl: take the process lock, crawl the query
//! list, and rewrite `koopi.csv` and `koopi.json`. Any fatal error ends
//! the process with a nonzero exit code.
//!
//! Uses `indicatif-log-bridge` (via [`koopi_cli_utils::init_logger`]) so
//! per-task log lines and the task bar never fight for the terminal.

mod pipeline;

use std::path::PathBuf;

use clap::Parser;
use koopi_crawl::config::CrawlConfig;

#[derive(Parser)]
#[command(name = "koopi", about = "Polite, resumable kupi.cz discount crawler")]
struct Cli {
    /// TOML configuration file; built-in defaults are used when omitted
    #[arg(long)]
    config: Option<PathBuf>,
    /// Query list to crawl (overrides `paths.input`)
    #[arg(long)]
    input: Option<PathBuf>,
    /// Maximum number of result pages to visit (overrides `limits.max_tasks`)
    #[arg(long)]
    max_tasks: Option<usize>,
    /// Maximum simultaneous requests (overrides `limits.concurrency`)
    #[arg(long)]
    concurrency: Option<usize>,
    /// Size of the politeness token pool (overrides `limits.politeness_tokens`)
    #[arg(long)]
    politeness: Option<usize>,
    /// Skip downloading product thumbnails
    #[arg(long)]
    no_images: bool,
}

impl Cli {
    /// Applies command-line overrides on top of the loaded configuration.
    fn apply(&self, config: &mut CrawlConfig) {
        if let Some(input) = &self.input {
            config.paths.input.clone_from(input);
        }
        if let Some(max_tasks) = self.max_tasks {
            config.limits.max_tasks = max_tasks;
        }
        if let Some(concurrency) = self.concurrency {
            config.limits.concurrency = concurrency;
        }
        if let Some(politeness) = self.politeness {
            config.limits.politeness_tokens = politeness;
        }
        if self.no_images {
            config.limits.prefetch_images = false;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = koopi_cli_utils::init_logger();
    let cli = Cli::parse();

    let mut config = CrawlConfig::load(cli.config.as_deref())?;
    cli.apply(&mut config);
    config.validate()?;

    let report = pipeline::run(&config, &multi).await?;
    log::debug!(
        "{} unique offers after {} listing requests",
        report.unique,
        report.summary.requests()
    );

    Ok(())
}
