//! Crawl driver.
//!
//! Spawns one task per work item, waits for all of them, and hands back
//! the accumulated offers. Task failures are logged and counted; they never
//! abort the run.

use std::sync::Arc;

use koopi_offer_models::{FetchTask, Offer};
use koopi_scraper::PageSource;
use tokio::task::JoinSet;

use crate::accumulator::Accumulator;
use crate::fetcher::{CacheAsideFetcher, FetchOutcome};
use crate::progress::ProgressCallback;
use crate::scheduler::Scheduler;

/// Everything a spawned task needs, shared behind one [`Arc`].
pub struct RunContext<S> {
    pub fetcher: CacheAsideFetcher<S>,
    pub scheduler: Scheduler,
    pub accumulator: Accumulator,
    pub progress: Arc<dyn ProgressCallback>,
}

impl<S: PageSource> RunContext<S> {
    #[must_use]
    pub fn new(
        fetcher: CacheAsideFetcher<S>,
        scheduler: Scheduler,
        progress: Arc<dyn ProgressCallback>,
    ) -> Self {
        Self {
            fetcher,
            scheduler,
            accumulator: Accumulator::new(),
            progress,
        }
    }
}

/// Per-outcome task counts of a finished crawl.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CrawlSummary {
    pub tasks: usize,
    pub cached: usize,
    pub fetched: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl CrawlSummary {
    /// Number of network requests issued for listing pages.
    #[must_use]
    pub const fn requests(&self) -> usize {
        self.fetched + self.failed
    }
}

#[derive(Debug, Clone, Copy)]
enum TaskStatus {
    Cached,
    Fetched,
    Failed,
    Cancelled,
}

/// Offers and counts of a finished crawl.
#[derive(Debug)]
pub struct CrawlResult {
    /// Every extracted offer, ordered by task cache key.
    pub offers: Vec<Offer>,
    pub summary: CrawlSummary,
}

/// Runs every task and waits for all of them to finish.
pub async fn crawl<S>(ctx: Arc<RunContext<S>>, tasks: Vec<FetchTask>) -> CrawlResult
where
    S: PageSource + 'static,
{
    let mut summary = CrawlSummary {
        tasks: tasks.len(),
        ..CrawlSummary::default()
    };
    ctx.progress.set_total(tasks.len() as u64);

    let mut set = JoinSet::new();
    for task in tasks {
        let ctx = Arc::clone(&ctx);
        set.spawn(async move { run_task(&ctx, task).await });
    }

    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(TaskStatus::Cached) => summary.cached += 1,
            Ok(TaskStatus::Fetched) => summary.fetched += 1,
            Ok(TaskStatus::Failed) => summary.failed += 1,
            Ok(TaskStatus::Cancelled) => summary.cancelled += 1,
            Err(e) => {
                log::error!("Crawl task panicked: {e}");
                summary.failed += 1;
            }
        }
        ctx.progress.inc(1);
    }

    ctx.progress.finish(format!(
        "{} cached, {} fetched, {} failed, {} cancelled",
        summary.cached, summary.fetched, summary.failed, summary.cancelled
    ));

    CrawlResult {
        offers: ctx.accumulator.take(),
        summary,
    }
}

async fn run_task<S: PageSource>(ctx: &RunContext<S>, task: FetchTask) -> TaskStatus {
    match ctx.fetcher.fetch(&task, &ctx.scheduler).await {
        FetchOutcome::Cached(offers) => {
            let count = offers.len();
            let total = ctx.accumulator.append(&task, offers);
            log::info!("💾 [{}] {count} offers from cache (total {total})", task.query);
            TaskStatus::Cached
        }
        FetchOutcome::Fetched(offers) => {
            let count = offers.len();
            let total = ctx.accumulator.append(&task, offers);
            log::info!("🌐 [{}] {count} offers from {} (total {total})", task.query, task.url);
            ctx.progress.set_message(format!("{total} offers"));
            TaskStatus::Fetched
        }
        FetchOutcome::Failed(e) => {
            log::error!("💥 [{}] {} failed: {e}", task.query, task.url);
            TaskStatus::Failed
        }
        FetchOutcome::Cancelled => {
            log::debug!("[{}] skipped after shutdown", task.query);
            TaskStatus::Cancelled
        }
    }
}
