//! End-to-end crawl pipeline.
//!
//! lock -> query list -> work list -> crawl -> dedupe -> catalog -> CSV +
//! JSON. Everything up to the crawl is fatal on error; inside the crawl a
//! failing task only loses its own offers.

use std::sync::Arc;
use std::time::Instant;

use koopi_cli_utils::{IndicatifProgress, MultiProgress};
use koopi_crawl::cache::{HtmlCache, ImageCache};
use koopi_crawl::config::CrawlConfig;
use koopi_crawl::fetcher::CacheAsideFetcher;
use koopi_crawl::lock::ProcessLock;
use koopi_crawl::progress::ProgressCallback;
use koopi_crawl::run::{CrawlSummary, RunContext, crawl};
use koopi_crawl::scheduler::Scheduler;
use koopi_crawl::signals;
use koopi_crawl::worklist::{build_tasks, read_query_rows, shuffle_and_cap};
use koopi_output::catalog::Catalog;
use koopi_output::collation::CzechCollator;
use koopi_output::csv_export::write_csv_file;
use koopi_output::dedupe::dedupe;
use koopi_output::feed::Feed;
use koopi_scraper::PageSource;
use koopi_scraper::http::{HttpPageSource, random_user_agent};
use koopi_scraper::listing::Extractor;
use tokio_util::sync::CancellationToken;

/// What a finished run produced.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub summary: CrawlSummary,
    /// Offers written after deduplication.
    pub unique: usize,
}

/// Runs one crawl against the live site.
///
/// # Errors
///
/// Returns an error if the lock is held by another process, the query list
/// cannot be read, or an output file cannot be written.
pub async fn run(
    config: &CrawlConfig,
    multi: &MultiProgress,
) -> Result<RunReport, Box<dyn std::error::Error>> {
    let _lock = ProcessLock::acquire(&config.paths.lock_file, config.limits.lock_stale_after())?;

    let user_agent = random_user_agent();
    log::info!("User agent: {user_agent}");
    let source = HttpPageSource::new(user_agent, config.limits.request_timeout())?;
    let progress = IndicatifProgress::tasks_bar(multi, "Crawling");

    run_with_source(config, source, progress).await
}

/// Runs one crawl with pages served by `source`. Does not take the lock.
///
/// # Errors
///
/// See [`run`].
pub async fn run_with_source<S>(
    config: &CrawlConfig,
    source: S,
    progress: Arc<dyn ProgressCallback>,
) -> Result<RunReport, Box<dyn std::error::Error>>
where
    S: PageSource + 'static,
{
    let start = Instant::now();

    let rows = read_query_rows(&config.paths.input)?;
    let tasks = shuffle_and_cap(build_tasks(&rows, &config.site), config.limits.max_tasks);
    if tasks.is_empty() {
        log::info!("{} is empty. Nothing to scrape.", config.paths.input.display());
        return Ok(RunReport::default());
    }
    log::info!("{} pages to visit from {} queries", tasks.len(), rows.len());

    let cancel = CancellationToken::new();
    let listener = signals::spawn_listener(cancel.clone());

    let limits = &config.limits;
    let scheduler = Scheduler::new(
        limits.concurrency,
        limits.politeness_tokens,
        limits.delay_bounds(),
        cancel.clone(),
    );
    let mut fetcher = CacheAsideFetcher::new(
        source,
        Extractor::new(config.rules.clone(), config.site.clone()),
        HtmlCache::new(&config.paths.html_cache),
    );
    if limits.prefetch_images {
        fetcher = fetcher.with_image_cache(ImageCache::new(&config.paths.image_cache));
    }

    let ctx = Arc::new(RunContext::new(fetcher, scheduler, progress));
    let result = crawl(ctx, tasks).await;

    if cancel.is_cancelled() {
        log::warn!("Interrupted, writing what was collected so far");
    } else {
        cancel.cancel();
    }
    if let Err(e) = listener.await {
        log::debug!("Signal listener ended abnormally: {e}");
    }

    let summary = result.summary;
    log::info!(
        "Crawl done: {} cached, {} fetched, {} failed, {} skipped",
        summary.cached,
        summary.fetched,
        summary.failed,
        summary.cancelled
    );

    let collator = CzechCollator::new()?;
    let catalog = Catalog::assemble(dedupe(result.offers), &collator);
    log::info!("🏪 Markets: {}", catalog.aggregates.market_stats());

    write_csv_file(&config.paths.output_csv, &catalog.entries, &config.site)?;
    Feed::build_now(&catalog, &config.site).write_file(&config.paths.output_json)?;

    log::info!(
        "🍀 Scraping finished {} unique items in {:.1}s",
        catalog.len(),
        start.elapsed().as_secs_f64()
    );

    Ok(RunReport {
        summary,
        unique: catalog.len(),
    })
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use koopi_crawl::progress::null_progress;
    use koopi_scraper::ScrapeError;

    use super::*;

    const LISTING: &str = include_str!("../../scraper/fixtures/listing.html");

    /// Serves the listing fixture for every URL.
    #[derive(Clone, Default)]
    struct FixtureSite {
        requests: Arc<AtomicUsize>,
    }

    impl PageSource for FixtureSite {
        async fn get(&self, _url: &str) -> Result<Vec<u8>, ScrapeError> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            Ok(LISTING.as_bytes().to_vec())
        }
    }

    fn config(dir: &Path, queries: &str) -> CrawlConfig {
        let input = dir.join("scrape.csv");
        std::fs::write(&input, queries).unwrap();

        let mut config = CrawlConfig::default();
        config.paths.input = input;
        config.paths.html_cache = dir.join("cache");
        config.paths.image_cache = dir.join("images");
        config.paths.output_csv = dir.join("koopi.csv");
        config.paths.output_json = dir.join("koopi.json");
        config.paths.lock_file = dir.join("koopi.lock");
        config.limits.delay_min_ms = 0;
        config.limits.delay_max_ms = 0;
        config.limits.prefetch_images = false;
        config
    }

    #[tokio::test]
    async fn crawls_dedupes_and_writes_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), "Mléčné,jogurt,2\n");
        let site = FixtureSite::default();

        let report = run_with_source(&config, site.clone(), null_progress())
            .await
            .unwrap();
        assert_eq!(report.summary.fetched, 2);
        assert_eq!(report.unique, 6);
        assert_eq!(site.requests.load(Ordering::SeqCst), 2);

        let csv = std::fs::read_to_string(&config.paths.output_csv).unwrap();
        assert_eq!(csv.lines().count(), 7);
        assert!(csv.starts_with("Name;Price;PricePerUnit;"));

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&config.paths.output_json).unwrap())
                .unwrap();
        assert_eq!(json["count"], 6);
        assert_eq!(
            json["markets"],
            serde_json::json!(["Albert", "Billa", "Kaufland", "Lidl", "Penny", "Tesco"])
        );
        let names: Vec<_> = json["goods"]
            .as_array()
            .unwrap()
            .iter()
            .map(|g| g["name"].as_str().unwrap().to_owned())
            .collect();
        assert_eq!(names.first().map(String::as_str), Some("Jogurt bílý Madeta"));
        assert_eq!(names.last().map(String::as_str), Some("Pivo Plzeň 12°"));
    }

    #[tokio::test]
    async fn second_run_makes_no_requests_and_writes_identical_csv() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), "Mléčné,jogurt,1\nPivo,pivo,1\n");

        run_with_source(&config, FixtureSite::default(), null_progress())
            .await
            .unwrap();
        let first_csv = std::fs::read(&config.paths.output_csv).unwrap();

        let site = FixtureSite::default();
        let report = run_with_source(&config, site.clone(), null_progress())
            .await
            .unwrap();
        assert_eq!(report.summary.cached, 2);
        assert_eq!(site.requests.load(Ordering::SeqCst), 0);
        assert_eq!(std::fs::read(&config.paths.output_csv).unwrap(), first_csv);
    }

    #[tokio::test]
    async fn empty_query_list_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), "");

        let report = run_with_source(&config, FixtureSite::default(), null_progress())
            .await
            .unwrap();
        assert_eq!(report, RunReport::default());
        assert!(!config.paths.output_csv.exists());
        assert!(!config.paths.output_json.exists());
    }

    #[tokio::test]
    async fn malformed_query_list_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), "Mléčné,jogurt,hodně\n");

        let result = run_with_source(&config, FixtureSite::default(), null_progress()).await;
        assert!(result.is_err());
        assert!(!config.paths.output_csv.exists());
    }
}
