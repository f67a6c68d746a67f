//! Cache-aside page fetching.
//!
//! A task is first served from the HTML cache. Only on a miss does it
//! take a concurrency slot and a politeness token, fetch the page, store
//! the body verbatim, and extract it. Once a request has been issued it
//! runs to completion or timeout; cancellation only takes effect at the
//! waits around it.

use std::collections::BTreeSet;

use koopi_offer_models::{FetchTask, Offer};
use koopi_scraper::listing::Extractor;
use koopi_scraper::{PageSource, ScrapeError};

use crate::cache::{HtmlCache, ImageCache, Prefetch};
use crate::scheduler::Scheduler;

/// How a task ended.
#[derive(Debug)]
pub enum FetchOutcome {
    /// Served from the HTML cache without any network request.
    Cached(Vec<Offer>),
    /// Fetched from the site and stored in the cache.
    Fetched(Vec<Offer>),
    /// Shut down before the request was issued.
    Cancelled,
    /// The request, status, or extraction failed.
    Failed(ScrapeError),
}

/// Serves tasks from the HTML cache, falling back to a [`PageSource`].
#[derive(Debug)]
pub struct CacheAsideFetcher<S> {
    source: S,
    extractor: Extractor,
    html_cache: HtmlCache,
    image_cache: Option<ImageCache>,
}

impl<S: PageSource> CacheAsideFetcher<S> {
    #[must_use]
    pub const fn new(source: S, extractor: Extractor, html_cache: HtmlCache) -> Self {
        Self {
            source,
            extractor,
            html_cache,
            image_cache: None,
        }
    }

    /// Enables thumbnail prefetching into `cache`.
    #[must_use]
    pub fn with_image_cache(mut self, cache: ImageCache) -> Self {
        self.image_cache = Some(cache);
        self
    }

    /// The underlying page source.
    #[must_use]
    pub const fn source(&self) -> &S {
        &self.source
    }

    /// Runs one task to completion.
    pub async fn fetch(&self, task: &FetchTask, scheduler: &Scheduler) -> FetchOutcome {
        if let Some(offers) = self.from_cache(task).await {
            self.prefetch_images(task, &offers, scheduler).await;
            return FetchOutcome::Cached(offers);
        }

        let outcome = self.from_network(task, scheduler).await;
        if let FetchOutcome::Fetched(offers) = &outcome {
            self.prefetch_images(task, offers, scheduler).await;
        }
        outcome
    }

    /// Extracts the cached page, if there is a readable and parseable one.
    async fn from_cache(&self, task: &FetchTask) -> Option<Vec<Offer>> {
        let body = match self.html_cache.load(&task.cache_key).await {
            Ok(Some(body)) => body,
            Ok(None) => return None,
            Err(e) => {
                log::warn!("[{}] unreadable cache file {}: {e}", task.query, task.cache_key);
                return None;
            }
        };

        match self.extractor.extract(&body, &task.category, &task.query) {
            Ok(offers) => Some(offers),
            Err(e) => {
                log::warn!("[{}] unparseable cache file {}: {e}", task.query, task.cache_key);
                None
            }
        }
    }

    async fn from_network(&self, task: &FetchTask, scheduler: &Scheduler) -> FetchOutcome {
        let Some(_slot) = scheduler.acquire_slot().await else {
            return FetchOutcome::Cancelled;
        };
        let Some(token) = scheduler.acquire_token().await else {
            return FetchOutcome::Cancelled;
        };

        log::info!("🔎 [{}] scrape {}", task.query, task.url);
        let response = self.source.get(&task.url).await;

        if !token.release().await {
            log::info!("[{}] politeness delay interrupted by shutdown", task.query);
        }

        let body = match response {
            Ok(body) => body,
            Err(e) => return FetchOutcome::Failed(e),
        };

        if let Err(e) = self.html_cache.store(&task.cache_key, &body).await {
            log::warn!("[{}] failed to cache {}: {e}", task.query, task.cache_key);
        }

        match self.extractor.extract(&body, &task.category, &task.query) {
            Ok(offers) => FetchOutcome::Fetched(offers),
            Err(e) => FetchOutcome::Failed(e),
        }
    }

    /// Downloads missing thumbnails. Failures are logged and skipped.
    async fn prefetch_images(&self, task: &FetchTask, offers: &[Offer], scheduler: &Scheduler) {
        let Some(cache) = &self.image_cache else {
            return;
        };

        let urls: BTreeSet<&str> = offers
            .iter()
            .map(|o| o.image_url.as_str())
            .filter(|url| !url.is_empty())
            .collect();

        for url in urls {
            if scheduler.is_cancelled() {
                return;
            }
            match cache.prefetch(&self.source, url).await {
                Ok(Prefetch::Downloaded) => {
                    log::debug!("[{}] downloaded image {url}", task.query);
                }
                Ok(Prefetch::Present | Prefetch::Skipped) => {}
                Err(e) => log::warn!("[{}] image {url} failed: {e}", task.query),
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use koopi_offer_models::SiteConfig;
    use koopi_scraper::rules::Rules;
    use tokio_util::sync::CancellationToken;

    use super::*;

    pub const LISTING: &str = r#"
        <div class="group_discounts">
          <div class="product_image"><a href="/sleva/jogurt"><img data-src="/kupi/thumbs/jogurt.jpg"></a></div>
          <div class="product_name"><h2><a href="/sleva/jogurt">Jogurt bílý</a></h2></div>
          <div class="discount_row">
            <div class="discounts_shop_name"><a href="/obchod/albert"><span>Albert</span></a></div>
            <div class="discount_price_value">9,90 Kč</div>
          </div>
        </div>"#;

    /// Serves [`LISTING`] for every page and counts listing requests.
    #[derive(Default)]
    pub struct FakeSite {
        pub page_requests: AtomicUsize,
        pub image_requests: AtomicUsize,
        pub fail_urls: Mutex<Vec<String>>,
    }

    impl FakeSite {
        pub fn pages(&self) -> usize {
            self.page_requests.load(Ordering::SeqCst)
        }
    }

    impl PageSource for FakeSite {
        async fn get(&self, url: &str) -> Result<Vec<u8>, ScrapeError> {
            if url.contains("/thumbs/") {
                self.image_requests.fetch_add(1, Ordering::SeqCst);
                return Ok(b"img".to_vec());
            }
            self.page_requests.fetch_add(1, Ordering::SeqCst);
            if self.fail_urls.lock().unwrap().iter().any(|u| u == url) {
                return Err(ScrapeError::Parse(format!("boom: {url}")));
            }
            Ok(LISTING.as_bytes().to_vec())
        }
    }

    pub fn task(query: &str, page: u32) -> FetchTask {
        let site = SiteConfig::default();
        FetchTask {
            url: crate::worklist::page_url(&site, query, page),
            cache_key: crate::worklist::cache_key(query, page),
            category: "Mléčné".to_owned(),
            query: query.to_owned(),
        }
    }

    pub fn fetcher(source: FakeSite, cache_dir: &std::path::Path) -> CacheAsideFetcher<FakeSite> {
        CacheAsideFetcher::new(
            source,
            Extractor::new(Rules::embedded(), SiteConfig::default()),
            HtmlCache::new(cache_dir),
        )
    }

    pub fn scheduler() -> Scheduler {
        Scheduler::new(
            3,
            2,
            (Duration::from_millis(10), Duration::from_millis(20)),
            CancellationToken::new(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn miss_fetches_and_stores_then_hit_skips_network() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = fetcher(FakeSite::default(), dir.path());
        let scheduler = scheduler();
        let task = task("jogurt", 1);

        let first = fetcher.fetch(&task, &scheduler).await;
        assert!(matches!(&first, FetchOutcome::Fetched(offers) if offers.len() == 1));
        assert!(dir.path().join("jogurt-1.html").exists());

        let second = fetcher.fetch(&task, &scheduler).await;
        assert!(matches!(&second, FetchOutcome::Cached(offers) if offers.len() == 1));
        assert_eq!(fetcher.source().pages(), 1);
    }

    #[tokio::test]
    async fn cache_hit_ignores_cancellation_and_limits() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("jogurt-1.html"), LISTING).unwrap();
        let fetcher = fetcher(FakeSite::default(), dir.path());
        let scheduler = scheduler();
        scheduler.cancel_token().cancel();

        let outcome = fetcher.fetch(&task("jogurt", 1), &scheduler).await;
        assert!(matches!(outcome, FetchOutcome::Cached(_)));
        assert_eq!(fetcher.source().pages(), 0);
    }

    #[tokio::test]
    async fn cancelled_miss_issues_no_request() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = fetcher(FakeSite::default(), dir.path());
        let scheduler = scheduler();
        scheduler.cancel_token().cancel();

        let outcome = fetcher.fetch(&task("jogurt", 1), &scheduler).await;
        assert!(matches!(outcome, FetchOutcome::Cancelled));
        assert_eq!(fetcher.source().pages(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_request_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let site = FakeSite::default();
        let task = task("jogurt", 1);
        site.fail_urls.lock().unwrap().push(task.url.clone());
        let fetcher = fetcher(site, dir.path());

        let outcome = fetcher.fetch(&task, &scheduler()).await;
        assert!(matches!(outcome, FetchOutcome::Failed(_)));
        assert!(!dir.path().join("jogurt-1.html").exists());
    }

    #[tokio::test(start_paused = true)]
    async fn prefetches_thumbnails_once() {
        let dir = tempfile::tempdir().unwrap();
        let images = dir.path().join("images");
        let fetcher = fetcher(FakeSite::default(), &dir.path().join("cache"))
            .with_image_cache(ImageCache::new(&images));
        let scheduler = scheduler();

        fetcher.fetch(&task("jogurt", 1), &scheduler).await;
        fetcher.fetch(&task("jogurt", 1), &scheduler).await;

        assert!(images.join("jogurt.jpg").exists());
        assert_eq!(fetcher.source().image_requests.load(Ordering::SeqCst), 1);
    }

    /// Triggers shutdown while its own request is in flight.
    struct CancelDuringRequest {
        cancel: CancellationToken,
        requests: AtomicUsize,
    }

    impl PageSource for CancelDuringRequest {
        async fn get(&self, _url: &str) -> Result<Vec<u8>, ScrapeError> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            self.cancel.cancel();
            Ok(LISTING.as_bytes().to_vec())
        }
    }

    #[tokio::test]
    async fn request_in_flight_at_shutdown_completes_and_is_cached() {
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancellationToken::new();
        let scheduler = Scheduler::new(
            3,
            2,
            (Duration::from_secs(3_600), Duration::from_secs(3_600)),
            cancel.clone(),
        );
        let fetcher = CacheAsideFetcher::new(
            CancelDuringRequest {
                cancel,
                requests: AtomicUsize::new(0),
            },
            Extractor::new(Rules::embedded(), SiteConfig::default()),
            HtmlCache::new(dir.path()),
        );

        let outcome = fetcher.fetch(&task("jogurt", 1), &scheduler).await;
        assert!(matches!(&outcome, FetchOutcome::Fetched(offers) if offers.len() == 1));
        assert!(scheduler.is_cancelled());
        assert_eq!(fetcher.source().requests.load(Ordering::SeqCst), 1);
        assert!(dir.path().join("jogurt-1.html").exists());
        assert_eq!(scheduler.available_tokens(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn garbage_cache_file_is_refetched() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("jogurt-1.html"), [0xff, 0xfe]).unwrap();
        let fetcher = fetcher(FakeSite::default(), dir.path());

        let outcome = fetcher.fetch(&task("jogurt", 1), &scheduler()).await;
        assert!(matches!(outcome, FetchOutcome::Fetched(_)));
        assert_eq!(fetcher.source().pages(), 1);
    }
}
