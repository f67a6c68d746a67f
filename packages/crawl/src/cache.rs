//! On-disk caches for listing pages and product thumbnails.
//!
//! Both caches are flat directories. A listing page is stored verbatim
//! under its task's cache key and never expires; pruning old files is left
//! to external housekeeping. Thumbnails are stored under the base name of
//! their URL and downloaded at most once.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use koopi_scraper::{PageSource, ScrapeError};

/// Creates `dir` and its parents if missing.
///
/// Concurrent callers racing to create the same directory all succeed.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub async fn ensure_dir(dir: &Path) -> std::io::Result<()> {
    tokio::fs::create_dir_all(dir).await
}

/// Cache of raw listing pages keyed by task cache key.
#[derive(Debug, Clone)]
pub struct HtmlCache {
    dir: PathBuf,
}

impl HtmlCache {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the cached page for `key`.
    #[must_use]
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    /// Returns the cached body for `key`, or `None` if nothing is cached.
    ///
    /// # Errors
    ///
    /// Returns an error if a cached file exists but cannot be read.
    pub async fn load(&self, key: &str) -> std::io::Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.path_for(key)).await {
            Ok(body) => Ok(Some(body)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Stores `body` verbatim under `key`.
    ///
    /// The body goes to a uniquely named sibling first and is renamed into
    /// place, so a concurrent [`load`](Self::load) sees either no file or
    /// the whole page.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache directory or file cannot be written.
    pub async fn store(&self, key: &str, body: &[u8]) -> std::io::Result<()> {
        ensure_dir(&self.dir).await?;
        let tmp = self
            .dir
            .join(format!(".{key}.{:016x}.tmp", rand::random::<u64>()));
        if let Err(e) = tokio::fs::write(&tmp, body).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e);
        }
        if let Err(e) = tokio::fs::rename(&tmp, self.path_for(key)).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e);
        }
        Ok(())
    }
}

/// Result of a thumbnail prefetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prefetch {
    /// A file with the same base name was already cached.
    Present,
    /// The image was downloaded and stored.
    Downloaded,
    /// The URL has no usable base name.
    Skipped,
}

/// Cache of product thumbnails keyed by URL base name.
#[derive(Debug, Clone)]
pub struct ImageCache {
    dir: PathBuf,
}

impl ImageCache {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Base name of an image URL, ignoring any query string or fragment.
    #[must_use]
    pub fn file_name(url: &str) -> Option<&str> {
        let path = url.split(['?', '#']).next().unwrap_or_default();
        path.rsplit('/')
            .next()
            .filter(|name| !name.is_empty() && *name != "." && *name != "..")
    }

    /// Downloads `url` through `source` unless a file with its base name
    /// is already cached.
    ///
    /// # Errors
    ///
    /// Returns an error if the download fails or the file cannot be
    /// written.
    pub async fn prefetch<S: PageSource>(&self, source: &S, url: &str) -> Result<Prefetch, ScrapeError> {
        let Some(name) = Self::file_name(url) else {
            return Ok(Prefetch::Skipped);
        };

        let path = self.dir.join(name);
        if tokio::fs::try_exists(&path).await? {
            return Ok(Prefetch::Present);
        }

        let body = source.get(url).await?;
        ensure_dir(&self.dir).await?;
        tokio::fs::write(&path, body).await?;
        log::debug!("Cached image {}", path.display());

        Ok(Prefetch::Downloaded)
    }
}
