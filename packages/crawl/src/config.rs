//! Crawl configuration.
//!
//! Every field has a built-in default, so a configuration file only needs
//! to name the values it overrides:
//!
//! ```toml
//! [paths]
//! input = "queries.csv"
//!
//! [limits]
//! max_tasks = 50
//! delay_min_ms = 1000
//! ```
//!
//! The extraction rule table defaults to the one embedded in
//! `koopi_scraper`; a `[rules]` table replaces it wholesale.

use std::path::{Path, PathBuf};
use std::time::Duration;

use koopi_offer_models::SiteConfig;
use koopi_scraper::rules::Rules;
use serde::{Deserialize, Serialize};

/// Errors from loading or validating a configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read config {path}: {source}")]
    Io {
        /// Path of the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for [`CrawlConfig`].
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Filesystem locations used by a crawl.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Query list (`category,query,pages` rows, no header).
    pub input: PathBuf,
    /// Directory of cached listing pages.
    pub html_cache: PathBuf,
    /// Directory of cached product thumbnails.
    pub image_cache: PathBuf,
    /// Semicolon-delimited offer table.
    pub output_csv: PathBuf,
    /// JSON offer feed.
    pub output_json: PathBuf,
    /// PID lock file.
    pub lock_file: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("scrape.csv"),
            html_cache: PathBuf::from("../cache"),
            image_cache: PathBuf::from("../images"),
            output_csv: PathBuf::from("koopi.csv"),
            output_json: PathBuf::from("koopi.json"),
            lock_file: PathBuf::from("/tmp/koopi.lock"),
        }
    }
}

/// Throughput and politeness limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Work list cap applied after shuffling.
    pub max_tasks: usize,
    /// Upper bound on simultaneous network fetches.
    pub concurrency: usize,
    /// Size of the politeness token pool.
    pub politeness_tokens: usize,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Lower bound of the post-request delay in milliseconds.
    pub delay_min_ms: u64,
    /// Upper bound (inclusive) of the post-request delay in milliseconds.
    pub delay_max_ms: u64,
    /// Age in seconds after which a lock file is considered abandoned.
    pub lock_stale_secs: u64,
    /// Download product thumbnails into the image cache.
    pub prefetch_images: bool,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_tasks: 500,
            concurrency: 3,
            politeness_tokens: 2,
            request_timeout_secs: 10,
            delay_min_ms: 7_000,
            delay_max_ms: 27_000,
            lock_stale_secs: 3_600,
            prefetch_images: true,
        }
    }
}

impl LimitsConfig {
    /// Per-request timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Lock staleness threshold.
    #[must_use]
    pub const fn lock_stale_after(&self) -> Duration {
        Duration::from_secs(self.lock_stale_secs)
    }

    /// Bounds of the randomized politeness delay.
    #[must_use]
    pub const fn delay_bounds(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.delay_min_ms),
            Duration::from_millis(self.delay_max_ms),
        )
    }
}

/// Complete configuration of one crawl.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlConfig {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default = "Rules::embedded")]
    pub rules: Rules,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            paths: PathsConfig::default(),
            limits: LimitsConfig::default(),
            site: SiteConfig::default(),
            rules: Rules::embedded(),
        }
    }
}

impl CrawlConfig {
    /// Parses and validates a configuration from TOML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on malformed TOML and
    /// [`ConfigError::Invalid`] if a limit is out of range.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the configuration at `path`, or the defaults when `path` is
    /// `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("Loaded config from {}", path.display());

        Self::from_toml_str(&contents)
    }

    /// Checks the limits for values that would stall or break a crawl.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let limits = &self.limits;
        if limits.concurrency == 0 {
            return Err(ConfigError::Invalid(
                "limits.concurrency must be at least 1".to_owned(),
            ));
        }
        if limits.politeness_tokens == 0 {
            return Err(ConfigError::Invalid(
                "limits.politeness_tokens must be at least 1".to_owned(),
            ));
        }
        if limits.delay_min_ms > limits.delay_max_ms {
            return Err(ConfigError::Invalid(format!(
                "limits.delay_min_ms ({}) exceeds limits.delay_max_ms ({})",
                limits.delay_min_ms, limits.delay_max_ms
            )));
        }
        if limits.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "limits.request_timeout_secs must be at least 1".to_owned(),
            ));
        }
        Ok(())
    }
}
