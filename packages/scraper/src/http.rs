//! reqwest-backed [`PageSource`].
//!
//! Every request carries a fixed per-request timeout and a `User-Agent`
//! header. The user agent is chosen once per run from [`USER_AGENTS`] so the
//! crawl does not announce itself with the reqwest default.

use std::time::Duration;

use rand::seq::IndexedRandom as _;

use crate::{PageSource, ScrapeError};

/// Browser signatures the crawler rotates between runs.
pub const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Linux; Android 10; K) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/143.0.0.0 Mobile Safari/537.36",
    "Mozilla/5.0 (Linux; Android 11; CPH2251) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/116.0.0.0 Mobile Safari/537.36",
    "Mozilla/5.0 (Linux; Android 12; SM-A525F) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/117.0.0.0 Mobile Safari/537.36",
    "Mozilla/5.0 (Linux; Android 13; SM-G991U) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/117.0.0.0 Mobile Safari/537.36",
    "Mozilla/5.0 (Linux; Android 14; Pixel 8 Pro) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Mobile Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/128.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.6045.159 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/94.0.4606.81 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/143.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.6167.85 Safari/537.36",
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:120.0.1) Gecko/20100101 Firefox/120.0.1",
    "Mozilla/5.0 (iPad; CPU OS 17_0_3 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0.1 Mobile/15E148 Safari/604.1",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 16_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) FxiOS/118.0 Mobile/15E148 Safari/605.1.15",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0_3 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0.1 Mobile/15E148 Safari/604.1",
];

/// Picks a random entry from [`USER_AGENTS`].
#[must_use]
pub fn random_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or(USER_AGENTS[0])
}

/// [`PageSource`] that issues real HTTP GET requests.
#[derive(Debug, Clone)]
pub struct HttpPageSource {
    client: reqwest::Client,
    user_agent: String,
}

impl HttpPageSource {
    /// Builds a client that sends `user_agent` on every request and gives up
    /// on any request after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError`] if the user agent is not a valid header value
    /// or the TLS backend cannot be initialised.
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, ScrapeError> {
        let mut header_map = reqwest::header::HeaderMap::new();
        let val = reqwest::header::HeaderValue::from_str(user_agent).map_err(|e| {
            ScrapeError::Parse(format!("invalid user agent '{user_agent}': {e}"))
        })?;
        header_map.insert(reqwest::header::USER_AGENT, val);

        let client = reqwest::Client::builder()
            .default_headers(header_map)
            .timeout(timeout)
            .build()
            .map_err(ScrapeError::Http)?;

        Ok(Self {
            client,
            user_agent: user_agent.to_owned(),
        })
    }

    /// Returns the user agent this source sends.
    #[must_use]
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }
}

impl PageSource for HttpPageSource {
    async fn get(&self, url: &str) -> Result<Vec<u8>, ScrapeError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::Status {
                url: url.to_owned(),
                status,
            });
        }

        let bytes = response.bytes().await?;
        log::debug!("Downloaded {} bytes from {url}", bytes.len());
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_user_agent_comes_from_the_list() {
        let ua = random_user_agent();
        assert!(USER_AGENTS.contains(&ua));
    }

    #[test]
    fn rejects_user_agent_with_newline() {
        let result = HttpPageSource::new("bad\nagent", Duration::from_secs(1));
        assert!(matches!(result, Err(ScrapeError::Parse(_))));
    }

    #[test]
    fn keeps_configured_user_agent() {
        let source = HttpPageSource::new(USER_AGENTS[0], Duration::from_secs(1)).unwrap();
        assert_eq!(source.user_agent(), USER_AGENTS[0]);
    }
}
