use std::time::Duration;

use pmcscope_core::FetchConfig;
use rand::seq::SliceRandom;
use reqwest::header::{HeaderMap, USER_AGENT};
use tokio::time::sleep;
use tracing::debug;

use crate::error::{HarvestError, Result};

/// Browser identities rotated per request so repeated fetches do not present
/// a uniform signature upstream.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/134.0.6825.76 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 13_5) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.7 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/140.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:120.0) Gecko/20100101 Firefox/120.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 13_6_2) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/135.0.0.0 Safari/537.36",
];

/// Statuses treated as transient and retried with backoff.
const TRANSIENT_STATUSES: &[u16] = &[429, 500, 502, 503, 504];

// ─── RetryingClient ───────────────────────────────────────────────────────────

pub struct RetryingClient {
    client: reqwest::Client,
    max_retries: u32,
    base_delay: Duration,
}

impl RetryingClient {
    pub fn new(max_retries: u32, base_delay: Duration, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .gzip(true)
            .build()
            .expect("failed to build reqwest client");
        Self {
            client,
            max_retries,
            base_delay,
        }
    }

    pub fn from_config(config: &FetchConfig) -> Self {
        Self::new(
            config.max_retries,
            Duration::from_millis(config.base_delay_ms),
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn random_user_agent() -> &'static str {
        USER_AGENTS
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(USER_AGENTS[0])
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt)
    }

    pub async fn get(&self, url: &str) -> Result<String> {
        self.get_with_headers(url, HeaderMap::new()).await
    }

    pub async fn get_with_headers(&self, url: &str, headers: HeaderMap) -> Result<String> {
        let mut attempt = 0u32;
        loop {
            let resp = self
                .client
                .get(url)
                .header(USER_AGENT, Self::random_user_agent())
                .headers(headers.clone())
                .send()
                .await;

            match resp {
                Ok(r) if TRANSIENT_STATUSES.contains(&r.status().as_u16()) => {
                    let status = r.status().as_u16();
                    if attempt >= self.max_retries {
                        return Err(HarvestError::Status {
                            url: url.to_string(),
                            status,
                        });
                    }
                    debug!(url, status, attempt, "transient status, backing off");
                    sleep(self.backoff(attempt)).await;
                    attempt += 1;
                }
                Ok(r) if !r.status().is_success() => {
                    return Err(HarvestError::Status {
                        url: url.to_string(),
                        status: r.status().as_u16(),
                    });
                }
                Ok(r) => return r.text().await.map_err(HarvestError::Http),
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(HarvestError::Http(e));
                    }
                    debug!(url, attempt, "connection error, backing off: {e}");
                    sleep(self.backoff(attempt)).await;
                    attempt += 1;
                }
            }
        }
    }
}

impl Default for RetryingClient {
    fn default() -> Self {
        Self::from_config(&FetchConfig::default())
    }
}
