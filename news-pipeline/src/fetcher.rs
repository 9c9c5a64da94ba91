use crate::types::{FetcherConfig, PipelineError, Result};
use backoff::{backoff::Backoff, exponential::ExponentialBackoff};
use reqwest::{Client, Response};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use url::Url;

/// HTTP transport for feed documents: retries with exponential backoff and
/// keeps a minimum spacing between requests to the same host.
pub struct Fetcher {
    client: Client,
    config: FetcherConfig,
    next_slot: Arc<RwLock<HashMap<String, Instant>>>,
}

impl Fetcher {
    pub fn new(config: FetcherConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()?;

        Ok(Self {
            client,
            config,
            next_slot: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }

    /// Download a feed document and return its body.
    pub async fn fetch_feed(&self, url: &str) -> Result<String> {
        let start_time = Instant::now();
        debug!("Fetching feed: {}", url);

        self.apply_rate_limit(url).await?;

        let mut backoff: ExponentialBackoff<backoff::SystemClock> = ExponentialBackoff {
            current_interval: Duration::from_secs(self.config.retry_delay_seconds),
            initial_interval: Duration::from_secs(self.config.retry_delay_seconds),
            max_interval: Duration::from_secs(self.config.retry_delay_seconds * 32),
            multiplier: 2.0,
            max_elapsed_time: Some(Duration::from_secs(self.config.retry_delay_seconds * 60)),
            ..Default::default()
        };

        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            match self.send(url).await {
                Ok(response) => {
                    let status = response.status();

                    if !status.is_success() {
                        last_error = Some(PipelineError::SourceFetch {
                            name: url.to_string(),
                            message: format!(
                                "HTTP {}: {}",
                                status.as_u16(),
                                status.canonical_reason().unwrap_or("Unknown")
                            ),
                        });
                        // Client errors will not fix themselves
                        if status.is_client_error() && status != reqwest::StatusCode::TOO_MANY_REQUESTS {
                            break;
                        }
                    } else {
                        self.check_size(response.content_length())?;

                        match response.text().await {
                            Ok(content) => {
                                self.check_size(Some(content.len() as u64))?;
                                info!(
                                    "Fetched feed: {} ({} bytes in {}ms)",
                                    url,
                                    content.len(),
                                    start_time.elapsed().as_millis()
                                );
                                return Ok(content);
                            }
                            Err(e) => last_error = Some(PipelineError::Http(e)),
                        }
                    }
                }
                Err(e) => last_error = Some(e),
            }

            if attempt < self.config.max_retries {
                if let Some(delay) = backoff.next_backoff() {
                    warn!("Attempt {} failed for {}, retrying in {:?}", attempt + 1, url, delay);
                    tokio::time::sleep(delay).await;
                    continue;
                }
            }
            break;
        }

        error!("Failed to fetch feed after {} attempts: {}", self.config.max_retries + 1, url);
        Err(last_error.unwrap_or_else(|| PipelineError::SourceFetch {
            name: url.to_string(),
            message: "unknown fetch error".to_string(),
        }))
    }

    async fn send(&self, url: &str) -> Result<Response> {
        let response = self.client.get(url).send().await?;
        Ok(response)
    }

    fn check_size(&self, length: Option<u64>) -> Result<()> {
        if let Some(length) = length {
            let limit = (self.config.max_feed_size_mb as u64) * 1024 * 1024;
            if length > limit {
                return Err(PipelineError::Parse(format!(
                    "Feed too large: {} bytes (limit {}MB)",
                    length, self.config.max_feed_size_mb
                )));
            }
        }
        Ok(())
    }

    /// Reserve the next request slot for the host, then wait for it outside the lock.
    async fn apply_rate_limit(&self, url: &str) -> Result<()> {
        let host = Url::parse(url)?.host_str().unwrap_or("").to_string();
        let min_interval = Duration::from_millis(self.config.per_host_interval_ms);
        let now = Instant::now();

        let slot = {
            let mut slots = self.next_slot.write().await;
            let slot = match slots.get(&host) {
                Some(next) if *next > now => *next,
                _ => now,
            };
            slots.insert(host.clone(), slot + min_interval);
            slot
        };

        if slot > now {
            let wait_time = slot - now;
            debug!("Rate limiting {}: waiting {:?}", host, wait_time);
            tokio::time::sleep(wait_time).await;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick_config() -> FetcherConfig {
        FetcherConfig {
            max_retries: 0,
            retry_delay_seconds: 0,
            per_host_interval_ms: 0,
            timeout_seconds: 2,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn rejects_unparseable_url() {
        let fetcher = Fetcher::new(quick_config()).unwrap();
        let result = fetcher.fetch_feed("not a url").await;
        assert!(matches!(result, Err(PipelineError::InvalidUrl(_))));
    }

    #[test]
    fn size_check_uses_megabyte_limit() {
        let fetcher = Fetcher::new(FetcherConfig {
            max_feed_size_mb: 1,
            ..quick_config()
        })
        .unwrap();
        assert!(fetcher.check_size(Some(1024 * 1024)).is_ok());
        assert!(fetcher.check_size(Some(1024 * 1024 + 1)).is_err());
        assert!(fetcher.check_size(None).is_ok());
    }
}
