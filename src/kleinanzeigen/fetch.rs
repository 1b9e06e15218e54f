use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::config::Settings;

/// How a page retrieval failed, after the fetcher has done all it will do.
/// Either variant means an early stop for the owning search, never for the run.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network trouble, rate limiting or a server error, retries exhausted
    #[error("transient failure for {url}: {reason}")]
    Transient { url: String, reason: String },
    /// The target itself is bad; retrying cannot help
    #[error("permanent failure for {url}: HTTP {status}")]
    Permanent { url: String, status: StatusCode },
}

#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub timeout: Duration,
    /// Minimum pause between two requests, shared across all searches
    pub request_delay: Duration,
    /// Total attempts per page, first try included
    pub max_retries: u32,
    pub user_agent: String,
}

impl FetcherConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            timeout: Duration::from_secs(settings.timeout_secs),
            request_delay: Duration::from_millis(settings.request_delay_ms),
            max_retries: settings.max_retries,
            user_agent: settings.user_agent.clone(),
        }
    }
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

/// Retrieves result pages with bounded retries and polite pacing
pub struct PageFetcher {
    client: Client,
    config: FetcherConfig,
    last_request: Mutex<Option<Instant>>,
}

impl PageFetcher {
    pub fn new(config: FetcherConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("de-DE,de;q=0.9"));

        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            config,
            last_request: Mutex::new(None),
        })
    }

    /// Fetch one result page as raw HTML.
    ///
    /// Timeouts, connection errors, 429 and 5xx are retried with
    /// exponential backoff and jitter, honoring Retry-After when present.
    /// Any other non-success status is permanent and reported immediately.
    pub async fn fetch_page(&self, url: &str) -> Result<String, FetchError> {
        let mut last_reason = String::new();

        for attempt in 1..=self.config.max_retries {
            self.pace().await;
            debug!("GET {} (attempt {}/{})", url, attempt, self.config.max_retries);

            match self.client.get(url).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let body = match response.text().await {
                            Ok(body) => body,
                            Err(e) => {
                                last_reason = format!("failed to read body: {}", e);
                                warn!("Attempt {} for {}: {}", attempt, url, last_reason);
                                if attempt < self.config.max_retries {
                                    sleep(backoff_delay(attempt)).await;
                                }
                                continue;
                            }
                        };
                        return Ok(body);
                    }

                    if !is_retryable(status) {
                        return Err(FetchError::Permanent {
                            url: url.to_string(),
                            status,
                        });
                    }

                    last_reason = format!("HTTP {}", status);
                    warn!("Attempt {} for {}: {}", attempt, url, last_reason);
                    if attempt < self.config.max_retries {
                        let mut delay = backoff_delay(attempt);
                        if let Some(retry_after) = parse_retry_after(response.headers()) {
                            delay = delay.max(retry_after);
                        }
                        sleep(delay).await;
                    }
                }
                Err(e) => {
                    last_reason = e.to_string();
                    warn!("Attempt {} for {}: {}", attempt, url, last_reason);
                    if attempt < self.config.max_retries {
                        sleep(backoff_delay(attempt)).await;
                    }
                }
            }
        }

        Err(FetchError::Transient {
            url: url.to_string(),
            reason: last_reason,
        })
    }

    /// Keep at least `request_delay` between request starts, across all
    /// callers sharing this fetcher.
    async fn pace(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.config.request_delay {
                sleep(self.config.request_delay - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

fn is_retryable(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::REQUEST_TIMEOUT
            | StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

/// 1s, 2s, 4s, ... plus up to 250ms of jitter
fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(2_u64.pow(attempt.saturating_sub(1)))
        + Duration::from_millis(fastrand::u64(0..=250))
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// The cookie-consent and anti-bot walls come back as 200s. Checked by the
/// pagination loop when a page yields no cards, so an interstitial is not
/// mistaken for the end of the results.
pub fn looks_like_consent(body: &str) -> bool {
    let t = body.to_lowercase();
    (t.contains("einwilligung") && t.contains("cookies"))
        || (t.contains("cloudflare") && t.contains("attention required"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetcher_builds_from_default_settings() {
        let fetcher = PageFetcher::new(FetcherConfig::default());
        assert!(fetcher.is_ok());
    }

    #[test]
    fn server_errors_and_rate_limits_are_retryable() {
        assert!(is_retryable(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(is_retryable(StatusCode::SERVICE_UNAVAILABLE));
        assert!(is_retryable(StatusCode::GATEWAY_TIMEOUT));
    }

    #[test]
    fn client_errors_are_not_retryable() {
        assert!(!is_retryable(StatusCode::NOT_FOUND));
        assert!(!is_retryable(StatusCode::GONE));
        assert!(!is_retryable(StatusCode::FORBIDDEN));
    }

    #[test]
    fn backoff_doubles_with_bounded_jitter() {
        for (attempt, base_secs) in [(1u32, 1u64), (2, 2), (3, 4)] {
            let delay = backoff_delay(attempt);
            assert!(delay >= Duration::from_secs(base_secs));
            assert!(delay < Duration::from_secs(base_secs) + Duration::from_millis(251));
        }
    }

    #[test]
    fn retry_after_parses_integer_seconds() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("7"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(7)));

        let empty = HeaderMap::new();
        assert_eq!(parse_retry_after(&empty), None);
    }

    #[test]
    fn consent_wall_is_detected() {
        assert!(looks_like_consent(
            "<html>Ihre Einwilligung zu Cookies und Daten</html>"
        ));
        assert!(looks_like_consent(
            "<title>Attention Required! | Cloudflare</title>"
        ));
        assert!(!looks_like_consent(
            "<html><article class=\"aditem\"></article></html>"
        ));
    }
}
