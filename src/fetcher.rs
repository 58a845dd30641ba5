use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use tracing::debug;

use crate::config::Settings;
use crate::error::{PipelineError, Result};

const USER_AGENT: &str = "Mozilla/5.0 (compatible; chronicle/0.1)";

/// HTTP page fetcher shared by all workers. A token-bucket limiter spaces
/// outbound requests by the configured minimum interval across the whole
/// pool, before every request, success or failure alike. Redirects follow
/// the client default; retry policy belongs to the caller.
pub struct Fetcher {
    client: reqwest::Client,
    limiter: Option<DefaultDirectRateLimiter>,
}

impl Fetcher {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(settings.fetch_timeout_secs))
            .build()?;
        let limiter = Quota::with_period(Duration::from_millis(settings.min_request_interval_ms))
            .map(RateLimiter::direct);
        Ok(Fetcher { client, limiter })
    }

    /// Fetch a page as text. Non-2xx statuses surface as errors annotated
    /// with the status and URL.
    pub async fn fetch(&self, url: &str) -> Result<String> {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
        debug!("GET {}", url);
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response.text().await?)
    }
}
