use crate::core::config::HttpConfig;
use crate::core::error::{ReportError, Result};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = "cadfolio/1.0";

/// Retries an async operation with configurable attempts and delays
///
/// # Parameters
/// - `operation`: Closure returning a future
/// - `retries`: Number of retry attempts (total runs = 1 initial + retries)
/// - `delay_ms`: Milliseconds between retry attempts
///
/// # Returns
/// Either the successful result or the error after all attempts. Client
/// errors (4xx) are returned at once, since repeating the request cannot fix
/// them.
pub async fn with_retry<F, Fut, T>(
    mut operation: F,
    retries: u32,
    delay_ms: u64,
) -> std::result::Result<T, reqwest::Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, reqwest::Error>>,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(val) => return Ok(val),
            Err(err) => {
                if attempt > retries || !is_retryable(&err) {
                    return Err(err);
                }
                debug!(
                    "Attempt {}/{} failed: {}. Retrying...",
                    attempt, retries, err
                );
                attempt += 1;
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}

fn is_retryable(err: &reqwest::Error) -> bool {
    err.status().is_none_or(|status| status.is_server_error())
}

/// A reqwest client with the configured timeout and retry policy.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    retries: u32,
    retry_delay_ms: u64,
}

impl HttpClient {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            client,
            retries: config.retries,
            retry_delay_ms: config.retry_delay_ms,
        })
    }

    /// GETs `url` and returns the body of a successful response.
    pub async fn get_text(&self, provider: &str, url: &str) -> Result<String> {
        debug!(provider, url, "HTTP GET");
        with_retry(
            || {
                let request = self.client.get(url);
                async move { request.send().await?.error_for_status()?.text().await }
            },
            self.retries,
            self.retry_delay_ms,
        )
        .await
        .map_err(|e| ReportError::remote(provider, e.without_url().to_string()))
    }
}
