use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::header::{CONTENT_TYPE, RETRY_AFTER};
use reqwest::{RequestBuilder, Response};
use tokio::sync::Mutex;
use tokio::time::sleep;

use crate::error::{AcquireError, Result};

/// Connection settings shared by every backend talking HTTP.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub user_agent: String,
    pub min_interval: Duration,
    pub max_retries: u32,
    pub timeout: Duration,
    /// `http://`, `https://` or `socks5://` proxy URL applied to all requests.
    pub proxy: Option<String>,
}

impl HttpSettings {
    pub fn from_config(config: &refharvest_core::AcquisitionConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            min_interval: Duration::from_millis(config.request_interval_ms),
            max_retries: config.max_retries,
            timeout: Duration::from_secs(config.request_timeout_secs),
            proxy: config.proxy.clone(),
        }
    }
}

/// A response body together with its declared media type.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

impl Fetched {
    pub fn is_pdf(&self) -> bool {
        self.bytes.starts_with(b"%PDF")
            || self
                .content_type
                .as_deref()
                .is_some_and(|ct| ct.contains("application/pdf"))
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

// ─── RateLimitedClient ────────────────────────────────────────────────────────

pub struct RateLimitedClient {
    client: reqwest::Client,
    min_interval: Duration,
    last_request: Arc<Mutex<Option<Instant>>>,
    max_retries: u32,
}

impl RateLimitedClient {
    pub fn new(settings: &HttpSettings) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .user_agent(settings.user_agent.as_str())
            .gzip(true)
            .timeout(settings.timeout);

        if let Some(proxy_url) = settings.proxy.as_deref() {
            let proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| AcquireError::InvalidProxy(proxy_url.to_string(), e.to_string()))?;
            builder = builder.proxy(proxy);
        }

        Ok(Self {
            client: builder.build()?,
            min_interval: settings.min_interval,
            last_request: Arc::new(Mutex::new(None)),
            max_retries: settings.max_retries,
        })
    }

    async fn wait_for_rate_limit(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(t) = *last {
            let elapsed = t.elapsed();
            if elapsed < self.min_interval {
                sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    pub async fn get(&self, url: &str) -> Result<Fetched> {
        self.send_with_retry(url, || self.client.get(url)).await
    }

    pub async fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<Fetched> {
        self.send_with_retry(url, || self.client.post(url).form(form))
            .await
    }

    async fn send_with_retry<F>(&self, url: &str, build: F) -> Result<Fetched>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempt = 0u32;
        loop {
            self.wait_for_rate_limit().await;
            match build().send().await {
                Ok(r) if r.status() == 429 => {
                    let wait = retry_after_secs(&r).unwrap_or(60);
                    if attempt >= self.max_retries {
                        return Err(AcquireError::RateLimit(url.to_string(), wait));
                    }
                    sleep(Duration::from_secs(wait)).await;
                    attempt += 1;
                }
                Ok(r) if !r.status().is_success() => {
                    let status = r.status().as_u16();
                    return Err(AcquireError::ApiError(
                        url.to_string(),
                        format!("HTTP {status}"),
                    ));
                }
                Ok(r) => {
                    let content_type = r
                        .headers()
                        .get(CONTENT_TYPE)
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    let bytes = r.bytes().await?.to_vec();
                    return Ok(Fetched {
                        bytes,
                        content_type,
                    });
                }
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(AcquireError::Http(e));
                    }
                    let backoff = 2u64.pow(attempt);
                    sleep(Duration::from_secs(backoff)).await;
                    attempt += 1;
                }
            }
        }
    }
}

fn retry_after_secs(response: &Response) -> Option<u64> {
    response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok())
}
