use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use tokio_retry::RetryIf;
use tokio_retry::strategy::ExponentialBackoff;
use tracing::{debug, warn};
use url::Url;

use super::forms::{FormMethod, FormSubmission};
use crate::config::ScraperConfig;
use crate::error::ScrapeError;

/// A fetched document and the URL it was served from.
#[derive(Debug, Clone)]
pub struct Page {
    pub url: Url,
    pub body: String,
}

/// Swappable network layer.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &Url) -> Result<Page, ScrapeError>;
    async fn submit(&self, form: &FormSubmission) -> Result<Page, ScrapeError>;
}

pub struct HttpClient {
    inner: reqwest::Client,
    max_retries: usize,
    retry_backoff_ms: u64,
}

impl HttpClient {
    pub fn new(config: &ScraperConfig) -> Result<Self, ScrapeError> {
        let inner = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            // Portals keep lookup state in session cookies
            .cookie_store(true)
            .build()
            .map_err(|e| ScrapeError::Client(e.to_string()))?;

        Ok(Self {
            inner,
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
        })
    }

    /// 500ms, 1s, 2s… for the default backoff, capped at `max_retries` attempts.
    fn backoff(&self) -> impl Iterator<Item = Duration> + use<> {
        ExponentialBackoff::from_millis(2)
            .factor(self.retry_backoff_ms / 2)
            .take(self.max_retries)
    }

    async fn send_once(
        &self,
        form: Option<&FormSubmission>,
        url: &Url,
    ) -> Result<Page, ScrapeError> {
        let request = match form {
            Some(f) if f.method == FormMethod::Post => self
                .inner
                .post(url.clone())
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(f.encoded_body()),
            _ => self.inner.get(url.clone()),
        };

        let resp = request.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ScrapeError::Status {
                url: url.to_string(),
                status,
            });
        }

        let final_url = resp.url().clone();
        let body = resp.text().await?;
        Ok(Page {
            url: final_url,
            body,
        })
    }

    async fn send(&self, form: Option<&FormSubmission>, url: &Url) -> Result<Page, ScrapeError> {
        let mut attempt = 0u32;
        RetryIf::start(
            self.backoff(),
            move || {
                attempt += 1;
                debug!("{} {} (attempt {})", method_label(form), url, attempt);
                self.send_once(form, url)
            },
            |e: &ScrapeError| {
                let retry = e.is_transient();
                if retry {
                    warn!("Transient failure on {}: {}", url, e);
                }
                retry
            },
        )
        .await
    }
}

fn method_label(form: Option<&FormSubmission>) -> &'static str {
    match form.map(|f| f.method) {
        Some(FormMethod::Post) => "POST",
        _ => "GET",
    }
}

#[async_trait]
impl Transport for HttpClient {
    async fn get(&self, url: &Url) -> Result<Page, ScrapeError> {
        self.send(None, url).await
    }

    async fn submit(&self, form: &FormSubmission) -> Result<Page, ScrapeError> {
        let url = form.request_url();
        self.send(Some(form), &url).await
    }
}
