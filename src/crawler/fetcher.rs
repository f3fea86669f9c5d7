//! HTTP fetcher implementation
//!
//! This module handles every page request a scrape makes:
//! - Building the HTTP client with browser-like headers and timeouts
//! - A single-attempt transport seam (real `reqwest` or a test double)
//! - Status and error classification
//! - Bounded retry with exponential backoff and jitter

use crate::config::HttpConfig;
use crate::ScrapeError;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

/// Raw outcome of one successful HTTP exchange, whatever its status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    /// HTTP status code
    pub status: u16,
    /// Response body
    pub body: String,
}

/// Network-level failure kinds for a single attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Connect or read timeout
    Timeout,
    /// Connection refused or reset
    Connect,
    /// The request could not be built (bad URL, bad header)
    Request,
    /// Anything else, including body read failures
    Other,
}

/// Error from a single transport attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Transient errors are retried, request errors are not
    pub fn is_transient(&self) -> bool {
        !matches!(self.kind, TransportErrorKind::Request)
    }
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

/// One GET request, no retries
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str) -> Result<FetchedPage, TransportError>;
}

/// Suspends between retry attempts
///
/// Injected so retry timing can be observed without waiting.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeper backed by the tokio timer
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Builds an HTTP client with proper configuration
///
/// The header set mimics a desktop browser so trivial bot filters let the
/// request through. It is fixed configuration, never computed per request.
///
/// # Arguments
///
/// * `config` - The HTTP configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &HttpConfig) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_static("en-US,en;q=0.9,bg;q=0.8,de;q=0.7"),
    );
    headers.insert("DNT", HeaderValue::from_static("1"));
    headers.insert("Upgrade-Insecure-Requests", HeaderValue::from_static("1"));

    Client::builder()
        .user_agent(config.user_agent.clone())
        .default_headers(headers)
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .https_only(config.https_only)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Transport backed by a pooled `reqwest` client
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &str) -> Result<FetchedPage, TransportError> {
        let response = self.client.get(url).send().await.map_err(classify_error)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(classify_error)?;
        Ok(FetchedPage { status, body })
    }
}

fn classify_error(e: reqwest::Error) -> TransportError {
    let kind = if e.is_timeout() {
        TransportErrorKind::Timeout
    } else if e.is_connect() {
        TransportErrorKind::Connect
    } else if e.is_builder() {
        TransportErrorKind::Request
    } else {
        TransportErrorKind::Other
    };
    TransportError::new(kind, e.to_string())
}

/// How a response status is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Success,
    /// 5xx, 408 and 429; retried
    Transient,
    /// 404 and 410; terminal
    NotFound,
    /// Any other non-success status; terminal
    Client,
}

/// Classifies an HTTP status code
///
/// | Status | Class |
/// |--------|-------|
/// | 2xx | Success |
/// | 404, 410 | NotFound |
/// | 408, 429, 5xx | Transient |
/// | other | Client |
pub fn classify_status(status: u16) -> StatusClass {
    match status {
        200..=299 => StatusClass::Success,
        404 | 410 => StatusClass::NotFound,
        408 | 429 | 500..=599 => StatusClass::Transient,
        _ => StatusClass::Client,
    }
}

/// Bounded retry with exponential backoff
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Upper bound for any single delay before jitter
    pub max_delay: Duration,
    /// Scale each delay by a random factor in [0.5, 1.5)
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(16_000),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &HttpConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            jitter: config.jitter,
        }
    }

    /// Delay before retry number `retry` (1-based)
    ///
    /// `base * 2^(retry - 1)`, capped at `max_delay`, then jittered.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(31);
        let capped = self
            .base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay);

        if self.jitter {
            let factor = 0.5 + fastrand::f64();
            Duration::try_from_secs_f64(capped.as_secs_f64() * factor).unwrap_or(capped)
        } else {
            capped
        }
    }
}

/// Page fetcher: one transport plus the retry policy around it
pub struct Fetcher {
    transport: Arc<dyn Transport>,
    sleeper: Arc<dyn Sleeper>,
    policy: RetryPolicy,
}

impl Fetcher {
    pub fn new(transport: Arc<dyn Transport>, sleeper: Arc<dyn Sleeper>, policy: RetryPolicy) -> Self {
        Self {
            transport,
            sleeper,
            policy,
        }
    }

    /// Builds the production fetcher from configuration
    pub fn from_config(config: &HttpConfig) -> Result<Self, ScrapeError> {
        let client = build_http_client(config)?;
        Ok(Self::new(
            Arc::new(ReqwestTransport::new(client)),
            Arc::new(TokioSleeper),
            RetryPolicy::from_config(config),
        ))
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Pauses through the injected sleeper
    pub async fn pause(&self, duration: Duration) {
        self.sleeper.sleep(duration).await;
    }

    /// Fetches a URL with retry logic
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | 2xx | Return body |
    /// | HTTP 404 / 410 | Immediate `PageNotFound` |
    /// | Other 4xx (except 408, 429) | Immediate `Client` |
    /// | 5xx, 408, 429 | Retry with backoff |
    /// | Timeout, connection error | Retry with backoff |
    /// | Request build error | Immediate `Fetch` |
    ///
    /// After `max_retries` retries the last status or error is reported as
    /// `ScrapeError::Fetch`.
    pub async fn fetch(&self, url: &str) -> Result<FetchedPage, ScrapeError> {
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            tracing::debug!("Fetching {} (attempt {})", url, attempt);

            let failure = match self.transport.get(url).await {
                Ok(page) => match classify_status(page.status) {
                    StatusClass::Success => return Ok(page),
                    StatusClass::NotFound => {
                        return Err(ScrapeError::PageNotFound {
                            url: url.to_string(),
                        })
                    }
                    StatusClass::Client => {
                        return Err(ScrapeError::Client {
                            url: url.to_string(),
                            status: page.status,
                        })
                    }
                    StatusClass::Transient => format!("HTTP {}", page.status),
                },
                Err(e) if e.is_transient() => e.to_string(),
                Err(e) => {
                    return Err(ScrapeError::Fetch {
                        url: url.to_string(),
                        reason: e.to_string(),
                    })
                }
            };

            if attempt > self.policy.max_retries {
                return Err(ScrapeError::Fetch {
                    url: url.to_string(),
                    reason: failure,
                });
            }

            let delay = self.policy.delay_for(attempt);
            tracing::warn!(
                "Attempt {} for {} failed ({}), retrying in {:?}",
                attempt,
                url,
                failure,
                delay
            );
            self.sleeper.sleep(delay).await;
        }
    }
}
