//! Crawler module for page fetching and pagination
//!
//! This module contains the core scraping logic, including:
//! - HTTP fetching with retry, backoff and status classification
//! - The page loop that accumulates listings across result pages

mod coordinator;
mod fetcher;

pub use coordinator::{Coordinator, PageProgress, ProgressHook, ScrapeOutcome, StopReason};
pub use fetcher::{
    build_http_client, classify_status, FetchedPage, Fetcher, ReqwestTransport, RetryPolicy,
    Sleeper, StatusClass, TokioSleeper, Transport, TransportError, TransportErrorKind,
};

use crate::config::Config;
use crate::model::FilterConfig;
use crate::sites::build_marketplace;
use crate::Result;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Runs a complete scrape with production components
///
/// Builds the marketplace and fetcher from `config` and drives the page loop
/// until the cap, exhaustion, cancellation or a page failure.
///
/// # Arguments
///
/// * `config` - Loaded configuration
/// * `filters` - The search to run
/// * `cancel` - Token observed at every page boundary
///
/// # Returns
///
/// * `Ok(ScrapeOutcome)` - Records collected by the run
/// * `Err(ScrapeError)` - Invalid filters, or the first page failed
pub async fn scrape(
    config: &Config,
    filters: &FilterConfig,
    cancel: CancellationToken,
) -> Result<ScrapeOutcome> {
    let marketplace = build_marketplace(config)?;
    let fetcher = Fetcher::from_config(&config.http)?;

    Coordinator::new(marketplace, fetcher)
        .with_cancellation(cancel)
        .with_page_delay(Duration::from_millis(config.scrape.page_delay_ms))
        .run(filters)
        .await
}
