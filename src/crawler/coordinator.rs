//! Scrape coordinator - pagination orchestration
//!
//! This module contains the page loop that drives one scrape run:
//! - Building the URL for page N and fetching it through the retrying fetcher
//! - Parsing the page and accumulating deduplicated records
//! - Deciding whether to continue (page cap, exhaustion, failure, cancellation)
//! - Applying the filters the site could not apply server-side

use crate::crawler::fetcher::Fetcher;
use crate::model::{CarRecord, FilterConfig};
use crate::sites::Marketplace;
use crate::{Result, ScrapeError};
use std::collections::HashSet;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Why pagination ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// `max_pages` pages were fetched
    PageCap,
    /// The last page reported no further pages
    Exhausted,
    /// A page after the first failed; earlier pages were kept
    PageFailed { page: u32, reason: String },
    /// Cancelled at a page boundary
    Cancelled,
}

/// Result of a run that produced output
#[derive(Debug, Clone)]
pub struct ScrapeOutcome {
    /// Deduplicated, post-filtered records
    pub records: Vec<CarRecord>,
    pub pages_fetched: u32,
    pub stop_reason: StopReason,
    /// Pages that failed after retries (at most one, since a failure stops the run)
    pub failed_pages: u32,
}

impl ScrapeOutcome {
    /// True when pagination stopped early because of a page failure
    pub fn is_partial(&self) -> bool {
        matches!(self.stop_reason, StopReason::PageFailed { .. })
    }
}

/// Progress snapshot passed to the reporting hook after each page
#[derive(Debug, Clone)]
pub struct PageProgress {
    pub page: u32,
    pub url: String,
    pub page_records: usize,
    pub total_records: usize,
}

/// Caller-supplied progress callback
pub type ProgressHook = Box<dyn Fn(&PageProgress) + Send + Sync>;

/// Main scrape coordinator structure
///
/// Owns the fetcher (and with it the pooled HTTP client) for exactly one run;
/// [`Coordinator::run`] consumes it, so the client is released on every exit
/// path.
pub struct Coordinator {
    marketplace: Box<dyn Marketplace>,
    fetcher: Fetcher,
    cancel: CancellationToken,
    page_delay: Duration,
    progress: Option<ProgressHook>,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `marketplace` - The site to scrape
    /// * `fetcher` - The retrying page fetcher
    pub fn new(marketplace: Box<dyn Marketplace>, fetcher: Fetcher) -> Self {
        Self {
            marketplace,
            fetcher,
            cancel: CancellationToken::new(),
            page_delay: Duration::ZERO,
            progress: None,
        }
    }

    /// Uses an externally owned cancellation token
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Pause between consecutive page requests
    pub fn with_page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = delay;
        self
    }

    /// Registers a progress callback, invoked after each parsed page
    pub fn on_progress(mut self, hook: ProgressHook) -> Self {
        self.progress = Some(hook);
        self
    }

    /// Runs the page loop
    ///
    /// Pages are requested strictly in order; page `p` is parsed and merged
    /// before page `p + 1` is requested. Cancellation is observed only at page
    /// boundaries, so an in-flight fetch completes (or times out) first.
    ///
    /// # Returns
    ///
    /// * `Ok(ScrapeOutcome)` - Records collected until the cap, exhaustion,
    ///   cancellation or a failure after the first page
    /// * `Err(ScrapeError)` - Invalid filters, or the first page failed
    pub async fn run(self, filters: &FilterConfig) -> Result<ScrapeOutcome> {
        filters.validate()?;

        tracing::info!(
            "Starting {} scrape for {} (max {} pages)",
            self.marketplace.name(),
            filters.describe(),
            filters.max_pages
        );

        let mut records: Vec<CarRecord> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut pages_fetched = 0;
        let mut failed_pages = 0;
        let mut page: u32 = 1;

        let stop_reason = loop {
            if page > filters.max_pages {
                break StopReason::PageCap;
            }
            if self.cancel.is_cancelled() {
                break StopReason::Cancelled;
            }

            let url = self.marketplace.build_page_url(filters, page)?;
            tracing::debug!("Requesting page {}: {}", page, url);

            let parsed = match self.fetch_and_parse(&url).await {
                Ok(parsed) => parsed,
                Err(e) if e.is_page_failure() => {
                    failed_pages += 1;
                    if page == 1 {
                        return Err(e);
                    }
                    tracing::warn!(
                        "Page {} failed, returning {} records from {} earlier pages: {}",
                        page,
                        records.len(),
                        pages_fetched,
                        e
                    );
                    break StopReason::PageFailed {
                        page,
                        reason: e.to_string(),
                    };
                }
                Err(e) => return Err(e),
            };
            pages_fetched += 1;

            let page_records = parsed.records.len();
            for mut record in parsed.records {
                if seen.insert(record.url.clone()) {
                    record
                        .source_site
                        .get_or_insert_with(|| self.marketplace.name().to_string());
                    records.push(record);
                }
            }

            tracing::info!(
                "Page {} fetched: {} listings, {} records so far",
                page,
                page_records,
                records.len()
            );
            if let Some(hook) = &self.progress {
                hook(&PageProgress {
                    page,
                    url,
                    page_records,
                    total_records: records.len(),
                });
            }

            if !parsed.has_next_page {
                break StopReason::Exhausted;
            }

            if page < filters.max_pages && !self.page_delay.is_zero() {
                tokio::select! {
                    _ = self.fetcher.pause(self.page_delay) => {}
                    _ = self.cancel.cancelled() => {}
                }
            }
            page += 1;
        };

        let before = records.len();
        let local = self.marketplace.local_filters();
        if !local.is_empty() {
            records.retain(|record| filters.matches(record, local));
        }
        if records.len() < before {
            tracing::debug!(
                "Local filters removed {} of {} records",
                before - records.len(),
                before
            );
        }

        tracing::info!(
            "Scrape finished after {} pages ({:?}): {} records",
            pages_fetched,
            stop_reason,
            records.len()
        );

        Ok(ScrapeOutcome {
            records,
            pages_fetched,
            stop_reason,
            failed_pages,
        })
    }

    async fn fetch_and_parse(&self, url: &str) -> Result<crate::sites::ParsedPage> {
        let page = self.fetcher.fetch(url).await?;
        self.marketplace.parse_page(&page.body).map_err(|e| match e {
            ScrapeError::Parse { reason } => ScrapeError::Parse {
                reason: format!("{} ({})", reason, url),
            },
            other => other,
        })
    }
}
