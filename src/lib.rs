//! Cardeals: a car-listings scraper
//!
//! This crate queries a car marketplace with a set of search filters, walks the
//! paginated results, extracts every listing into a normalized [`CarRecord`] and
//! hands the collected set back to the caller.

pub mod config;
pub mod crawler;
pub mod model;
pub mod output;
pub mod sites;
pub mod storage;

use thiserror::Error;

/// Main error type for scrape operations
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("Fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("Page not found: {url}")]
    PageNotFound { url: String },

    #[error("Client error {status} for {url}")]
    Client { url: String, status: u16 },

    #[error("Unrecognized listings page: {reason}")]
    Parse { reason: String },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ScrapeError {
    /// Returns true for the page-level failures that end pagination
    ///
    /// Beyond the first page these degrade a run to partial results instead of
    /// aborting it.
    pub fn is_page_failure(&self) -> bool {
        matches!(
            self,
            Self::Fetch { .. } | Self::PageNotFound { .. } | Self::Client { .. } | Self::Parse { .. }
        )
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid CSS selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },
}

/// Result type alias for scrape operations
pub type Result<T> = std::result::Result<T, ScrapeError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Coordinator, ScrapeOutcome, StopReason};
pub use model::{CarRecord, EngineType, FilterConfig, GearboxType, Price};
pub use sites::{build_marketplace, Marketplace, ParsedPage};
