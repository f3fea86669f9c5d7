//! Marketplace adapters
//!
//! A [`Marketplace`] knows how to turn a [`FilterConfig`] into search URLs for
//! one site and how to read that site's listings pages. The orchestrator only
//! talks to this trait, so adding a site means adding one implementation.

mod configurable;
pub mod extract;
mod mobile_bg;

pub use configurable::ConfigurableSite;
pub use mobile_bg::MobileBg;

use crate::config::{Config, SiteKind};
use crate::model::{CarRecord, FilterConfig, FilterField};
use crate::{ConfigError, Result};

/// Result of parsing one listings page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedPage {
    /// Valid listings in page order
    pub records: Vec<CarRecord>,

    /// Whether the page indicates a further results page
    pub has_next_page: bool,
}

/// Capability set of a car marketplace
pub trait Marketplace: Send + Sync {
    /// Short site name, stored as `source_site` on records
    fn name(&self) -> &str;

    /// Builds the absolute search URL for a 1-based page number
    ///
    /// Deterministic: the same filters and page always yield the same URL.
    /// Every user-supplied value is percent-encoded.
    ///
    /// # Returns
    ///
    /// * `Ok(String)` - The search URL
    /// * `Err(ScrapeError::InvalidFilter)` - The filters cannot be expressed
    fn build_page_url(&self, filters: &FilterConfig, page: u32) -> Result<String>;

    /// Parses a listings page body
    ///
    /// A recognizable page with zero listings is a normal result. A body that
    /// is not a listings page at all yields `ScrapeError::Parse`. Individual
    /// listings that lack a title or URL are dropped.
    fn parse_page(&self, body: &str) -> Result<ParsedPage>;

    /// Filters this site cannot apply exactly and must be re-checked locally
    fn local_filters(&self) -> &[FilterField];
}

/// Creates the marketplace selected by the configuration
pub fn build_marketplace(config: &Config) -> Result<Box<dyn Marketplace>> {
    match config.scrape.site {
        SiteKind::MobileBg => Ok(Box::new(MobileBg::new())),
        SiteKind::Configurable => {
            let site = config.site.as_ref().ok_or_else(|| {
                ConfigError::Validation(
                    "site = \"configurable\" requires a [site] section".to_string(),
                )
            })?;
            Ok(Box::new(ConfigurableSite::new(site)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SelectorConfig, SiteConfig};

    #[test]
    fn test_build_default_marketplace() {
        let market = build_marketplace(&Config::default()).unwrap();
        assert_eq!(market.name(), "mobile.bg");
    }

    #[test]
    fn test_build_configurable_marketplace() {
        let mut config = Config::default();
        config.scrape.site = SiteKind::Configurable;
        assert!(build_marketplace(&config).is_err());

        config.site = Some(SiteConfig {
            name: "autos.example".to_string(),
            base_url: "https://autos.example.com".to_string(),
            search_path: "/search".to_string(),
            page_param: "page".to_string(),
            per_page: None,
            currency: "EUR".to_string(),
            selectors: SelectorConfig::default(),
        });
        let market = build_marketplace(&config).unwrap();
        assert_eq!(market.name(), "autos.example");
        assert!(market.local_filters().is_empty());
    }
}
