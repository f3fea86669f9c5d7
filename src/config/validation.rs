use crate::config::types::{Config, HttpConfig, OutputConfig, ScrapeConfig, SiteConfig, SiteKind};
use crate::ConfigError;
use scraper::Selector;
use url::Url;

/// Longest accepted wait between retries (10 minutes)
const MAX_RETRY_DELAY_MS: u64 = 600_000;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_http_config(&config.http)?;
    validate_scrape_config(&config.scrape)?;
    validate_output_config(&config.output)?;

    match (&config.scrape.site, &config.site) {
        (SiteKind::Configurable, None) => {
            return Err(ConfigError::Validation(
                "site = \"configurable\" requires a [site] section".to_string(),
            ))
        }
        (_, Some(site)) => validate_site_config(site)?,
        (SiteKind::MobileBg, None) => {}
    }

    Ok(())
}

/// Validates HTTP configuration
fn validate_http_config(config: &HttpConfig) -> Result<(), ConfigError> {
    if config.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.connect_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "connect-timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.max_delay_ms > MAX_RETRY_DELAY_MS {
        return Err(ConfigError::Validation(format!(
            "max-delay-ms ({}) must be <= {}",
            config.max_delay_ms, MAX_RETRY_DELAY_MS
        )));
    }

    if config.max_delay_ms < config.base_delay_ms {
        return Err(ConfigError::Validation(format!(
            "max-delay-ms ({}) must be >= base-delay-ms ({})",
            config.max_delay_ms, config.base_delay_ms
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_scrape_config(config: &ScrapeConfig) -> Result<(), ConfigError> {
    if config.max_pages == 0 {
        return Err(ConfigError::Validation(
            "max-pages must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates a selector-driven site description
fn validate_site_config(site: &SiteConfig) -> Result<(), ConfigError> {
    if site.name.trim().is_empty() {
        return Err(ConfigError::Validation(
            "site name cannot be empty".to_string(),
        ));
    }

    let base = Url::parse(&site.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url '{}': {}", site.base_url, e)))?;

    if !matches!(base.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl(format!(
            "base-url '{}' must use http or https",
            site.base_url
        )));
    }

    if !site.search_path.starts_with('/') {
        return Err(ConfigError::Validation(format!(
            "search-path must start with '/', got '{}'",
            site.search_path
        )));
    }

    if site.page_param.trim().is_empty() {
        return Err(ConfigError::Validation(
            "page-param cannot be empty".to_string(),
        ));
    }

    if site.per_page == Some(0) {
        return Err(ConfigError::Validation(
            "per-page must be >= 1".to_string(),
        ));
    }

    if site.currency.trim().is_empty() {
        return Err(ConfigError::Validation(
            "currency cannot be empty".to_string(),
        ));
    }

    for (key, selector) in site.selectors.entries() {
        Selector::parse(selector).map_err(|e| ConfigError::InvalidSelector {
            selector: format!("{} = {}", key, selector),
            message: e.to_string(),
        })?;
    }

    Ok(())
}
