//! Configuration module for Cardeals
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use cardeals::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("cardeals.toml")).unwrap();
//! println!("Scraper will fetch at most {} pages", config.scrape.max_pages);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, HttpConfig, OutputConfig, ScrapeConfig, SelectorConfig, SiteConfig, SiteKind,
    DEFAULT_USER_AGENT,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
pub use validation::validate;
