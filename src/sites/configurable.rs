//! Selector-driven marketplace
//!
//! Describes a site entirely through configuration: a search path that takes
//! the filters as query parameters, and CSS selectors for the listing cards.

use crate::config::{SelectorConfig, SiteConfig};
use crate::model::{CarRecord, EngineType, FilterConfig, FilterField, GearboxType};
use crate::sites::extract::{
    absolutize, extract_number, extract_price_or, select_text, split_title, year_in,
};
use crate::sites::{Marketplace, ParsedPage};
use crate::{ConfigError, Result, ScrapeError};
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Compiled selectors for one site
struct Selectors {
    results: Selector,
    listing: Selector,
    title: Selector,
    link: Selector,
    price: Selector,
    year: Selector,
    mileage: Selector,
    engine: Selector,
    gearbox: Selector,
    location: Selector,
    seller: Selector,
    pagination: Selector,
    next: Selector,
}

fn compile(key: &str, css: &str) -> std::result::Result<Selector, ConfigError> {
    Selector::parse(css).map_err(|e| ConfigError::InvalidSelector {
        selector: format!("{} = {}", key, css),
        message: e.to_string(),
    })
}

impl Selectors {
    fn compile(config: &SelectorConfig) -> std::result::Result<Self, ConfigError> {
        Ok(Self {
            results: compile("results", &config.results)?,
            listing: compile("listing", &config.listing)?,
            title: compile("title", &config.title)?,
            link: compile("link", &config.link)?,
            price: compile("price", &config.price)?,
            year: compile("year", &config.year)?,
            mileage: compile("mileage", &config.mileage)?,
            engine: compile("engine", &config.engine)?,
            gearbox: compile("gearbox", &config.gearbox)?,
            location: compile("location", &config.location)?,
            seller: compile("seller", &config.seller)?,
            pagination: compile("pagination", &config.pagination)?,
            next: compile("next", &config.next)?,
        })
    }
}

/// A marketplace described by a `[site]` configuration section
pub struct ConfigurableSite {
    name: String,
    search_url: Url,
    page_param: String,
    per_page: Option<usize>,
    currency: String,
    selectors: Selectors,
}

impl ConfigurableSite {
    /// Compiles the site description
    ///
    /// # Returns
    ///
    /// * `Ok(ConfigurableSite)` - Ready to build URLs and parse pages
    /// * `Err(ConfigError)` - The base URL or a selector is invalid
    pub fn new(config: &SiteConfig) -> std::result::Result<Self, ConfigError> {
        let base = Url::parse(&config.base_url).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid base-url '{}': {}", config.base_url, e))
        })?;
        let search_url = base.join(&config.search_path).map_err(|e| {
            ConfigError::InvalidUrl(format!(
                "Invalid search-path '{}': {}",
                config.search_path, e
            ))
        })?;

        Ok(Self {
            name: config.name.clone(),
            search_url,
            page_param: config.page_param.clone(),
            per_page: config.per_page,
            currency: config.currency.clone(),
            selectors: Selectors::compile(&config.selectors)?,
        })
    }

    fn parse_listing(&self, listing: ElementRef<'_>) -> Option<CarRecord> {
        let s = &self.selectors;

        let title = select_text(listing, &s.title)?;
        let href = match listing.value().name() {
            "a" => listing.value().attr("href"),
            _ => listing
                .select(&s.link)
                .next()
                .and_then(|link| link.value().attr("href")),
        };
        let url = absolutize(href?, &self.search_url)?;

        let mut record = CarRecord::new(title, url);
        record.source_site = Some(self.name.clone());
        (record.brand, record.model) = split_title(&record.title);
        record.price = select_text(listing, &s.price)
            .and_then(|text| extract_price_or(&text, &self.currency));
        record.year = select_text(listing, &s.year).and_then(|text| year_in(&text));
        record.mileage_km = select_text(listing, &s.mileage)
            .and_then(|text| extract_number(&text))
            .and_then(|km| u32::try_from(km).ok());
        record.engine_type =
            select_text(listing, &s.engine).and_then(|text| EngineType::from_label(&text));
        record.gearbox_type =
            select_text(listing, &s.gearbox).and_then(|text| GearboxType::from_label(&text));
        record.raw_location = select_text(listing, &s.location);
        record.seller_info = select_text(listing, &s.seller);

        Some(record)
    }
}

impl Marketplace for ConfigurableSite {
    fn name(&self) -> &str {
        &self.name
    }

    fn build_page_url(&self, filters: &FilterConfig, page: u32) -> Result<String> {
        if page == 0 {
            return Err(ScrapeError::InvalidFilter(
                "page numbers start at 1".to_string(),
            ));
        }

        let brand = filters.brand.trim();
        let model = filters.model.trim();
        if brand.is_empty() || model.is_empty() {
            return Err(ScrapeError::InvalidFilter(
                "brand and model are required".to_string(),
            ));
        }

        let mut url = self.search_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("brand", brand);
            query.append_pair("model", model);

            if let Some(year) = filters.year_start {
                query.append_pair("year_start", &year.to_string());
            }
            if let Some(price) = filters.price_max {
                query.append_pair("price_max", &price.to_string());
            }
            if let Some(km) = filters.km_max {
                query.append_pair("km_max", &km.to_string());
            }
            if let Some(engine) = filters.engine_type {
                query.append_pair("engine_type", engine.as_str());
            }
            if let Some(gearbox) = filters.gearbox_type {
                query.append_pair("gearbox_type", gearbox.as_str());
            }
            if page > 1 {
                query.append_pair(&self.page_param, &page.to_string());
            }
        }

        tracing::debug!("Built {} search URL: {}", self.name, url);
        Ok(url.to_string())
    }

    fn parse_page(&self, body: &str) -> Result<ParsedPage> {
        let document = Html::parse_document(body);
        let s = &self.selectors;

        let listings: Vec<ElementRef<'_>> = document.select(&s.listing).collect();
        if listings.is_empty() && document.select(&s.results).next().is_none() {
            return Err(ScrapeError::Parse {
                reason: format!("no listings and no results container on {} page", self.name),
            });
        }

        let mut records = Vec::with_capacity(listings.len());
        for listing in &listings {
            match self.parse_listing(*listing) {
                Some(record) if record.is_valid() => records.push(record),
                _ => tracing::debug!("Dropping {} listing without title or link", self.name),
            }
        }

        // The next control is authoritative whenever a pagination block exists
        let has_next_page = match document.select(&s.pagination).next() {
            Some(pagination) => pagination.select(&s.next).next().is_some(),
            None => match self.per_page {
                Some(per_page) => listings.len() >= per_page,
                None => document.select(&s.next).next().is_some(),
            },
        };

        Ok(ParsedPage {
            records,
            has_next_page,
        })
    }

    fn local_filters(&self) -> &[FilterField] {
        &[]
    }
}
