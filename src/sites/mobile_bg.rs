//! mobile.bg adapter
//!
//! Searches are expressed in the URL path
//! (`/obiavi/avtomobili-dzhipove/{brand}/{model}/{engine}/{gearbox}/ot-{year}/namira-se-v-balgariya`)
//! with only the price bound in the query string. Pages after the first insert
//! `/p-{n}` at the end of the path.

use crate::model::{CarRecord, EngineType, FilterConfig, FilterField, GearboxType};
use crate::sites::extract::{
    absolutize, clean_text, element_text, extract_number, extract_price, select_text,
    split_title, year_in,
};
use crate::sites::{Marketplace, ParsedPage};
use crate::{Result, ScrapeError};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use url::Url;

const DEFAULT_BASE_URL: &str = "https://www.mobile.bg";

/// Listings per full results page
const LISTINGS_PER_PAGE: usize = 20;

/// Multiplier used for the `price1` query bound. It over-approximates the
/// real BGN/EUR rate so the site never drops a matching listing; the exact
/// EUR limit is re-checked locally.
const PRICE_PARAM_BGN_PER_EUR: f64 = 2.0;

const LOCAL_FILTERS: [FilterField; 2] = [FilterField::PriceMax, FilterField::KmMax];

const COLORS: [&str; 15] = [
    "черен", "бял", "сив", "червен", "син", "зелен", "жълт", "кафяв", "оранжев", "златен",
    "лилав", "розов", "бежов", "бордо", "сребърен",
];

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("hardcoded selector is valid")
}

static ITEM: Lazy<Selector> = Lazy::new(|| selector("div.item"));
static TITLE: Lazy<Selector> = Lazy::new(|| selector("a.title"));
static PRICE: Lazy<Selector> = Lazy::new(|| selector("div.price > div"));
static PARAM_SPANS: Lazy<Selector> = Lazy::new(|| selector("div.params span"));
static LOCATION: Lazy<Selector> = Lazy::new(|| selector("div.seller .location"));
static SELLER: Lazy<Selector> = Lazy::new(|| selector("div.seller .name a"));
static PHOTOS: Lazy<Selector> = Lazy::new(|| selector("div.photo img.pic"));
static INFO: Lazy<Selector> = Lazy::new(|| selector("div.info"));
static RESULTS_MARKER: Lazy<Selector> =
    Lazy::new(|| selector(".resultsInfoBox, #paramsFromSearchText, .paramsFromSearchText"));
static PAGINATION: Lazy<Selector> = Lazy::new(|| selector(".pagination"));
static ANCHOR: Lazy<Selector> = Lazy::new(|| selector("a[href]"));

/// mobile.bg marketplace
pub struct MobileBg {
    base_url: Url,
}

impl MobileBg {
    pub fn new() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default base URL is valid"),
        }
    }

    /// Points the adapter at another host, e.g. a local mock server
    pub fn with_base_url(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| {
            ScrapeError::InvalidFilter(format!("invalid base URL '{}': {}", base_url, e))
        })?;
        Ok(Self { base_url })
    }

    fn parse_item(&self, item: ElementRef<'_>) -> Option<CarRecord> {
        let title_link = item.select(&TITLE).next()?;
        let title = element_text(title_link)?;
        let url = title_link
            .value()
            .attr("href")
            .and_then(|href| absolutize(href, &self.base_url))?;

        let mut record = CarRecord::new(title, url);
        record.source_site = Some(self.name().to_string());
        (record.brand, record.model) = split_title(&record.title);
        record.price = select_text(item, &PRICE).and_then(|text| extract_price(&text));
        record.year = year_in(&record.title);

        for span in item.select(&PARAM_SPANS) {
            let Some(text) = element_text(span) else {
                continue;
            };
            let lower = text.to_lowercase();

            if lower.contains("км") {
                if record.mileage_km.is_none() {
                    record.mileage_km = extract_number(&text).and_then(|n| u32::try_from(n).ok());
                }
            } else if lower.contains("к.с.") {
                record.power_hp = extract_number(&text).and_then(|n| u32::try_from(n).ok());
            } else if lower.contains("куб") {
                record.engine_displacement_cc =
                    extract_number(&text).and_then(|n| u32::try_from(n).ok());
            } else if COLORS.contains(&lower.as_str()) {
                record.color = Some(text);
            } else if let Some(year) = year_in(&text) {
                record.year.get_or_insert(year);
            } else if let Some(engine) = engine_label(&lower) {
                record.engine_type = Some(engine);
            } else if let Some(gearbox) = gearbox_label(&lower) {
                record.gearbox_type = Some(gearbox);
            }
        }

        record.raw_location = select_text(item, &LOCATION);
        record.seller_info = select_text(item, &SELLER);
        record.description = select_text(item, &INFO);
        record.image_urls = item
            .select(&PHOTOS)
            .filter_map(|img| img.value().attr("src"))
            .filter_map(|src| absolutize(src, &self.base_url))
            .collect();

        Some(record)
    }
}

impl Default for MobileBg {
    fn default() -> Self {
        Self::new()
    }
}

/// Fuel label of a params span; gas and hydrogen variants map to `Other`
fn engine_label(lower: &str) -> Option<EngineType> {
    if lower.contains("газ") || lower.contains("метан") || lower.contains("водород") {
        Some(EngineType::Other)
    } else if lower.contains("хибрид") {
        Some(EngineType::Hybrid)
    } else if lower.contains("електр") {
        Some(EngineType::Electric)
    } else if lower.contains("дизел") {
        Some(EngineType::Diesel)
    } else if lower.contains("бензин") {
        Some(EngineType::Petrol)
    } else {
        None
    }
}

fn gearbox_label(lower: &str) -> Option<GearboxType> {
    match lower {
        "автоматична" | "ръчна" | "полуавтоматична" => GearboxType::from_label(lower),
        _ => None,
    }
}

fn slug(value: &str) -> String {
    clean_text(value).to_lowercase().replace(' ', "-")
}

fn brand_slug(brand: &str) -> String {
    let slug = slug(brand);
    match slug.as_str() {
        "mercedes" => "mercedes-benz".to_string(),
        "vw" => "volkswagen".to_string(),
        _ => slug,
    }
}

fn model_slug(model: &str) -> String {
    let slug = slug(model);
    match slug.as_str() {
        "glc" | "glc-class" => "glc-klasa".to_string(),
        "c-class" => "c-klasa".to_string(),
        "e-class" => "e-klasa".to_string(),
        "s-class" => "s-klasa".to_string(),
        "a-class" => "a-klasa".to_string(),
        "b-class" => "b-klasa".to_string(),
        _ => slug,
    }
}

fn engine_slug(engine: EngineType) -> Option<&'static str> {
    match engine {
        EngineType::Diesel => Some("dizelov"),
        EngineType::Petrol => Some("benzinov"),
        EngineType::Electric => Some("elektricheski"),
        EngineType::Hybrid => Some("hibridni"),
        EngineType::Other => None,
    }
}

fn gearbox_slug(gearbox: GearboxType) -> Option<&'static str> {
    match gearbox {
        GearboxType::Automatic => Some("avtomatichna"),
        GearboxType::Manual => Some("rychna"),
        GearboxType::Unknown => None,
    }
}

/// Structural next-page detection
///
/// Inside a pagination block the next control is authoritative. Without one,
/// any "next" link on the page counts, and a full page of listings is taken
/// as a hint that more may follow.
fn has_next_page(document: &Html, listing_count: usize) -> bool {
    if let Some(pagination) = document.select(&PAGINATION).next() {
        return pagination.select(&ANCHOR).any(is_next_control);
    }

    document.select(&ANCHOR).any(is_next_control) || listing_count >= LISTINGS_PER_PAGE
}

fn is_next_control(anchor: ElementRef<'_>) -> bool {
    if anchor.value().attr("rel") == Some("next") {
        return true;
    }
    let text = anchor.text().collect::<String>().to_lowercase();
    text.contains("напред") || text.contains("next") || text.contains('›')
}

impl Marketplace for MobileBg {
    fn name(&self) -> &str {
        "mobile.bg"
    }

    fn build_page_url(&self, filters: &FilterConfig, page: u32) -> Result<String> {
        if page == 0 {
            return Err(ScrapeError::InvalidFilter(
                "page numbers start at 1".to_string(),
            ));
        }

        let brand = brand_slug(&filters.brand);
        let model = model_slug(&filters.model);
        if brand.is_empty() || model.is_empty() {
            return Err(ScrapeError::InvalidFilter(
                "brand and model are required".to_string(),
            ));
        }

        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                ScrapeError::InvalidFilter(format!("base URL '{}' cannot hold a path", self.base_url))
            })?;
            segments.pop_if_empty();
            segments.extend(["obiavi", "avtomobili-dzhipove"]);
            segments.push(&brand);
            segments.push(&model);

            if let Some(engine) = filters.engine_type.and_then(engine_slug) {
                segments.push(engine);
            }
            if let Some(gearbox) = filters.gearbox_type.and_then(gearbox_slug) {
                segments.push(gearbox);
            }
            if let Some(year) = filters.year_start {
                segments.push(&format!("ot-{}", year));
            }
            segments.push("namira-se-v-balgariya");

            if page > 1 {
                segments.push(&format!("p-{}", page));
            }
        }

        if let Some(price_max) = filters.price_max {
            let bgn = (f64::from(price_max) * PRICE_PARAM_BGN_PER_EUR).ceil() as u64;
            url.query_pairs_mut().append_pair("price1", &bgn.to_string());
        }

        tracing::debug!("Built mobile.bg search URL: {}", url);
        Ok(url.to_string())
    }

    fn parse_page(&self, body: &str) -> Result<ParsedPage> {
        let document = Html::parse_document(body);
        let items: Vec<ElementRef<'_>> = document.select(&ITEM).collect();

        if items.is_empty()
            && document.select(&RESULTS_MARKER).next().is_none()
            && document.select(&PAGINATION).next().is_none()
        {
            return Err(ScrapeError::Parse {
                reason: "no listings and no results container on mobile.bg page".to_string(),
            });
        }

        let mut records = Vec::with_capacity(items.len());
        for item in &items {
            match self.parse_item(*item) {
                Some(record) if record.is_valid() => records.push(record),
                _ => tracing::debug!("Dropping mobile.bg listing without title or link"),
            }
        }

        let has_next_page = has_next_page(&document, items.len());
        Ok(ParsedPage {
            records,
            has_next_page,
        })
    }

    fn local_filters(&self) -> &[FilterField] {
        &LOCAL_FILTERS
    }
}
