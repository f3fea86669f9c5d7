use serde::Deserialize;

/// Desktop browser identification sent with every request
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Main configuration structure for Cardeals
///
/// Every section has defaults, so an empty file (or no file at all) yields a
/// usable configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    pub http: HttpConfig,
    pub scrape: ScrapeConfig,
    pub output: OutputConfig,

    /// Site description, required when `scrape.site = "configurable"`
    pub site: Option<SiteConfig>,
}

/// HTTP client and retry configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct HttpConfig {
    /// Total request timeout (seconds)
    pub timeout_secs: u64,

    /// Connection establishment timeout (seconds)
    pub connect_timeout_secs: u64,

    /// Retries after the first attempt for transient failures
    pub max_retries: u32,

    /// Delay before the first retry (milliseconds)
    pub base_delay_ms: u64,

    /// Cap on any single backoff delay (milliseconds)
    pub max_delay_ms: u64,

    /// Randomize backoff delays
    pub jitter: bool,

    pub user_agent: String,

    /// Refuse plain-HTTP URLs
    pub https_only: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 20,
            connect_timeout_secs: 10,
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay_ms: 16_000,
            jitter: true,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            https_only: true,
        }
    }
}

/// Which marketplace adapter to use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum SiteKind {
    #[default]
    #[serde(rename = "mobile.bg")]
    MobileBg,
    #[serde(rename = "configurable")]
    Configurable,
}

/// Scrape run configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ScrapeConfig {
    pub site: SiteKind,

    /// Page cap used when `--max-pages` is not given
    pub max_pages: u32,

    /// Pause between consecutive page requests (milliseconds)
    pub page_delay_ms: u64,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            site: SiteKind::MobileBg,
            max_pages: crate::model::DEFAULT_MAX_PAGES,
            page_delay_ms: 1000,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Path to the SQLite database file used by `--use-db`
    pub database_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            database_path: "./cardeals.db".to_string(),
        }
    }
}

/// A selector-driven marketplace
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SiteConfig {
    /// Name recorded as `source_site` on every listing
    pub name: String,

    /// Scheme and host, e.g. `https://cars.example.com`
    pub base_url: String,

    #[serde(default = "default_search_path")]
    pub search_path: String,

    #[serde(default = "default_page_param")]
    pub page_param: String,

    /// Listings per full page; only consulted when a page has no
    /// pagination block
    #[serde(default)]
    pub per_page: Option<usize>,

    /// Currency assumed for prices without a currency marker
    #[serde(default = "default_currency")]
    pub currency: String,

    #[serde(default)]
    pub selectors: SelectorConfig,
}

fn default_search_path() -> String {
    "/search".to_string()
}

fn default_page_param() -> String {
    "page".to_string()
}

fn default_currency() -> String {
    "EUR".to_string()
}

/// CSS selectors describing a listings page
///
/// Every field selector is evaluated relative to one listing element.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Container whose presence marks a results page (even an empty one)
    pub results: String,
    pub listing: String,
    pub title: String,
    pub link: String,
    pub price: String,
    pub year: String,
    pub mileage: String,
    pub engine: String,
    pub gearbox: String,
    pub location: String,
    pub seller: String,
    pub pagination: String,
    /// Next-page control, searched inside `pagination`
    pub next: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            results: ".listings".to_string(),
            listing: ".listing".to_string(),
            title: ".listing-title".to_string(),
            link: "a[href]".to_string(),
            price: ".listing-price".to_string(),
            year: ".listing-year".to_string(),
            mileage: ".listing-mileage".to_string(),
            engine: ".listing-engine".to_string(),
            gearbox: ".listing-gearbox".to_string(),
            location: ".listing-location".to_string(),
            seller: ".listing-seller".to_string(),
            pagination: ".pagination".to_string(),
            next: "a[rel=next]".to_string(),
        }
    }
}

impl SelectorConfig {
    /// All selectors with their key names, for validation
    pub fn entries(&self) -> [(&'static str, &str); 13] {
        [
            ("results", &self.results),
            ("listing", &self.listing),
            ("title", &self.title),
            ("link", &self.link),
            ("price", &self.price),
            ("year", &self.year),
            ("mileage", &self.mileage),
            ("engine", &self.engine),
            ("gearbox", &self.gearbox),
            ("location", &self.location),
            ("seller", &self.seller),
            ("pagination", &self.pagination),
            ("next", &self.next),
        ]
    }
}
