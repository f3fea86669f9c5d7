use crate::model::{CarRecord, EngineType, GearboxType};
use crate::ScrapeError;

/// Default page cap for a run
pub const DEFAULT_MAX_PAGES: u32 = 10;

/// Fixed BGN/EUR conversion rate used for local price checks
pub const BGN_PER_EUR: f64 = 1.95583;

/// Optional filters that can be re-checked locally against a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterField {
    YearStart,
    PriceMax,
    KmMax,
    EngineType,
    GearboxType,
}

impl FilterField {
    pub const ALL: [FilterField; 5] = [
        Self::YearStart,
        Self::PriceMax,
        Self::KmMax,
        Self::EngineType,
        Self::GearboxType,
    ];
}

/// Search constraints for one scrape run
///
/// Built once from CLI input and never mutated afterwards. Which filters are
/// applied by the site and which are re-checked locally depends on the
/// marketplace (see [`crate::Marketplace::local_filters`]); the notes on each
/// field describe the bundled sites.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterConfig {
    /// Server-side on every site (path slug on mobile.bg, `brand=` otherwise)
    pub brand: String,

    /// Server-side on every site
    pub model: String,

    /// Minimum manufacturing year. Server-side (`ot-{year}` on mobile.bg)
    pub year_start: Option<u16>,

    /// Maximum price in EUR. mobile.bg receives an over-approximated BGN
    /// bound (`price1`) and the exact limit is re-checked locally
    pub price_max: Option<u32>,

    /// Maximum mileage in km. mobile.bg cannot express it, so it is checked
    /// locally there; server-side (`km_max=`) on configurable sites
    pub km_max: Option<u32>,

    /// Server-side on every site
    pub engine_type: Option<EngineType>,

    /// Server-side on every site
    pub gearbox_type: Option<GearboxType>,

    /// Upper bound on fetched pages, never sent to the site
    pub max_pages: u32,
}

impl FilterConfig {
    /// Creates a filter set with only brand and model
    pub fn new(brand: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            brand: brand.into(),
            model: model.into(),
            year_start: None,
            price_max: None,
            km_max: None,
            engine_type: None,
            gearbox_type: None,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    /// Checks the configuration before any network activity
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The filters can be turned into search URLs
    /// * `Err(ScrapeError::InvalidFilter)` - A required field is blank or a
    ///   bound is out of range
    pub fn validate(&self) -> Result<(), ScrapeError> {
        if self.brand.trim().is_empty() {
            return Err(ScrapeError::InvalidFilter(
                "brand cannot be empty".to_string(),
            ));
        }

        if self.model.trim().is_empty() {
            return Err(ScrapeError::InvalidFilter(
                "model cannot be empty".to_string(),
            ));
        }

        if self.max_pages == 0 {
            return Err(ScrapeError::InvalidFilter(
                "max_pages must be at least 1".to_string(),
            ));
        }

        if let Some(year) = self.year_start {
            if !(1900..=2100).contains(&year) {
                return Err(ScrapeError::InvalidFilter(format!(
                    "year_start must be between 1900 and 2100, got {}",
                    year
                )));
            }
        }

        if self.engine_type == Some(EngineType::Other) {
            return Err(ScrapeError::InvalidFilter(
                "engine_type 'other' cannot be searched for".to_string(),
            ));
        }

        if self.gearbox_type == Some(GearboxType::Unknown) {
            return Err(ScrapeError::InvalidFilter(
                "gearbox_type 'unknown' cannot be searched for".to_string(),
            ));
        }

        Ok(())
    }

    /// Local predicate over the given filter fields
    ///
    /// A record that lacks the value a filter needs is kept: a missing year or
    /// price is not evidence that the listing violates the filter. Prices in a
    /// currency other than EUR or BGN are likewise kept.
    pub fn matches(&self, record: &CarRecord, fields: &[FilterField]) -> bool {
        fields.iter().all(|field| match field {
            FilterField::YearStart => match (self.year_start, record.year) {
                (Some(min), Some(year)) => year >= min,
                _ => true,
            },
            FilterField::PriceMax => match (self.price_max, &record.price) {
                (Some(max), Some(price)) => match price_in_eur(price.amount, &price.currency) {
                    Some(eur) => eur <= f64::from(max),
                    None => true,
                },
                _ => true,
            },
            FilterField::KmMax => match (self.km_max, record.mileage_km) {
                (Some(max), Some(km)) => km <= max,
                _ => true,
            },
            FilterField::EngineType => match (self.engine_type, record.engine_type) {
                (Some(wanted), Some(actual)) => wanted == actual,
                _ => true,
            },
            FilterField::GearboxType => match (self.gearbox_type, record.gearbox_type) {
                (Some(wanted), Some(actual)) => wanted == actual,
                _ => true,
            },
        })
    }

    /// Human-readable summary used in log and error messages
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(year) = self.year_start {
            parts.push(format!("year>={}", year));
        }
        if let Some(price) = self.price_max {
            parts.push(format!("price<={} EUR", price));
        }
        if let Some(km) = self.km_max {
            parts.push(format!("km<={}", km));
        }
        if let Some(engine) = self.engine_type {
            parts.push(engine.to_string());
        }
        if let Some(gearbox) = self.gearbox_type {
            parts.push(gearbox.to_string());
        }

        let base = format!("{} {}", self.brand.trim(), self.model.trim());
        if parts.is_empty() {
            base
        } else {
            format!("{} ({})", base, parts.join(", "))
        }
    }

    /// Stable key identifying the search, independent of `max_pages`
    ///
    /// Stored cars are grouped by this key so that removals are only detected
    /// among listings of the same search.
    pub fn query_key(&self) -> String {
        fn opt<T: ToString>(value: Option<T>) -> String {
            value.map(|v| v.to_string()).unwrap_or_default()
        }

        format!(
            "brand={};model={};year_start={};price_max={};km_max={};engine={};gearbox={}",
            self.brand.trim().to_lowercase(),
            self.model.trim().to_lowercase(),
            opt(self.year_start),
            opt(self.price_max),
            opt(self.km_max),
            opt(self.engine_type),
            opt(self.gearbox_type),
        )
    }
}

fn price_in_eur(amount: u64, currency: &str) -> Option<f64> {
    match currency {
        "EUR" => Some(amount as f64),
        "BGN" => Some(amount as f64 / BGN_PER_EUR),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Price;

    fn record() -> CarRecord {
        CarRecord::new("Mercedes GLC 220d", "https://example.com/glc")
    }

    #[test]
    fn test_validate_requires_brand_and_model() {
        assert!(FilterConfig::new("BMW", "X5").validate().is_ok());
        assert!(matches!(
            FilterConfig::new("  ", "X5").validate(),
            Err(ScrapeError::InvalidFilter(_))
        ));
        assert!(matches!(
            FilterConfig::new("BMW", "").validate(),
            Err(ScrapeError::InvalidFilter(_))
        ));
    }

    #[test]
    fn test_validate_bounds() {
        let mut filters = FilterConfig::new("BMW", "X5");
        filters.max_pages = 0;
        assert!(filters.validate().is_err());

        let mut filters = FilterConfig::new("BMW", "X5");
        filters.year_start = Some(1492);
        assert!(filters.validate().is_err());
    }

    #[test]
    fn test_matches_km_max() {
        let mut filters = FilterConfig::new("Mercedes", "GLC");
        filters.km_max = Some(100_000);

        let mut car = record();
        car.mileage_km = Some(120_000);
        assert!(!filters.matches(&car, &[FilterField::KmMax]));

        car.mileage_km = Some(80_000);
        assert!(filters.matches(&car, &[FilterField::KmMax]));

        // Filter not in the local set is ignored
        car.mileage_km = Some(120_000);
        assert!(filters.matches(&car, &[FilterField::PriceMax]));
    }

    #[test]
    fn test_missing_values_are_kept() {
        let mut filters = FilterConfig::new("Mercedes", "GLC");
        filters.km_max = Some(100_000);
        filters.price_max = Some(30_000);
        filters.year_start = Some(2019);
        assert!(filters.matches(&record(), &FilterField::ALL));
    }

    #[test]
    fn test_price_conversion() {
        let mut filters = FilterConfig::new("Mercedes", "GLC");
        filters.price_max = Some(30_000);

        let mut car = record();
        car.price = Some(Price::new(58_000, "BGN"));
        assert!(filters.matches(&car, &[FilterField::PriceMax]));

        car.price = Some(Price::new(60_000, "BGN"));
        assert!(!filters.matches(&car, &[FilterField::PriceMax]));

        car.price = Some(Price::new(31_000, "EUR"));
        assert!(!filters.matches(&car, &[FilterField::PriceMax]));

        car.price = Some(Price::new(99_000, "USD"));
        assert!(filters.matches(&car, &[FilterField::PriceMax]));
    }

    #[test]
    fn test_describe_and_query_key() {
        let mut filters = FilterConfig::new("BMW", "X5");
        filters.price_max = Some(30_000);
        filters.engine_type = Some(EngineType::Diesel);
        assert_eq!(filters.describe(), "BMW X5 (price<=30000 EUR, diesel)");

        let mut capped = filters.clone();
        capped.max_pages = 2;
        assert_eq!(filters.query_key(), capped.query_key());
        assert!(filters.query_key().starts_with("brand=bmw;model=x5;"));
    }
}
