//! Data model for scraped listings
//!
//! This module defines the normalized representation of one car listing and
//! the immutable filter set that drives a scrape run.

mod filters;

pub use filters::{FilterConfig, FilterField, DEFAULT_MAX_PAGES};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Asking price of a listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Whole currency units
    pub amount: u64,

    /// ISO 4217 code (e.g. "EUR", "BGN")
    pub currency: String,
}

impl Price {
    pub fn new(amount: u64, currency: impl Into<String>) -> Self {
        Self {
            amount,
            currency: currency.into(),
        }
    }
}

/// Fuel / drivetrain category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineType {
    Petrol,
    Diesel,
    Hybrid,
    Electric,
    /// Present on the listing but not one of the known categories
    Other,
}

impl EngineType {
    /// Normalizes a free-text label as it appears on a listing
    ///
    /// Accepts English and Bulgarian spellings. Anything unrecognized maps to
    /// `Other`; an empty label yields `None`.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim().to_lowercase();
        if label.is_empty() {
            return None;
        }

        let engine = match label.as_str() {
            "petrol" | "gasoline" | "benzin" | "бензин" | "бензинов" => Self::Petrol,
            "diesel" | "дизел" | "дизелов" => Self::Diesel,
            "hybrid" | "хибрид" | "хибриден" => Self::Hybrid,
            "electric" | "електрически" | "електро" => Self::Electric,
            _ => Self::Other,
        };
        Some(engine)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Petrol => "petrol",
            Self::Diesel => "diesel",
            Self::Hybrid => "hybrid",
            Self::Electric => "electric",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for EngineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses a filter value; only concrete categories are accepted
impl FromStr for EngineType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "petrol" => Ok(Self::Petrol),
            "diesel" => Ok(Self::Diesel),
            "hybrid" => Ok(Self::Hybrid),
            "electric" => Ok(Self::Electric),
            other => Err(format!(
                "unknown engine type '{}' (expected petrol, diesel, hybrid or electric)",
                other
            )),
        }
    }
}

/// Transmission category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GearboxType {
    Manual,
    Automatic,
    Unknown,
}

impl GearboxType {
    /// Normalizes a free-text label as it appears on a listing
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim().to_lowercase();
        if label.is_empty() {
            return None;
        }

        let gearbox = match label.as_str() {
            "manual" | "ръчна" => Self::Manual,
            "automatic" | "автоматична" | "полуавтоматична" => Self::Automatic,
            _ => Self::Unknown,
        };
        Some(gearbox)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Automatic => "automatic",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for GearboxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GearboxType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "manual" => Ok(Self::Manual),
            "automatic" => Ok(Self::Automatic),
            other => Err(format!(
                "unknown gearbox type '{}' (expected manual or automatic)",
                other
            )),
        }
    }
}

/// One normalized car listing
///
/// `url` is the identity of a listing within a run. Every optional field
/// serializes as `null` when unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarRecord {
    pub title: String,
    /// Make as written on the listing, e.g. "Mercedes-Benz"
    pub brand: Option<String>,
    /// Everything in the title after the make
    pub model: Option<String>,
    pub price: Option<Price>,
    pub year: Option<u16>,
    pub mileage_km: Option<u32>,
    pub engine_type: Option<EngineType>,
    pub gearbox_type: Option<GearboxType>,
    pub url: String,
    pub raw_location: Option<String>,
    pub seller_info: Option<String>,
    pub power_hp: Option<u32>,
    /// Cubic centimetres
    pub engine_displacement_cc: Option<u32>,
    pub color: Option<String>,
    #[serde(default)]
    pub image_urls: Vec<String>,
    pub description: Option<String>,
    pub source_site: Option<String>,
}

impl CarRecord {
    /// Creates a record with only the identifying fields set
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            brand: None,
            model: None,
            price: None,
            year: None,
            mileage_km: None,
            engine_type: None,
            gearbox_type: None,
            url: url.into(),
            raw_location: None,
            seller_info: None,
            power_hp: None,
            engine_displacement_cc: None,
            color: None,
            image_urls: Vec::new(),
            description: None,
            source_site: None,
        }
    }

    /// Minimal validation every emitted record must pass
    pub fn is_valid(&self) -> bool {
        !self.title.trim().is_empty() && !self.url.trim().is_empty()
    }
}
