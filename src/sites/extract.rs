//! Text normalization shared by the marketplace parsers

use crate::model::Price;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Selector};

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

static DIGITS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d[\d\s.,']*").expect("valid regex"));

// Currency marker either after the number (`12 500 лв.`) or before it (`€ 12,500`)
static PRICE_AFTER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d[\d\s.,']*)\s*(лв|bgn|eur|€|usd|\$)").expect("valid regex")
});
static PRICE_BEFORE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(eur|€|usd|\$|bgn)\s*(\d[\d\s.,']*)").expect("valid regex")
});

static YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(19|20)\d{2}\b").expect("valid regex"));

/// Collapses runs of whitespace (including non-breaking spaces) to one space
pub fn clean_text(raw: &str) -> String {
    WHITESPACE.replace_all(raw.trim(), " ").into_owned()
}

/// Text content of an element, cleaned; `None` when empty
pub fn element_text(element: ElementRef<'_>) -> Option<String> {
    let text = clean_text(&element.text().collect::<String>());
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Cleaned text of the first descendant matching `selector`
pub fn select_text(element: ElementRef<'_>, selector: &Selector) -> Option<String> {
    element.select(selector).next().and_then(element_text)
}

/// First number in the text, rounded to a whole unit
///
/// Thousands separators (space, `.`, `,`, `'`) are removed. A final group of
/// one or two digits after `.` or `,` is a decimal fraction, so `"24.500,00"`
/// reads as `24500` and `"19999.99"` as `20000`.
pub fn extract_number(text: &str) -> Option<u64> {
    let found = DIGITS.find(text)?;
    parse_amount(found.as_str())
}

fn parse_amount(raw: &str) -> Option<u64> {
    let raw = raw.trim_end_matches(|c: char| !c.is_ascii_digit());
    let (whole, fraction) = match raw.rfind(|c: char| c == '.' || c == ',') {
        Some(pos) if is_fraction(&raw[pos + 1..]) => (&raw[..pos], &raw[pos + 1..]),
        _ => (raw, ""),
    };

    let digits: String = whole.chars().filter(char::is_ascii_digit).collect();
    let amount: u64 = digits.parse().ok()?;
    if fraction.starts_with(|c: char| c >= '5') {
        amount.checked_add(1)
    } else {
        Some(amount)
    }
}

fn is_fraction(group: &str) -> bool {
    (1..=2).contains(&group.len()) && group.chars().all(|c| c.is_ascii_digit())
}

/// Currency code for a price marker
fn currency_code(marker: &str) -> &'static str {
    match marker.to_lowercase().as_str() {
        "лв" | "bgn" => "BGN",
        "usd" | "$" => "USD",
        _ => "EUR",
    }
}

/// Parses a price with an explicit currency marker
///
/// Recognizes `лв`/`BGN`, `EUR`/`€` and `USD`/`$` on either side of the
/// number. Text without a marker or without digits yields `None`.
pub fn extract_price(text: &str) -> Option<Price> {
    if let Some(caps) = PRICE_AFTER.captures(text) {
        let amount = parse_amount(&caps[1])?;
        return Some(Price::new(amount, currency_code(&caps[2])));
    }
    if let Some(caps) = PRICE_BEFORE.captures(text) {
        let amount = parse_amount(&caps[2])?;
        return Some(Price::new(amount, currency_code(&caps[1])));
    }
    None
}

/// Like [`extract_price`], but a bare number is read in `default_currency`
///
/// Placeholders such as "Price on request" still yield `None`.
pub fn extract_price_or(text: &str, default_currency: &str) -> Option<Price> {
    extract_price(text).or_else(|| {
        extract_number(text)
            .filter(|amount| *amount > 0)
            .map(|amount| Price::new(amount, default_currency))
    })
}

/// A plausible manufacturing year mentioned in the text
pub fn year_in(text: &str) -> Option<u16> {
    YEAR.find_iter(text)
        .filter_map(|m| m.as_str().parse::<u16>().ok())
        .find(|year| (1950..=2035).contains(year))
}

/// Brand (first word) and model (remaining words) of a listing title
///
/// A standalone model year is left out of the model.
pub fn split_title(title: &str) -> (Option<String>, Option<String>) {
    let mut words = title.split_whitespace();
    let brand = words.next().map(str::to_string);
    let model: Vec<&str> = words
        .filter(|word| !(word.len() == 4 && year_in(word).is_some()))
        .collect();

    let model = if model.is_empty() {
        None
    } else {
        Some(model.join(" "))
    };
    (brand, model)
}

/// Resolves a possibly protocol-relative or site-relative href
pub fn absolutize(href: &str, base: &url::Url) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with("javascript:") || href.starts_with('#') {
        return None;
    }
    base.join(href).ok().map(|u| u.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("  BMW\n\t X5 \u{a0} xDrive "), "BMW X5 xDrive");
        assert_eq!(clean_text("   "), "");
    }

    #[test]
    fn test_extract_number() {
        assert_eq!(extract_number("125 000 км"), Some(125_000));
        assert_eq!(extract_number("125,000 km"), Some(125_000));
        assert_eq!(extract_number("190 к.с."), Some(190));
        assert_eq!(extract_number("n/a"), None);
        assert_eq!(extract_number("125.000 км"), Some(125_000));
    }

    #[test]
    fn test_decimal_fraction_is_not_folded_into_amount() {
        assert_eq!(
            extract_price_or("€ 24,500.00", "EUR"),
            Some(Price::new(24_500, "EUR"))
        );
        assert_eq!(
            extract_price("24.500,00 EUR"),
            Some(Price::new(24_500, "EUR"))
        );
        assert_eq!(
            extract_price_or("19999.99", "EUR"),
            Some(Price::new(20_000, "EUR"))
        );
        assert_eq!(
            extract_price("12 300,40 лв."),
            Some(Price::new(12_300, "BGN"))
        );
        assert_eq!(extract_price("€ 23,500."), Some(Price::new(23_500, "EUR")));
    }

    #[test]
    fn test_extract_price_bgn() {
        assert_eq!(
            extract_price("45 900 лв."),
            Some(Price::new(45_900, "BGN"))
        );
        assert_eq!(
            extract_price("45\u{a0}900 BGN"),
            Some(Price::new(45_900, "BGN"))
        );
    }

    #[test]
    fn test_extract_price_eur() {
        assert_eq!(extract_price("€ 23,500"), Some(Price::new(23_500, "EUR")));
        assert_eq!(extract_price("23 500 EUR"), Some(Price::new(23_500, "EUR")));
        assert_eq!(extract_price("$9,999"), Some(Price::new(9_999, "USD")));
    }

    #[test]
    fn test_extract_price_placeholder() {
        assert_eq!(extract_price("По договаряне"), None);
        assert_eq!(extract_price_or("Price on request", "EUR"), None);
        assert_eq!(
            extract_price_or("18 000", "EUR"),
            Some(Price::new(18_000, "EUR"))
        );
    }

    #[test]
    fn test_year_in() {
        assert_eq!(year_in("юни 2019 г."), Some(2019));
        assert_eq!(year_in("Registered 03/2021"), Some(2021));
        assert_eq!(year_in("125000 km"), None);
        assert_eq!(year_in("1890"), None);
    }

    #[test]
    fn test_split_title() {
        assert_eq!(
            split_title("Mercedes-Benz GLC 220 d 4MATIC"),
            (
                Some("Mercedes-Benz".to_string()),
                Some("GLC 220 d 4MATIC".to_string())
            )
        );
        assert_eq!(
            split_title("BMW X5 2018"),
            (Some("BMW".to_string()), Some("X5".to_string()))
        );
        assert_eq!(split_title("Lada"), (Some("Lada".to_string()), None));
        assert_eq!(split_title("  "), (None, None));
    }

    #[test]
    fn test_absolutize() {
        let base = url::Url::parse("https://www.mobile.bg/").unwrap();
        assert_eq!(
            absolutize("//www.mobile.bg/obiava-1", &base).as_deref(),
            Some("https://www.mobile.bg/obiava-1")
        );
        assert_eq!(
            absolutize("/obiava-2", &base).as_deref(),
            Some("https://www.mobile.bg/obiava-2")
        );
        assert_eq!(absolutize("javascript:void(0)", &base), None);
        assert_eq!(absolutize("", &base), None);
    }
}
