//! Currency codes, exchange-rate tables and money formatting.
//!
//! Amounts are always carried as integers in the currency's minor unit
//! (cents for USD, whole yen for JPY).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

pub const DEFAULT_CURRENCY: &str = "USD";

/// Largest price or payment accepted, in minor units. Budget sums over a
/// trip stay far below `i64::MAX` with this bound.
pub const MAX_MINOR_UNITS: i64 = 1_000_000_000_000_000;

/// Units of each currency per one US dollar.
const STATIC_RATES: &[(&str, f64)] = &[
    ("USD", 1.0),
    ("EUR", 0.92),
    ("GBP", 0.79),
    ("ILS", 3.70),
    ("JPY", 150.0),
    ("CHF", 0.88),
    ("CAD", 1.36),
    ("AUD", 1.52),
    ("NZD", 1.65),
    ("SEK", 10.5),
    ("NOK", 10.6),
    ("DKK", 6.87),
    ("PLN", 4.0),
    ("CZK", 23.0),
    ("HUF", 360.0),
    ("TRY", 32.0),
    ("THB", 36.0),
    ("MXN", 17.0),
    ("INR", 83.0),
    ("CNY", 7.2),
    ("KRW", 1330.0),
    ("SGD", 1.34),
    ("HKD", 7.8),
    ("AED", 3.67),
    ("BRL", 5.0),
    ("ZAR", 18.5),
    ("EGP", 47.0),
    ("JOD", 0.71),
];

#[derive(Debug, Error)]
pub enum ExchangeRateError {
    #[error("exchange rate request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid exchange rate payload: {0}")]
    InvalidPayload(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RateSource {
    Static,
    Remote,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExchangeRates {
    pub base: String,
    pub source: RateSource,
    pub rates: BTreeMap<String, f64>,
}

impl ExchangeRates {
    pub fn static_table() -> Self {
        Self {
            base: DEFAULT_CURRENCY.to_string(),
            source: RateSource::Static,
            rates: STATIC_RATES
                .iter()
                .map(|(code, rate)| (code.to_string(), *rate))
                .collect(),
        }
    }

    pub fn supports(&self, currency: &str) -> bool {
        self.rates.contains_key(currency)
    }

    /// Converts an amount between two currencies, rounding half away from
    /// zero. Returns `None` when either currency is not in the table.
    pub fn convert(&self, amount_minor: i64, from: &str, to: &str) -> Option<i64> {
        if from == to {
            return Some(amount_minor);
        }
        let from_rate = *self.rates.get(from)?;
        let to_rate = *self.rates.get(to)?;

        let from_scale = 10f64.powi(minor_unit_exponent(from) as i32);
        let to_scale = 10f64.powi(minor_unit_exponent(to) as i32);
        let in_base = amount_minor as f64 / from_scale / from_rate;
        Some((in_base * to_rate * to_scale).round() as i64)
    }
}

#[derive(Deserialize)]
struct RatesPayload {
    base: String,
    rates: BTreeMap<String, f64>,
}

pub async fn fetch_rates(
    client: &reqwest::Client,
    url: &str,
) -> Result<ExchangeRates, ExchangeRateError> {
    let payload: RatesPayload = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    rates_from_payload(payload)
}

fn rates_from_payload(payload: RatesPayload) -> Result<ExchangeRates, ExchangeRateError> {
    let base = normalize_currency(&payload.base)
        .ok_or_else(|| ExchangeRateError::InvalidPayload(format!("bad base {}", payload.base)))?;

    let mut rates = BTreeMap::new();
    for (code, rate) in payload.rates {
        let Some(code) = normalize_currency(&code) else {
            continue;
        };
        if !rate.is_finite() || rate <= 0.0 {
            return Err(ExchangeRateError::InvalidPayload(format!(
                "rate for {code} must be positive"
            )));
        }
        rates.insert(code, rate);
    }
    if rates.is_empty() {
        return Err(ExchangeRateError::InvalidPayload("no rates".to_string()));
    }
    rates.insert(base.clone(), 1.0);

    Ok(ExchangeRates {
        base,
        source: RateSource::Remote,
        rates,
    })
}

/// Uses the remote table when one is configured and reachable, the static
/// table otherwise.
pub async fn resolve_rates(client: &reqwest::Client, url: Option<&str>) -> ExchangeRates {
    let Some(url) = url else {
        return ExchangeRates::static_table();
    };
    match fetch_rates(client, url).await {
        Ok(rates) => rates,
        Err(err) => {
            warn!(error = %err, url = %url, "falling back to static exchange rates");
            ExchangeRates::static_table()
        }
    }
}

/// Upper-cases a three-letter ISO code; anything else is rejected.
pub fn normalize_currency(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (trimmed.len() == 3 && trimmed.chars().all(|ch| ch.is_ascii_alphabetic()))
        .then(|| trimmed.to_ascii_uppercase())
}

pub fn minor_unit_exponent(currency: &str) -> u32 {
    match currency {
        "JPY" | "KRW" | "ISK" | "CLP" | "VND" => 0,
        "JOD" | "KWD" | "BHD" | "OMR" | "TND" => 3,
        _ => 2,
    }
}

fn currency_symbol(currency: &str) -> Option<&'static str> {
    match currency {
        "USD" => Some("$"),
        "EUR" => Some("€"),
        "GBP" => Some("£"),
        "ILS" => Some("₪"),
        "JPY" => Some("¥"),
        "INR" => Some("₹"),
        "KRW" => Some("₩"),
        _ => None,
    }
}

pub fn format_money(amount_minor: i64, currency: &str) -> String {
    let code = currency.trim().to_ascii_uppercase();
    let exponent = minor_unit_exponent(&code);
    let divisor = 10u64.pow(exponent);
    let absolute = amount_minor.unsigned_abs();

    let mut out = String::new();
    if amount_minor < 0 {
        out.push('-');
    }
    match currency_symbol(&code) {
        Some(symbol) => out.push_str(symbol),
        None => {
            out.push_str(&code);
            out.push(' ');
        }
    }
    out.push_str(&group_thousands(absolute / divisor));
    if exponent > 0 {
        out.push('.');
        out.push_str(&format!(
            "{:0width$}",
            absolute % divisor,
            width = exponent as usize
        ));
    }
    out
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_between_currencies_with_different_minor_units() {
        let rates = ExchangeRates::static_table();
        assert_eq!(rates.convert(10_000, "USD", "EUR"), Some(9_200));
        assert_eq!(rates.convert(1_500, "JPY", "USD"), Some(1_000));
        assert_eq!(rates.convert(10_000, "USD", "JPY"), Some(15_000));
        assert_eq!(rates.convert(9_200, "EUR", "USD"), Some(10_000));
    }

    #[test]
    fn conversion_is_identity_for_same_currency_and_none_for_unknown() {
        let rates = ExchangeRates::static_table();
        assert_eq!(rates.convert(123, "XYZ", "XYZ"), Some(123));
        assert_eq!(rates.convert(123, "USD", "XYZ"), None);
        assert_eq!(rates.convert(123, "XYZ", "USD"), None);
    }

    #[test]
    fn formats_common_currencies() {
        assert_eq!(format_money(123_456, "USD"), "$1,234.56");
        assert_eq!(format_money(9_000, "ils"), "₪90.00");
        assert_eq!(format_money(1_500, "JPY"), "¥1,500");
        assert_eq!(format_money(-350, "EUR"), "-€3.50");
        assert_eq!(format_money(1_200, "CHF"), "CHF 12.00");
        assert_eq!(format_money(12_345, "JOD"), "JOD 12.345");
        assert_eq!(format_money(12_345, "ISK"), "ISK 12,345");
        assert_eq!(format_money(5, "USD"), "$0.05");
        assert_eq!(format_money(100_000_000, "USD"), "$1,000,000.00");
    }

    #[test]
    fn normalizes_currency_codes() {
        assert_eq!(normalize_currency(" eur ").as_deref(), Some("EUR"));
        assert_eq!(normalize_currency("EURO"), None);
        assert_eq!(normalize_currency("E1R"), None);
    }

    #[test]
    fn remote_payload_is_validated() {
        let payload = RatesPayload {
            base: "eur".to_string(),
            rates: BTreeMap::from([("usd".to_string(), 1.08), ("bogus".to_string(), 2.0)]),
        };
        let rates = rates_from_payload(payload).unwrap();
        assert_eq!(rates.base, "EUR");
        assert_eq!(rates.source, RateSource::Remote);
        assert_eq!(rates.rates.get("EUR"), Some(&1.0));
        assert_eq!(rates.rates.get("USD"), Some(&1.08));
        assert!(!rates.supports("BOGUS"));

        let negative = RatesPayload {
            base: "USD".to_string(),
            rates: BTreeMap::from([("EUR".to_string(), -1.0)]),
        };
        assert!(rates_from_payload(negative).is_err());
    }

    #[tokio::test]
    async fn resolve_without_url_uses_static_table() {
        let rates = resolve_rates(&reqwest::Client::new(), None).await;
        assert_eq!(rates.source, RateSource::Static);
        assert!(rates.supports("ILS"));
    }
}
