//! Currency rate tables.
//!
//! A rate is the number of units of a currency per one unit of the base
//! currency. Lookups are injected through [`RateTable`] so pricing never
//! depends on where the numbers come from.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::{ConfigError, ConfigResult};

/// Base currency of supplier price lists.
pub const BASE_CURRENCY: &str = "TRY";

/// Currency rate lookup.
pub trait RateTable {
    /// Currency all prices are stored in.
    fn base_currency(&self) -> &str;

    /// Units of `currency` per base unit, if known.
    fn rate(&self, currency: &str) -> Option<f64>;

    /// Display symbol, if known.
    fn symbol(&self, currency: &str) -> Option<&str>;
}

/// Rate used for a currency: missing, zero, negative or non-finite rates read as 1.
pub fn effective_rate(rates: &dyn RateTable, currency: &str) -> f64 {
    rates
        .rate(currency)
        .filter(|r| r.is_finite() && *r > 0.0)
        .unwrap_or(1.0)
}

/// Display symbol, falling back to the currency code itself.
pub fn currency_symbol(rates: &dyn RateTable, currency: &str) -> String {
    rates
        .symbol(currency)
        .map(str::to_string)
        .unwrap_or_else(|| currency.to_uppercase())
}

/// A fixed rate table, loadable from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticRates {
    pub base: String,
    pub rates: BTreeMap<String, f64>,
    #[serde(default)]
    pub symbols: BTreeMap<String, String>,
}

impl StaticRates {
    pub fn new(base: &str) -> Self {
        let base = base.to_uppercase();
        let mut rates = BTreeMap::new();
        rates.insert(base.clone(), 1.0);
        Self {
            base,
            rates,
            symbols: BTreeMap::new(),
        }
    }

    pub fn with_rate(mut self, currency: &str, rate: f64) -> Self {
        self.rates.insert(currency.to_uppercase(), rate);
        self
    }

    pub fn with_symbol(mut self, currency: &str, symbol: &str) -> Self {
        self.symbols.insert(currency.to_uppercase(), symbol.to_string());
        self
    }

    /// Parse a rate table, checked against the embedded schema.
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        let value: Value = serde_json::from_str(json)?;
        crate::validation::validate_rate_table(&value)
            .map_err(|errors| ConfigError::RatesSchema { errors })?;

        let table: StaticRates = serde_json::from_value(value)?;
        Ok(table.uppercased())
    }

    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Currency codes in alphabetical order.
    pub fn currencies(&self) -> Vec<&str> {
        self.rates.keys().map(String::as_str).collect()
    }

    fn uppercased(self) -> Self {
        let base = self.base.to_uppercase();
        let mut rates: BTreeMap<String, f64> = self
            .rates
            .into_iter()
            .map(|(code, rate)| (code.to_uppercase(), rate))
            .collect();
        rates.entry(base.clone()).or_insert(1.0);

        Self {
            base,
            rates,
            symbols: self
                .symbols
                .into_iter()
                .map(|(code, symbol)| (code.to_uppercase(), symbol))
                .collect(),
        }
    }
}

impl Default for StaticRates {
    fn default() -> Self {
        StaticRates::new(BASE_CURRENCY)
            .with_rate("USD", 0.031)
            .with_rate("EUR", 0.028)
            .with_rate("GBP", 0.024)
            .with_symbol("TRY", "₺")
            .with_symbol("USD", "$")
            .with_symbol("EUR", "€")
            .with_symbol("GBP", "£")
    }
}

impl RateTable for StaticRates {
    fn base_currency(&self) -> &str {
        &self.base
    }

    fn rate(&self, currency: &str) -> Option<f64> {
        self.rates.get(&currency.trim().to_uppercase()).copied()
    }

    fn symbol(&self, currency: &str) -> Option<&str> {
        self.symbols
            .get(&currency.trim().to_uppercase())
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_table() {
        let rates = StaticRates::default();
        assert_eq!(rates.base_currency(), "TRY");
        assert_eq!(rates.rate("usd"), Some(0.031));
        assert_eq!(rates.rate("TRY"), Some(1.0));
        assert_eq!(rates.symbol("EUR"), Some("€"));
        assert_eq!(rates.currencies(), vec!["EUR", "GBP", "TRY", "USD"]);
    }

    #[test]
    fn test_effective_rate_treats_unusable_as_missing() {
        let rates = StaticRates::new("TRY")
            .with_rate("USD", 0.0)
            .with_rate("EUR", -2.0)
            .with_rate("GBP", f64::NAN);
        assert_eq!(effective_rate(&rates, "USD"), 1.0);
        assert_eq!(effective_rate(&rates, "EUR"), 1.0);
        assert_eq!(effective_rate(&rates, "GBP"), 1.0);
        assert_eq!(effective_rate(&rates, "JPY"), 1.0);
    }

    #[test]
    fn test_symbol_fallback() {
        let rates = StaticRates::default();
        assert_eq!(currency_symbol(&rates, "usd"), "$");
        assert_eq!(currency_symbol(&rates, "chf"), "CHF");
    }

    #[test]
    fn test_from_json_uppercases_and_adds_base() {
        let rates = StaticRates::from_json(r#"{ "base": "try", "rates": { "usd": 0.03 } }"#).unwrap();
        assert_eq!(rates.base, "TRY");
        assert_eq!(rates.rate("USD"), Some(0.03));
        assert_eq!(rates.rate("TRY"), Some(1.0));
    }

    #[test]
    fn test_from_json_schema_errors() {
        let result = StaticRates::from_json(r#"{ "base": "TRY", "rates": { "USD": -1 } }"#);
        assert!(matches!(result, Err(ConfigError::RatesSchema { .. })));

        let result = StaticRates::from_json("not json");
        assert!(matches!(result, Err(ConfigError::RatesJson(_))));
    }

    #[test]
    fn test_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rates.json");
        fs::write(&path, r#"{ "base": "TRY", "rates": { "EUR": 0.027 }, "symbols": { "EUR": "€" } }"#)
            .unwrap();

        let rates = StaticRates::from_file(&path).unwrap();
        assert_eq!(rates.rate("EUR"), Some(0.027));

        let missing = StaticRates::from_file(dir.path().join("missing.json"));
        assert!(matches!(missing, Err(ConfigError::RatesIo(_))));
    }
}
