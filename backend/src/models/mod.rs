//! Domain models shared by the normalizer, catalog and pricing engine.
//!
//! - [`Product`] - one normalized price list row
//! - [`UploadedFile`] - one accepted upload and its products
//! - [`CalculationRecord`] - values handed to an external persistence collaborator

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Product
// =============================================================================

/// A normalized price list entry.
///
/// Prices are in the base currency of the supplier list. `lowest_price` is the
/// cost basis used for pricing and is always positive for catalog products.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub stock_code: String,
    pub company: String,
    pub product_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    pub list_price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_price5: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_price10: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_price15: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vat_rate: Option<f64>,
    pub lowest_price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
    pub source_file: String,
}

impl Product {
    /// Whether any discount tier undercuts the list price.
    pub fn is_discounted(&self) -> bool {
        self.lowest_price < self.list_price
    }
}

/// Minimum of the positive discount tiers, or `list_price` when none is positive.
pub fn lowest_price(list_price: f64, tiers: &[Option<f64>]) -> f64 {
    tiers
        .iter()
        .flatten()
        .copied()
        .filter(|p| *p > 0.0)
        .fold(None, |min: Option<f64>, p| match min {
            Some(m) if m <= p => Some(m),
            _ => Some(p),
        })
        .unwrap_or(list_price)
}

// =============================================================================
// Uploaded File
// =============================================================================

/// An accepted upload. Its name is the supplier partition key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub name: String,
    pub products: Vec<Product>,
    pub uploaded_at: DateTime<Utc>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, products: Vec<Product>) -> Self {
        Self {
            name: name.into(),
            products,
            uploaded_at: Utc::now(),
        }
    }
}

// =============================================================================
// Calculation Record
// =============================================================================

/// A computed calculation, shaped for an external store.
///
/// `original_price` is the cost basis and `final_price` the selling price, both
/// in the base currency; `currency` is the currency the quote was shown in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CalculationRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub product_name: String,
    pub supplier_name: String,
    pub original_price: f64,
    pub margin_percent: f64,
    pub final_price: f64,
    pub currency: String,
    pub calculated_at: DateTime<Utc>,
}
