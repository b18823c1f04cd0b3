//! Column layouts: which sheet column feeds which product field.
//!
//! Supplier sheets have drifted between several positional layouts, so the
//! mapping is data rather than code. Three presets ship built in and custom
//! layouts can be loaded from JSON (see `schemas/column-layout.json`).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

use crate::error::{LayoutError, LayoutResult};

/// Nine columns with explicit stock code, company and three discount tiers.
pub const STANDARD: &str = "standard";

/// Older layout with shelf price, discount rate and an image column.
pub const LEGACY: &str = "legacy";

/// Six columns without stock code or company.
pub const COMPACT: &str = "compact";

/// Preset used when nothing else is configured.
pub const DEFAULT_PRESET: &str = STANDARD;

/// Header compatibility a layout needs before auto-detection tries it.
pub const MIN_HINT_SCORE: f64 = 0.5;

/// A product field a column can feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    StockCode,
    Company,
    ProductName,
    Unit,
    ListPrice,
    Discount5,
    Discount10,
    Discount15,
    VatRate,
    ImagePath,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::StockCode => "stock_code",
            Field::Company => "company",
            Field::ProductName => "product_name",
            Field::Unit => "unit",
            Field::ListPrice => "list_price",
            Field::Discount5 => "discount5",
            Field::Discount10 => "discount10",
            Field::Discount15 => "discount15",
            Field::VatRate => "vat_rate",
            Field::ImagePath => "image_path",
        }
    }
}

/// Zero-based column index per field. Name and list price are mandatory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMap {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock_code: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<usize>,
    pub product_name: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<usize>,
    pub list_price: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount5: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount10: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount15: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vat_rate: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<usize>,
}

impl ColumnMap {
    /// Map with only the two mandatory fields set.
    pub fn new(product_name: usize, list_price: usize) -> Self {
        Self {
            stock_code: None,
            company: None,
            product_name,
            unit: None,
            list_price,
            discount5: None,
            discount10: None,
            discount15: None,
            vat_rate: None,
            image_path: None,
        }
    }

    /// Column index for a field, if mapped.
    pub fn get(&self, field: Field) -> Option<usize> {
        match field {
            Field::StockCode => self.stock_code,
            Field::Company => self.company,
            Field::ProductName => Some(self.product_name),
            Field::Unit => self.unit,
            Field::ListPrice => Some(self.list_price),
            Field::Discount5 => self.discount5,
            Field::Discount10 => self.discount10,
            Field::Discount15 => self.discount15,
            Field::VatRate => self.vat_rate,
            Field::ImagePath => self.image_path,
        }
    }

    /// All mapped (field, column) pairs in column order.
    pub fn mapped(&self) -> Vec<(Field, usize)> {
        let fields = [
            Field::StockCode,
            Field::Company,
            Field::ProductName,
            Field::Unit,
            Field::ListPrice,
            Field::Discount5,
            Field::Discount10,
            Field::Discount15,
            Field::VatRate,
            Field::ImagePath,
        ];
        let mut pairs: Vec<(Field, usize)> = fields
            .iter()
            .filter_map(|f| self.get(*f).map(|col| (*f, col)))
            .collect();
        pairs.sort_by_key(|(_, col)| *col);
        pairs
    }
}

/// A named positional layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnLayout {
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Leading rows to skip; the first row is always a header
    #[serde(default = "default_header_rows")]
    pub header_rows: usize,

    pub columns: ColumnMap,

    /// Header labels this layout is recognised by
    #[serde(default)]
    pub header_hints: Vec<String>,
}

fn default_header_rows() -> usize {
    1
}

impl ColumnLayout {
    pub fn new(name: &str, columns: ColumnMap) -> Self {
        Self {
            name: name.to_string(),
            description: String::new(),
            header_rows: default_header_rows(),
            columns,
            header_hints: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_hints(mut self, hints: &[&str]) -> Self {
        self.header_hints = hints.iter().map(|h| h.to_string()).collect();
        self
    }

    /// Look up a built-in preset by name (case-insensitive).
    pub fn preset(name: &str) -> LayoutResult<Self> {
        match name.trim().to_lowercase().as_str() {
            STANDARD => Ok(standard_layout()),
            LEGACY => Ok(legacy_layout()),
            COMPACT => Ok(compact_layout()),
            _ => Err(LayoutError::UnknownPreset(name.to_string())),
        }
    }

    /// All built-in presets, default first.
    pub fn presets() -> Vec<Self> {
        vec![standard_layout(), legacy_layout(), compact_layout()]
    }

    /// Parse and check a layout from a JSON string.
    pub fn from_json(json: &str) -> LayoutResult<Self> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(&value)
    }

    /// Parse and check a layout from a JSON value.
    pub fn from_value(value: &Value) -> LayoutResult<Self> {
        crate::validation::validate_layout(value)
            .map_err(|errors| LayoutError::Schema { errors })?;
        let layout: ColumnLayout = serde_json::from_value(value.clone())?;
        layout.check()?;
        Ok(layout)
    }

    pub fn to_json(&self) -> LayoutResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Structural checks the schema cannot express.
    pub fn check(&self) -> LayoutResult<()> {
        if self.name.trim().is_empty() {
            return Err(LayoutError::Invalid("layout name is empty".into()));
        }
        if self.header_rows == 0 {
            return Err(LayoutError::Invalid(
                "header_rows must be at least 1".into(),
            ));
        }

        let mut seen = HashSet::new();
        for (field, col) in self.columns.mapped() {
            if !seen.insert(col) {
                return Err(LayoutError::Invalid(format!(
                    "column {} is mapped more than once (again for {})",
                    col,
                    field.as_str()
                )));
            }
        }
        Ok(())
    }

    /// Fraction of header hints found in the given header row.
    pub fn hint_score(&self, headers: &[String]) -> f64 {
        header_compatibility(&self.header_hints, headers)
    }
}

impl Default for ColumnLayout {
    fn default() -> Self {
        standard_layout()
    }
}

/// Fraction of `expected` labels contained in some header, ignoring case.
pub fn header_compatibility(expected: &[String], headers: &[String]) -> f64 {
    if expected.is_empty() {
        return 0.0;
    }

    let folded: Vec<String> = headers.iter().map(|h| fold(h)).collect();
    let matches = expected
        .iter()
        .map(|e| fold(e))
        .filter(|e| !e.is_empty() && folded.iter().any(|h| h.contains(e.as_str())))
        .count();

    matches as f64 / expected.len() as f64
}

/// Case fold that treats dotted and dotless Turkish i alike.
fn fold(s: &str) -> String {
    s.trim()
        .to_lowercase()
        .chars()
        .filter(|c| *c != '\u{0307}')
        .map(|c| if c == 'ı' { 'i' } else { c })
        .collect()
}

fn standard_layout() -> ColumnLayout {
    let columns = ColumnMap {
        stock_code: Some(0),
        company: Some(1),
        product_name: 2,
        unit: Some(3),
        list_price: 4,
        discount5: Some(5),
        discount10: Some(6),
        discount15: Some(7),
        vat_rate: Some(8),
        image_path: None,
    };

    ColumnLayout::new(STANDARD, columns)
        .with_description(
            "Stock code, company, name, unit, list price, 5/10/15% discount prices, VAT rate",
        )
        .with_hints(&[
            "STOK KODU",
            "FİRMA",
            "ÜRÜN ADI",
            "BİRİM",
            "LİSTE FİYATI",
            "%5",
            "%10",
            "%15",
            "KDV",
        ])
}

fn legacy_layout() -> ColumnLayout {
    let mut columns = ColumnMap::new(2, 6);
    columns.stock_code = Some(0);
    columns.company = Some(1);
    columns.unit = Some(3);
    columns.image_path = Some(7);

    ColumnLayout::new(LEGACY, columns)
        .with_description(
            "Stock code, company, name, unit, shelf price, discount rate, list price, image",
        )
        .with_hints(&[
            "STOK KODU",
            "FİRMA",
            "ÜRÜN ADI",
            "BİRİM",
            "RAF FİYATI",
            "İSKONTO ORANI",
            "LİSTE FİYATI",
            "RESİM",
        ])
}

fn compact_layout() -> ColumnLayout {
    let mut columns = ColumnMap::new(0, 2);
    columns.unit = Some(1);
    columns.discount5 = Some(3);
    columns.discount10 = Some(4);
    columns.discount15 = Some(5);

    ColumnLayout::new(COMPACT, columns)
        .with_description("Name, unit, list price, 5/10/15% discount prices")
        .with_hints(&["ÜRÜN ADI", "BİRİM", "LİSTE FİYATI", "%5", "%10", "%15"])
}
