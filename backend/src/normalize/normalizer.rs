//! Row-level normalization: sheet rows to [`Product`]s.

use serde::Serialize;
use std::fmt;
use std::path::Path;

use super::cells::{cell_number, cell_text};
use super::layout::{ColumnLayout, ColumnMap};
use crate::models::{lowest_price, Product};
use crate::parser::Cell;

/// Products accepted from one sheet, plus the rows that were dropped.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizeResult {
    /// Accepted products in sheet order
    pub products: Vec<Product>,
    /// Rows rejected by the acceptance filter
    pub skipped: Vec<SkippedRow>,
    /// Empty rows and rows with a blank first cell
    pub blank_rows: usize,
}

/// A data row that failed the acceptance filter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedRow {
    /// Row index in the sheet grid (row 0 is the header)
    pub row: usize,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    MissingName,
    ShortName { length: usize },
    NoListPrice,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingName => write!(f, "missing product name"),
            SkipReason::ShortName { length } => {
                write!(f, "product name too short ({} chars)", length)
            }
            SkipReason::NoListPrice => write!(f, "no positive list price"),
        }
    }
}

/// Minimum accepted product name length, in characters.
pub const MIN_NAME_LENGTH: usize = 3;

/// Normalize rows with the default layout.
pub fn normalize_rows(rows: &[Vec<Cell>], filename: &str) -> NormalizeResult {
    normalize(rows, filename, &ColumnLayout::default())
}

/// Normalize sheet rows through a column layout.
///
/// Header rows are skipped, blank rows are counted and dropped, every other
/// row either becomes a product or a [`SkippedRow`]. Output keeps sheet order.
pub fn normalize(rows: &[Vec<Cell>], filename: &str, layout: &ColumnLayout) -> NormalizeResult {
    let mut result = NormalizeResult::default();

    for (index, row) in rows.iter().enumerate().skip(layout.header_rows) {
        match normalize_row(row, index, filename, &layout.columns) {
            Ok(Some(product)) => result.products.push(product),
            Ok(None) => result.blank_rows += 1,
            Err(skipped) => result.skipped.push(skipped),
        }
    }

    result
}

/// Normalize one row.
///
/// `Ok(None)` means the row is blank and should be ignored silently.
pub fn normalize_row(
    row: &[Cell],
    index: usize,
    filename: &str,
    columns: &ColumnMap,
) -> Result<Option<Product>, SkippedRow> {
    if row.first().map_or(true, Cell::is_blank) {
        return Ok(None);
    }

    let skip = |reason| SkippedRow { row: index, reason };

    let product_name = cell_text(row.get(columns.product_name));
    let length = product_name.chars().count();
    if length == 0 {
        return Err(skip(SkipReason::MissingName));
    }
    if length < MIN_NAME_LENGTH {
        return Err(skip(SkipReason::ShortName { length }));
    }

    let list_price = cell_number(row.get(columns.list_price));
    if list_price <= 0.0 {
        return Err(skip(SkipReason::NoListPrice));
    }

    let text_at = |col: Option<usize>| col.map(|c| cell_text(row.get(c))).unwrap_or_default();
    let optional_text = |col: Option<usize>| Some(text_at(col)).filter(|s| !s.is_empty());
    let discount_at = |col: Option<usize>| {
        col.map(|c| cell_number(row.get(c)))
            .filter(|p| *p > 0.0)
    };

    let stock_code = Some(text_at(columns.stock_code))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| format!("{}-{}", filename, index));
    let company = Some(text_at(columns.company))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| file_stem(filename));

    let discount_price5 = discount_at(columns.discount5);
    let discount_price10 = discount_at(columns.discount10);
    let discount_price15 = discount_at(columns.discount15);

    let vat_rate = columns
        .vat_rate
        .and_then(|c| row.get(c))
        .filter(|cell| !cell.is_blank())
        .map(|cell| cell_number(Some(cell)));

    Ok(Some(Product {
        stock_code,
        company,
        product_name,
        unit: optional_text(columns.unit),
        list_price,
        discount_price5,
        discount_price10,
        discount_price15,
        vat_rate,
        lowest_price: lowest_price(
            list_price,
            &[discount_price5, discount_price10, discount_price15],
        ),
        image_path: optional_text(columns.image_path),
        source_file: filename.to_string(),
    }))
}

/// Filename without its final extension.
pub fn file_stem(filename: &str) -> String {
    Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| filename.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::layout::{COMPACT, LEGACY};
    use proptest::prelude::*;

    fn row(cells: &[&str]) -> Vec<Cell> {
        cells.iter().map(|c| Cell::text(*c)).collect()
    }

    fn header() -> Vec<Cell> {
        row(&[
            "STOK KODU", "FİRMA", "ÜRÜN ADI", "BİRİM", "LİSTE FİYATI", "%5", "%10", "%15", "KDV",
        ])
    }

    #[test]
    fn test_standard_row() {
        let rows = vec![
            header(),
            row(&["A-100", "Acme", "Bolt M8", "pcs", "100", "95", "90", "", "20"]),
        ];
        let result = normalize_rows(&rows, "acme.xlsx");

        assert_eq!(result.products.len(), 1);
        let p = &result.products[0];
        assert_eq!(p.stock_code, "A-100");
        assert_eq!(p.company, "Acme");
        assert_eq!(p.unit.as_deref(), Some("pcs"));
        assert_eq!(p.discount_price5, Some(95.0));
        assert_eq!(p.discount_price15, None);
        assert_eq!(p.vat_rate, Some(20.0));
        assert_eq!(p.lowest_price, 90.0);
        assert_eq!(p.source_file, "acme.xlsx");
    }

    #[test]
    fn test_header_is_never_a_product() {
        let rows = vec![row(&["X-1", "Acme", "Header Looking Name", "", "50"])];
        assert!(normalize_rows(&rows, "a.csv").products.is_empty());
    }

    #[test]
    fn test_comma_decimal_prices() {
        let rows = vec![
            header(),
            row(&["A-1", "Acme", "Washer", "pcs", "1.234,56", "12,5"]),
        ];
        let p = &normalize_rows(&rows, "a.csv").products[0];
        assert_eq!(p.list_price, 1234.56);
        assert_eq!(p.discount_price5, Some(12.5));
        assert_eq!(p.lowest_price, 12.5);
    }

    #[test]
    fn test_rejections_are_reported() {
        let rows = vec![
            header(),
            row(&["A-1", "Acme", "", "pcs", "10"]),
            row(&["A-2", "Acme", "Ab", "pcs", "10"]),
            row(&["A-3", "Acme", "Hinge", "pcs", "0"]),
            row(&["A-4", "Acme", "Hinge", "pcs", "n/a"]),
            row(&["A-5", "Acme", "Hinge", "pcs", "7"]),
        ];
        let result = normalize_rows(&rows, "a.csv");

        assert_eq!(result.products.len(), 1);
        assert_eq!(result.products[0].stock_code, "A-5");
        assert_eq!(
            result.skipped,
            vec![
                SkippedRow { row: 1, reason: SkipReason::MissingName },
                SkippedRow { row: 2, reason: SkipReason::ShortName { length: 2 } },
                SkippedRow { row: 3, reason: SkipReason::NoListPrice },
                SkippedRow { row: 4, reason: SkipReason::NoListPrice },
            ]
        );
    }

    #[test]
    fn test_name_length_counts_characters() {
        let rows = vec![header(), row(&["A-1", "Acme", "Çığ", "", "5"])];
        assert_eq!(normalize_rows(&rows, "a.csv").products.len(), 1);
    }

    #[test]
    fn test_blank_rows_are_silent() {
        let rows = vec![
            header(),
            vec![],
            row(&["", "Acme", "Bolt M8", "", "10"]),
            row(&["A-1", "Acme", "Bolt M8", "", "10"]),
        ];
        let result = normalize_rows(&rows, "a.csv");
        assert_eq!(result.products.len(), 1);
        assert_eq!(result.blank_rows, 2);
        assert!(result.skipped.is_empty());
    }

    #[test]
    fn test_missing_fields_are_synthesized() {
        let rows = vec![header(), row(&[" ", "", "Bolt M8", "", "10"])];
        // First cell blank: dropped.
        assert!(normalize_rows(&rows, "a.csv").products.is_empty());

        let rows = vec![
            header(),
            vec![Cell::Number(7.0), Cell::Empty, Cell::text("Bolt M8"), Cell::Empty, Cell::Number(10.0)],
        ];
        let p = &normalize_rows(&rows, "supplier.prices.xlsx").products[0];
        assert_eq!(p.stock_code, "7");
        assert_eq!(p.company, "supplier.prices");
        assert_eq!(p.unit, None);
        assert_eq!(p.vat_rate, None);
    }

    #[test]
    fn test_compact_layout_generates_codes() {
        let layout = ColumnLayout::preset(COMPACT).unwrap();
        let rows = vec![
            row(&["ÜRÜN ADI", "BİRİM", "LİSTE FİYATI", "%5", "%10", "%15"]),
            row(&["Bolt M8", "pcs", "100", "95", "", "80"]),
        ];
        let p = &normalize(&rows, "acme.csv", &layout).products[0];
        assert_eq!(p.stock_code, "acme.csv-1");
        assert_eq!(p.company, "acme");
        assert_eq!(p.lowest_price, 80.0);
    }

    #[test]
    fn test_legacy_layout_ignores_shelf_price() {
        let layout = ColumnLayout::preset(LEGACY).unwrap();
        let rows = vec![
            row(&["h"]),
            row(&["L-1", "Acme", "Bolt M8", "pcs", "999", "12", "50", "img/bolt.png"]),
        ];
        let p = &normalize(&rows, "acme.csv", &layout).products[0];
        assert_eq!(p.list_price, 50.0);
        assert_eq!(p.lowest_price, 50.0);
        assert_eq!(p.image_path.as_deref(), Some("img/bolt.png"));
        assert!(!p.is_discounted());
    }

    #[test]
    fn test_extra_header_rows() {
        let mut layout = ColumnLayout::default();
        layout.header_rows = 2;
        let rows = vec![
            header(),
            row(&["A-0", "Acme", "Units Row", "", "1"]),
            row(&["A-1", "Acme", "Bolt M8", "", "10"]),
        ];
        let result = normalize(&rows, "a.csv", &layout);
        assert_eq!(result.products.len(), 1);
        assert_eq!(result.products[0].stock_code, "A-1");
    }

    fn data_row() -> impl Strategy<Value = (String, f64)> {
        ("[a-zA-Z]{0,6}", -50.0f64..50.0)
    }

    proptest! {
        #[test]
        fn prop_filter_excludes_short_names_and_non_positive_prices(
            fixtures in proptest::collection::vec(data_row(), 0..40)
        ) {
            let mut rows = vec![header()];
            for (name, price) in &fixtures {
                rows.push(vec![
                    Cell::text("S-1"),
                    Cell::text("Acme"),
                    Cell::text(name.clone()),
                    Cell::Empty,
                    Cell::Number(*price),
                ]);
            }

            let result = normalize_rows(&rows, "p.csv");
            let expected = fixtures
                .iter()
                .filter(|(name, price)| name.chars().count() > 2 && *price > 0.0)
                .count();

            prop_assert_eq!(result.products.len(), expected);
            prop_assert_eq!(result.products.len() + result.skipped.len(), fixtures.len());
            for p in &result.products {
                prop_assert!(p.product_name.chars().count() > 2);
                prop_assert!(p.list_price > 0.0);
                prop_assert!(p.lowest_price > 0.0);
            }
        }

        #[test]
        fn prop_lowest_price_is_min_positive_tier(
            list in 0.01f64..1000.0,
            tiers in proptest::collection::vec(proptest::option::of(-100.0f64..1000.0), 3)
        ) {
            let cell = |t: Option<f64>| t.map(Cell::Number).unwrap_or(Cell::Empty);
            let rows = vec![
                header(),
                vec![
                    Cell::text("S-1"),
                    Cell::text("Acme"),
                    Cell::text("Bolt M8"),
                    Cell::Empty,
                    Cell::Number(list),
                    cell(tiers[0]),
                    cell(tiers[1]),
                    cell(tiers[2]),
                ],
            ];

            let product = &normalize_rows(&rows, "p.csv").products[0];
            let positive: Vec<f64> = tiers.iter().flatten().copied().filter(|t| *t > 0.0).collect();
            let expected = positive.iter().copied().fold(f64::INFINITY, f64::min);
            let expected = if positive.is_empty() { list } else { expected };

            prop_assert_eq!(product.lowest_price, expected);
        }
    }
}
