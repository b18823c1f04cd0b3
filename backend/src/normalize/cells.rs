//! Cell coercion rules shared by every layout.
//!
//! Numbers are read leniently: locale decimal commas, grouping separators and
//! trailing units ("12,50 TL") are accepted, anything unreadable becomes 0.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::parser::Cell;

static NUMERIC_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?(?:\d+(?:\.\d*)?|\.\d+)(?:[eE][+-]?\d+)?")
        .expect("numeric prefix pattern is valid")
});

/// Cell as trimmed text. Absent cells read as the empty string.
pub fn cell_text(cell: Option<&Cell>) -> String {
    cell.map(|c| c.to_string().trim().to_string())
        .unwrap_or_default()
}

/// Cell as a finite number, 0 when absent, empty or unparseable.
pub fn cell_number(cell: Option<&Cell>) -> f64 {
    match cell {
        Some(Cell::Number(n)) if n.is_finite() => *n,
        Some(Cell::Text(s)) => parse_number(s),
        _ => 0.0,
    }
}

/// Parse a locale-formatted number.
///
/// `"12,5"` and `"1.234,56"` read as 12.5 and 1234.56. When both `.` and `,`
/// occur the last one is the decimal separator; a separator repeated on its own
/// is grouping. The longest numeric prefix is used.
pub fn parse_number(raw: &str) -> f64 {
    let normalized = normalize_separators(raw);
    NUMERIC_PREFIX
        .find(&normalized)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|n| n.is_finite())
        .unwrap_or(0.0)
}

fn normalize_separators(raw: &str) -> String {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();

    match (compact.rfind(','), compact.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => compact.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => compact.replace(',', ""),
        (Some(_), None) if compact.matches(',').count() > 1 => compact.replace(',', ""),
        (Some(_), None) => compact.replace(',', "."),
        (None, Some(_)) if compact.matches('.').count() > 1 => compact.replace('.', ""),
        _ => compact,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comma_decimal() {
        assert_eq!(parse_number("12,50"), 12.5);
        assert_eq!(parse_number("12,5"), 12.5);
    }

    #[test]
    fn test_grouped_thousands() {
        assert_eq!(parse_number("1.234,56"), 1234.56);
        assert_eq!(parse_number("1,234.56"), 1234.56);
        assert_eq!(parse_number("1.234.567"), 1234567.0);
        assert_eq!(parse_number("1 234,56"), 1234.56);
    }

    #[test]
    fn test_trailing_unit_is_ignored() {
        assert_eq!(parse_number("12,50 TL"), 12.5);
        assert_eq!(parse_number("%18"), 0.0);
    }

    #[test]
    fn test_unparseable_is_zero() {
        assert_eq!(parse_number(""), 0.0);
        assert_eq!(parse_number("abc"), 0.0);
        assert_eq!(parse_number("-"), 0.0);
    }

    #[test]
    fn test_negative_and_plain() {
        assert_eq!(parse_number("-3.5"), -3.5);
        assert_eq!(parse_number("42"), 42.0);
    }

    #[test]
    fn test_cell_number() {
        assert_eq!(cell_number(Some(&Cell::Number(9.9))), 9.9);
        assert_eq!(cell_number(Some(&Cell::Number(f64::NAN))), 0.0);
        assert_eq!(cell_number(Some(&Cell::Text("7,25".into()))), 7.25);
        assert_eq!(cell_number(Some(&Cell::Bool(true))), 0.0);
        assert_eq!(cell_number(None), 0.0);
    }

    #[test]
    fn test_cell_text() {
        assert_eq!(cell_text(Some(&Cell::Text("  Bolt M8  ".into()))), "Bolt M8");
        assert_eq!(cell_text(Some(&Cell::Number(1001.0))), "1001");
        assert_eq!(cell_text(Some(&Cell::Empty)), "");
        assert_eq!(cell_text(None), "");
    }
}
