//! JSON Schema validation for user-supplied configuration.
//!
//! # Embedded Schemas
//!
//! Schemas are embedded at compile time from the `schemas/` directory:
//! - `column-layout.json` - custom column layouts
//! - `rate-table.json` - currency rate tables
//!
//! # Example
//!
//! ```rust,ignore
//! use serde_json::json;
//! use pricedepot::validation::validate_rate_table;
//!
//! let table = json!({ "base": "TRY", "rates": { "TRY": 1, "USD": 0.031 } });
//! assert!(validate_rate_table(&table).is_ok());
//! ```

use once_cell::sync::Lazy;
use serde_json::Value;

static LAYOUT_SCHEMA: Lazy<Value> = Lazy::new(|| {
    serde_json::from_str(include_str!("../../schemas/column-layout.json"))
        .expect("embedded layout schema is valid JSON")
});

static RATE_TABLE_SCHEMA: Lazy<Value> = Lazy::new(|| {
    serde_json::from_str(include_str!("../../schemas/rate-table.json"))
        .expect("embedded rate table schema is valid JSON")
});

/// Validate a JSON value against a schema (draft 7).
///
/// # Returns
/// * `Ok(())` if valid
/// * `Err(Vec<String>)` with one message per violation
pub fn validate(schema: &Value, data: &Value) -> Result<(), Vec<String>> {
    let validator = jsonschema::draft7::new(schema)
        .map_err(|e| vec![format!("Invalid schema: {}", e)])?;

    let errors: Vec<String> = validator
        .iter_errors(data)
        .map(|e| e.to_string())
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Quick check without collecting messages.
pub fn is_valid(schema: &Value, data: &Value) -> bool {
    jsonschema::draft7::is_valid(schema, data)
}

/// Validate a column layout definition.
pub fn validate_layout(data: &Value) -> Result<(), Vec<String>> {
    validate(&LAYOUT_SCHEMA, data)
}

/// Validate a rate table definition.
pub fn validate_rate_table(data: &Value) -> Result<(), Vec<String>> {
    validate(&RATE_TABLE_SCHEMA, data)
}
