//! Error types for the price list pipeline.
//!
//! One enum per concern:
//!
//! - [`SheetError`] - the uploaded bytes cannot be read as a spreadsheet
//! - [`UploadError`] - catalog admission failures (duplicate name, capacity)
//! - [`PricingError`] - inputs that make the selling price undefined
//! - [`LayoutError`] - column layout presets, files and registry
//! - [`ConfigError`] - environment and rate table configuration
//! - [`ServerError`] - HTTP layer
//!
//! Rows that fail the acceptance filter are not errors; they are reported as
//! [`crate::normalize::SkippedRow`] entries.

use thiserror::Error;

// =============================================================================
// Sheet Decoding Errors
// =============================================================================

/// The byte stream cannot be decoded as a spreadsheet.
///
/// Fatal for the file it concerns only; sibling files in a batch continue.
#[derive(Debug, Error)]
pub enum SheetError {
    /// Failed to read file.
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    /// Text content could not be decoded.
    #[error("Failed to decode content: {0}")]
    Encoding(String),

    /// The workbook container is corrupt or unsupported.
    #[error("Unreadable workbook: {0}")]
    Workbook(String),

    /// The workbook has no worksheet to read.
    #[error("Workbook contains no sheets")]
    NoSheets,

    /// Delimited text could not be split into records.
    #[error("Invalid delimited text at record {record}: {message}")]
    Delimited { record: usize, message: String },
}

impl From<calamine::Error> for SheetError {
    fn from(err: calamine::Error) -> Self {
        SheetError::Workbook(err.to_string())
    }
}

// =============================================================================
// Upload Errors
// =============================================================================

/// Catalog admission errors.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum UploadError {
    /// A file with the same name is already held.
    #[error("File already uploaded: {name}")]
    Duplicate { name: String },

    /// The batch would push the catalog past its file ceiling.
    #[error("Upload limit exceeded: {held} held + {incoming} incoming > {limit}")]
    CapacityExceeded {
        held: usize,
        incoming: usize,
        limit: usize,
    },
}

// =============================================================================
// Pricing Errors
// =============================================================================

/// Inputs the pricing formula cannot handle.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PricingError {
    /// Margin of 100% or more divides by zero or flips the sign.
    #[error("Invalid margin {0}%: must be a finite value below 100")]
    InvalidMargin(f64),

    /// Discount is not a finite number.
    #[error("Invalid discount {0}%: must be a finite value")]
    InvalidDiscount(f64),
}

// =============================================================================
// Layout Errors
// =============================================================================

/// Errors from column layouts and the layout registry.
#[derive(Debug, Error)]
pub enum LayoutError {
    /// No built-in preset with that name.
    #[error("Unknown layout preset: {0}")]
    UnknownPreset(String),

    /// Stored layout not found.
    #[error("Layout not found: {0}")]
    NotFound(String),

    /// Layout definition is structurally invalid.
    #[error("Invalid layout: {0}")]
    Invalid(String),

    /// Layout JSON does not match the layout schema.
    #[error("Layout failed schema validation: {errors:?}")]
    Schema { errors: Vec<String> },

    /// IO error.
    #[error("Layout IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("Layout JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Pipeline Errors
// =============================================================================

/// Errors from decoding and normalizing one upload.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The bytes are not a readable sheet.
    #[error(transparent)]
    Sheet(#[from] SheetError),

    /// The requested layout could not be resolved.
    #[error(transparent)]
    Layout(#[from] LayoutError),
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Environment variable holds an unusable value.
    #[error("Invalid value for {key}: {value}")]
    InvalidVar { key: String, value: String },

    /// Rate table file could not be read.
    #[error("Cannot read rate table: {0}")]
    RatesIo(#[from] std::io::Error),

    /// Rate table file is not valid JSON.
    #[error("Invalid rate table JSON: {0}")]
    RatesJson(#[from] serde_json::Error),

    /// Rate table failed schema validation.
    #[error("Rate table failed schema validation: {errors:?}")]
    RatesSchema { errors: Vec<String> },

    /// Layout setting could not be resolved.
    #[error("Layout error: {0}")]
    Layout(#[from] LayoutError),
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Upload admission error.
    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    /// Pricing error.
    #[error("Pricing error: {0}")]
    Pricing(#[from] PricingError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Requested resource does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Listener or IO failure.
    #[error("Server IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A blocking decode task panicked or was cancelled.
    #[error("Decode task failed: {0}")]
    Task(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for sheet decoding.
pub type SheetResult<T> = Result<T, SheetError>;

/// Result type for pricing.
pub type PricingResult<T> = Result<T, PricingError>;

/// Result type for layout operations.
pub type LayoutResult<T> = Result<T, LayoutError>;

/// Result type for the normalization pipeline.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        let pricing_err = PricingError::InvalidMargin(100.0);
        let server_err: ServerError = pricing_err.into();
        assert!(server_err.to_string().contains("100"));

        let layout_err = LayoutError::UnknownPreset("wide".into());
        let config_err: ConfigError = layout_err.into();
        assert!(config_err.to_string().contains("wide"));
    }

    #[test]
    fn test_capacity_error_format() {
        let err = UploadError::CapacityExceeded {
            held: 29,
            incoming: 2,
            limit: 30,
        };
        let msg = err.to_string();
        assert!(msg.contains("29"));
        assert!(msg.contains("30"));
    }

    #[test]
    fn test_sheet_error_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.xlsx");
        let err: SheetError = io.into();
        assert!(err.to_string().contains("missing.xlsx"));
    }
}
