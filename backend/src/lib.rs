//! # pricedepot - Supplier price list normalization and margin pricing
//!
//! pricedepot reads supplier price lists (xlsx, xls, ods, csv) whose columns
//! drift from supplier to supplier, normalizes their rows into one product
//! schema, searches across every uploaded supplier and computes sale prices
//! from a margin, an extra discount and a target currency.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ Upload bytes│────▶│   Parser    │────▶│  Normalize  │────▶│   Catalog   │
//! │ (xlsx/csv)  │     │ (auto-enc)  │     │  (layouts)  │     │  (search)   │
//! └─────────────┘     └─────────────┘     └─────────────┘     └──────┬──────┘
//!                                                                    ▼
//!                                                             ┌─────────────┐
//!                                                             │   Pricing   │
//!                                                             │ (rate table)│
//!                                                             └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pricedepot::{normalize_file, price, NormalizeOptions, StaticRates};
//!
//! let upload = normalize_file("acme.xlsx", &NormalizeOptions::default())?;
//! let quote = price(&upload.products[0], 20.0, 0.0, "USD", &StaticRates::default())?;
//! println!("{}", quote.display().formatted());
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Error types per concern
//! - [`models`] - Product, upload and calculation record
//! - [`parser`] - Spreadsheet decoding with format, encoding and delimiter detection
//! - [`normalize`] - Column layouts, row normalization and the pipeline
//! - [`pricing`] - Margin pricing and rate tables
//! - [`catalog`] - Upload batches, removal, search
//! - [`registry`] - Stored custom layouts
//! - [`validation`] - JSON schema checks for layouts and rate tables
//! - [`config`] - Environment configuration
//! - [`api`] - HTTP API server and log streaming

// Core modules
pub mod error;
pub mod models;

// Decoding
pub mod parser;

// Normalization
pub mod normalize;

// Pricing
pub mod pricing;

// Catalog
pub mod catalog;

// Layout storage
pub mod registry;

// Validation
pub mod validation;

// Configuration
pub mod config;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ConfigError, LayoutError, PipelineError, PricingError, ServerError, SheetError, UploadError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{lowest_price, CalculationRecord, Product, UploadedFile};

// =============================================================================
// Re-exports - Decoding
// =============================================================================

pub use parser::{
    decode_content, detect_delimiter, detect_encoding, detect_format, parse_bytes_auto,
    Cell, Sheet, SheetFormat,
};

// =============================================================================
// Re-exports - Normalization
// =============================================================================

pub use normalize::{
    normalize, normalize_bytes, normalize_file, normalize_rows, parse_number, ColumnLayout,
    ColumnMap, LayoutChoice, NormalizeOptions, NormalizeResult, NormalizedUpload, SkipReason,
    SkippedRow,
};

// =============================================================================
// Re-exports - Pricing
// =============================================================================

pub use pricing::{
    convert_from_currency, convert_to_currency, price, price_all, selling_price, PriceQuote,
    RateTable, StaticRates,
};

// =============================================================================
// Re-exports - Catalog
// =============================================================================

pub use catalog::{
    BatchOutcome, Catalog, CatalogStats, FileOutcome, IncomingFile, RemoveOutcome,
    DEFAULT_SEARCH_LIMIT, MAX_UPLOADED_FILES,
};

// =============================================================================
// Re-exports - Registry
// =============================================================================

pub use registry::{LayoutRegistry, StoredLayout};

// =============================================================================
// Re-exports - Validation
// =============================================================================

pub use validation::{is_valid, validate, validate_layout, validate_rate_table};

// =============================================================================
// Re-exports - Configuration
// =============================================================================

pub use config::AppConfig;

// Server
pub mod server {
    pub use crate::api::server::{router, start_server, AppState};
}
