//! Spreadsheet normalization: sheet rows to catalog products.
//!
//! - [`cells`] - lenient text and number coercion
//! - [`layout`] - positional column layouts and presets
//! - [`normalizer`] - row acceptance and product construction
//! - [`pipeline`] - bytes to products, with layout resolution

pub mod cells;
pub mod layout;
pub mod normalizer;
pub mod pipeline;

pub use cells::{cell_number, cell_text, parse_number};
pub use layout::{ColumnLayout, ColumnMap, Field};
pub use normalizer::{normalize, normalize_row, normalize_rows, NormalizeResult, SkipReason, SkippedRow};
pub use pipeline::{
    normalize_bytes, normalize_file, normalize_sheet, LayoutChoice, NormalizeOptions, NormalizedUpload,
    SheetInfo,
};
