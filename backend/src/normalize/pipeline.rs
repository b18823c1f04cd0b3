//! High-level pipeline: upload bytes to normalized products.
//!
//! Combines decoding, layout resolution and row normalization, logging each
//! step to the broadcaster.
//!
//! # Example
//!
//! ```rust,ignore
//! use pricedepot::normalize::{normalize_file, NormalizeOptions};
//!
//! let upload = normalize_file("acme.xlsx", &NormalizeOptions::default())?;
//! println!("{} products via {}", upload.products.len(), upload.layout);
//! ```

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::layout::{ColumnLayout, DEFAULT_PRESET, MIN_HINT_SCORE};
use super::normalizer::{normalize, NormalizeResult, SkippedRow};
use crate::api::logs::{log_info, log_info_indent, log_success, log_warning, log_warning_indent};
use crate::error::{LayoutError, PipelineResult};
use crate::models::Product;
use crate::parser::{parse_bytes_auto, Sheet, SheetFormat};
use crate::registry::{LayoutRegistry, DEFAULT_REGISTRY_DIR};

/// How the column layout for an upload is chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutChoice {
    /// A built-in preset by name
    Preset(String),
    /// A layout from the registry by ID
    Stored(String),
    /// A layout JSON file
    File(PathBuf),
    /// Pick by header row, falling back to the default preset
    Auto,
}

impl Default for LayoutChoice {
    fn default() -> Self {
        LayoutChoice::Preset(DEFAULT_PRESET.to_string())
    }
}

impl fmt::Display for LayoutChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutChoice::Preset(name) => f.write_str(name),
            LayoutChoice::Stored(id) => write!(f, "stored:{}", id),
            LayoutChoice::File(path) => write!(f, "{}", path.display()),
            LayoutChoice::Auto => f.write_str("auto"),
        }
    }
}

impl FromStr for LayoutChoice {
    type Err = LayoutError;

    /// `auto`, `stored:<id>`, a preset name, or a path to a `.json` file.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("auto") {
            return Ok(LayoutChoice::Auto);
        }
        if let Some(id) = s.strip_prefix("stored:") {
            if id.is_empty() {
                return Err(LayoutError::Invalid("empty stored layout id".into()));
            }
            return Ok(LayoutChoice::Stored(id.to_string()));
        }
        if s.ends_with(".json") || s.contains('/') || s.contains('\\') {
            return Ok(LayoutChoice::File(PathBuf::from(s)));
        }

        let preset = ColumnLayout::preset(s)?;
        Ok(LayoutChoice::Preset(preset.name))
    }
}

/// Options for the normalization pipeline
#[derive(Debug, Clone)]
pub struct NormalizeOptions {
    pub layout: LayoutChoice,
    /// Where stored layouts live
    pub registry_dir: PathBuf,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            layout: LayoutChoice::default(),
            registry_dir: PathBuf::from(DEFAULT_REGISTRY_DIR),
        }
    }
}

impl NormalizeOptions {
    pub fn with_layout(layout: LayoutChoice) -> Self {
        Self {
            layout,
            ..Self::default()
        }
    }
}

/// How the sheet was read
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetInfo {
    pub format: SheetFormat,
    pub encoding: Option<String>,
    pub delimiter: Option<char>,
    pub headers: Vec<String>,
    pub row_count: usize,
}

impl SheetInfo {
    fn of(sheet: &Sheet) -> Self {
        Self {
            format: sheet.format,
            encoding: sheet.encoding.clone(),
            delimiter: sheet.delimiter,
            headers: sheet.headers(),
            row_count: sheet.data_row_count(),
        }
    }
}

/// Result of normalizing one upload
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedUpload {
    pub products: Vec<Product>,
    pub skipped: Vec<SkippedRow>,
    pub blank_rows: usize,
    /// Name of the layout that produced the products
    pub layout: String,
    /// Registry ID when a stored layout was used
    pub layout_id: Option<String>,
    pub sheet: SheetInfo,
}

/// Normalize a spreadsheet file. The file name becomes the source file.
pub fn normalize_file(path: impl AsRef<Path>, options: &NormalizeOptions) -> PipelineResult<NormalizedUpload> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(crate::error::SheetError::from)?;
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string());
    normalize_bytes(&bytes, &filename, options)
}

/// Normalize raw upload bytes.
pub fn normalize_bytes(bytes: &[u8], filename: &str, options: &NormalizeOptions) -> PipelineResult<NormalizedUpload> {
    log_info(format!("📖 Reading {}...", filename));
    let sheet = parse_bytes_auto(bytes)?;
    print_sheet_info(&sheet);
    normalize_sheet(&sheet, filename, options)
}

/// Normalize an already decoded sheet.
pub fn normalize_sheet(sheet: &Sheet, filename: &str, options: &NormalizeOptions) -> PipelineResult<NormalizedUpload> {
    let (layout, layout_id, result) = match &options.layout {
        LayoutChoice::Preset(name) => {
            let layout = ColumnLayout::preset(name)?;
            let result = normalize(&sheet.rows, filename, &layout);
            (layout, None, result)
        }
        LayoutChoice::File(path) => {
            log_info(format!("Using layout file: {}", path.display()));
            let content = fs::read_to_string(path).map_err(LayoutError::from)?;
            let layout = ColumnLayout::from_json(&content)?;
            let result = normalize(&sheet.rows, filename, &layout);
            (layout, None, result)
        }
        LayoutChoice::Stored(id) => {
            let mut registry = LayoutRegistry::with_dir(&options.registry_dir);
            let layout = registry
                .get(id)
                .map(|stored| stored.layout.clone())
                .ok_or_else(|| LayoutError::NotFound(id.clone()))?;
            let result = normalize(&sheet.rows, filename, &layout);
            record_use(&mut registry, id, &result);
            (layout, Some(id.clone()), result)
        }
        LayoutChoice::Auto => resolve_auto(sheet, filename, &options.registry_dir),
    };

    log_info(format!("🗺️  Layout: {}", layout.name));
    print_normalize_result(&result);

    Ok(NormalizedUpload {
        products: result.products,
        skipped: result.skipped,
        blank_rows: result.blank_rows,
        layout: layout.name,
        layout_id,
        sheet: SheetInfo::of(sheet),
    })
}

/// Try compatible layouts in score order and keep the first that accepts a product.
///
/// Stored layouts come first (sorted by compatibility and success rate), then
/// presets whose header hints match. Falls back to the default preset.
fn resolve_auto(
    sheet: &Sheet,
    filename: &str,
    registry_dir: &Path,
) -> (ColumnLayout, Option<String>, NormalizeResult) {
    let headers = sheet.headers();
    log_info("Looking for a matching layout...");

    let mut registry = LayoutRegistry::with_dir(registry_dir);
    let stored: Vec<(String, ColumnLayout, f64)> = registry
        .find_compatible(&headers)
        .into_iter()
        .map(|(s, score)| (s.id.clone(), s.layout.clone(), score))
        .collect();

    for (id, layout, score) in stored {
        log_info_indent(
            format!("→ Trying stored layout {} (score: {:.0}%)", layout.name, score * 100.0),
            1,
        );
        let result = normalize(&sheet.rows, filename, &layout);
        record_use(&mut registry, &id, &result);
        if !result.products.is_empty() {
            log_success(format!("✅ Stored layout \"{}\" worked!", layout.name));
            return (layout, Some(id), result);
        }
    }

    let mut presets: Vec<(ColumnLayout, f64)> = ColumnLayout::presets()
        .into_iter()
        .map(|layout| {
            let score = layout.hint_score(&headers);
            (layout, score)
        })
        .filter(|(_, score)| *score > MIN_HINT_SCORE)
        .collect();
    presets.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    for (layout, score) in presets {
        log_info_indent(
            format!("→ Trying preset {} (score: {:.0}%)", layout.name, score * 100.0),
            1,
        );
        let result = normalize(&sheet.rows, filename, &layout);
        if !result.products.is_empty() {
            return (layout, None, result);
        }
    }

    log_warning(format!("No layout matched, falling back to {}", DEFAULT_PRESET));
    let layout = ColumnLayout::default();
    let result = normalize(&sheet.rows, filename, &layout);
    (layout, None, result)
}

fn record_use(registry: &mut LayoutRegistry, id: &str, result: &NormalizeResult) {
    if let Err(e) = registry.update_stats(id, !result.products.is_empty()) {
        log_warning(format!("Could not update layout stats: {}", e));
    }
}

fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "TAB".to_string(),
        other => other.to_string(),
    }
}

fn print_sheet_info(sheet: &Sheet) {
    match sheet.format {
        SheetFormat::Workbook => log_success("Detected workbook, reading first sheet"),
        SheetFormat::Delimited => {
            if let Some(encoding) = &sheet.encoding {
                log_success(format!("Detected encoding: {}", encoding));
            }
            if let Some(delimiter) = sheet.delimiter {
                log_success(format!("Detected separator: '{}'", format_delimiter(delimiter)));
            }
        }
    }
    log_success(format!("Read {} data rows", sheet.data_row_count()));
}

fn print_normalize_result(result: &NormalizeResult) {
    log_success(format!("{} products accepted", result.products.len()));

    if result.skipped.is_empty() {
        return;
    }
    log_warning(format!("{} rows skipped", result.skipped.len()));

    let mut reasons: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for skip in &result.skipped {
        reasons.entry(skip.reason.to_string()).or_default().push(skip.row);
    }

    for (reason, rows) in reasons.iter().take(5) {
        let sample: Vec<String> = rows.iter().take(5).map(|r| r.to_string()).collect();
        let more = if rows.len() > 5 {
            format!("... +{}", rows.len() - 5)
        } else {
            String::new()
        };
        log_warning_indent(format!("• {} (rows: {}{})", reason, sample.join(", "), more), 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::normalize::layout::{ColumnMap, COMPACT, LEGACY, STANDARD};
    use tempfile::tempdir;

    const STANDARD_CSV: &str = "STOK KODU;FİRMA;ÜRÜN ADI;BİRİM;LİSTE FİYATI;%5;%10;%15;KDV\n\
        A-1;Acme;Bolt M8;pcs;100;95;90;;20\n\
        A-2;Acme;Nut M8;pcs;12,50;;;;20\n";

    const LEGACY_CSV: &str = "Stok Kodu,Firma,Ürün Adı,Birim,Raf Fiyatı,İskonto Oranı,Liste Fiyatı,Resim\n\
        L-1,Acme,Hinge,pcs,80,10,50,img/h.png\n";

    fn options(layout: LayoutChoice, dir: &Path) -> NormalizeOptions {
        NormalizeOptions {
            layout,
            registry_dir: dir.to_path_buf(),
        }
    }

    #[test]
    fn test_layout_choice_parsing() {
        assert_eq!("auto".parse::<LayoutChoice>().unwrap(), LayoutChoice::Auto);
        assert_eq!(
            "Legacy".parse::<LayoutChoice>().unwrap(),
            LayoutChoice::Preset(LEGACY.to_string())
        );
        assert_eq!(
            "stored:acme-1".parse::<LayoutChoice>().unwrap(),
            LayoutChoice::Stored("acme-1".to_string())
        );
        assert_eq!(
            "layouts/acme.json".parse::<LayoutChoice>().unwrap(),
            LayoutChoice::File(PathBuf::from("layouts/acme.json"))
        );
        assert!("wide".parse::<LayoutChoice>().is_err());
        assert!("stored:".parse::<LayoutChoice>().is_err());
        assert_eq!(LayoutChoice::default().to_string(), STANDARD);
    }

    #[test]
    fn test_normalize_bytes_default_layout() {
        let dir = tempdir().unwrap();
        let upload = normalize_bytes(
            STANDARD_CSV.as_bytes(),
            "acme.csv",
            &options(LayoutChoice::default(), dir.path()),
        )
        .unwrap();

        assert_eq!(upload.layout, STANDARD);
        assert_eq!(upload.products.len(), 2);
        assert_eq!(upload.products[1].list_price, 12.5);
        assert_eq!(upload.sheet.delimiter, Some(';'));
        assert_eq!(upload.sheet.row_count, 2);
        assert_eq!(upload.sheet.format, SheetFormat::Delimited);
    }

    #[test]
    fn test_auto_picks_legacy_by_headers() {
        let dir = tempdir().unwrap();
        let upload = normalize_bytes(
            LEGACY_CSV.as_bytes(),
            "acme.csv",
            &options(LayoutChoice::Auto, dir.path()),
        )
        .unwrap();

        assert_eq!(upload.layout, LEGACY);
        assert_eq!(upload.products[0].list_price, 50.0);
        assert_eq!(upload.products[0].image_path.as_deref(), Some("img/h.png"));
    }

    #[test]
    fn test_auto_falls_back_to_standard() {
        let dir = tempdir().unwrap();
        let csv = "a;b;c;d;e\nX-1;Acme;Bolt M8;pcs;10\n";
        let upload = normalize_bytes(csv.as_bytes(), "x.csv", &options(LayoutChoice::Auto, dir.path()))
            .unwrap();
        assert_eq!(upload.layout, STANDARD);
        assert_eq!(upload.products.len(), 1);
    }

    #[test]
    fn test_auto_prefers_stored_layout() {
        let dir = tempdir().unwrap();
        let mut registry = LayoutRegistry::with_dir(dir.path());
        let mut columns = ColumnMap::new(1, 0);
        columns.stock_code = Some(2);
        let id = registry
            .save(
                ColumnLayout::new("price-first", columns),
                Some(vec!["Price".into(), "Item".into(), "Code".into()]),
            )
            .unwrap();

        let csv = "Price,Item,Code\n15,Bolt M8,B-1\n";
        let upload = normalize_bytes(csv.as_bytes(), "p.csv", &options(LayoutChoice::Auto, dir.path()))
            .unwrap();

        assert_eq!(upload.layout_id.as_deref(), Some(id.as_str()));
        assert_eq!(upload.products[0].stock_code, "B-1");
        assert_eq!(upload.products[0].list_price, 15.0);

        let registry = LayoutRegistry::with_dir(dir.path());
        assert_eq!(registry.get(&id).unwrap().use_count, 1);
    }

    #[test]
    fn test_layout_file_and_missing_stored() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("compact.json");
        fs::write(&file, ColumnLayout::preset(COMPACT).unwrap().to_json().unwrap()).unwrap();

        let csv = "Ad,Birim,Fiyat\nBolt M8,pcs,7\n";
        let upload = normalize_bytes(
            csv.as_bytes(),
            "c.csv",
            &options(LayoutChoice::File(file), dir.path()),
        )
        .unwrap();
        assert_eq!(upload.layout, COMPACT);
        assert_eq!(upload.products[0].stock_code, "c.csv-1");

        let err = normalize_bytes(
            csv.as_bytes(),
            "c.csv",
            &options(LayoutChoice::Stored("nope".into()), dir.path()),
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::Layout(LayoutError::NotFound(_))));
    }

    #[test]
    fn test_workbook_at_a1() {
        let dir = tempdir().unwrap();
        let bytes = include_bytes!("../../tests/fixtures/price-list-a1.xlsx");
        let upload = normalize_bytes(bytes, "acme.xlsx", &options(LayoutChoice::default(), dir.path())).unwrap();

        assert_eq!(upload.sheet.format, SheetFormat::Workbook);
        assert_eq!(upload.products.len(), 2);
        assert_eq!(upload.products[0].stock_code, "A-1");
        assert_eq!(upload.products[0].lowest_price, 90.0);
        assert_eq!(upload.products[0].vat_rate, Some(20.0));
        assert_eq!(upload.products[1].list_price, 12.5);
        assert_eq!(upload.skipped.len(), 1);
        assert_eq!(upload.skipped[0].row, 3);
    }

    #[test]
    fn test_workbook_starting_at_b2() {
        let dir = tempdir().unwrap();
        let bytes = include_bytes!("../../tests/fixtures/price-list-b2.xlsx");
        let upload = normalize_bytes(bytes, "beta.xlsx", &options(LayoutChoice::default(), dir.path())).unwrap();

        let codes: Vec<&str> = upload.products.iter().map(|p| p.stock_code.as_str()).collect();
        assert_eq!(codes, ["B-1", "B-2"]);
        assert_eq!(upload.products[0].product_name, "Bolt M10");
        assert_eq!(upload.products[0].company, "Beta");
        assert_eq!(upload.products[1].list_price, 4.5);
        assert_eq!(upload.blank_rows, 1);
        assert!(upload.skipped.is_empty());
    }

    #[test]
    fn test_corrupt_workbook_is_sheet_error() {
        let dir = tempdir().unwrap();
        let mut bytes = b"PK\x03\x04".to_vec();
        bytes.extend_from_slice(b"definitely not a zip archive");
        let err = normalize_bytes(&bytes, "bad.xlsx", &options(LayoutChoice::default(), dir.path()))
            .unwrap_err();
        assert!(matches!(err, PipelineError::Sheet(_)));
    }

    #[test]
    fn test_normalize_file_uses_file_name() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("supplier.csv");
        fs::write(&path, STANDARD_CSV).unwrap();

        let upload = normalize_file(&path, &options(LayoutChoice::default(), dir.path())).unwrap();
        assert!(upload.products.iter().all(|p| p.source_file == "supplier.csv"));
    }
}
