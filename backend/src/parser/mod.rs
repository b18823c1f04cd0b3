//! Spreadsheet decoding: raw upload bytes into a grid of loosely typed cells.
//!
//! Binary workbooks (xlsx, xls, xlsb, ods) are read with calamine, first sheet
//! only. Anything else is treated as delimited text with encoding and
//! delimiter auto-detection. No price list logic lives here.

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use serde::Serialize;
use std::fmt;
use std::io::Cursor;

use crate::error::{SheetError, SheetResult};

/// ZIP local file header, used by xlsx/xlsb/ods containers.
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// Compound File Binary header, used by legacy xls.
const CFB_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// A single cell value as read from the sheet.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
    Bool(bool),
    Empty,
}

impl Cell {
    /// Build a text cell; whitespace-only text becomes [`Cell::Empty`].
    pub fn text(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.trim().is_empty() {
            Cell::Empty
        } else {
            Cell::Text(value)
        }
    }

    /// True for empty cells and whitespace-only text.
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Number(_) | Cell::Bool(_) => false,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Text(s) => f.write_str(s),
            Cell::Number(n) => write!(f, "{}", n),
            Cell::Bool(b) => write!(f, "{}", b),
            Cell::Empty => Ok(()),
        }
    }
}

impl From<&Data> for Cell {
    fn from(data: &Data) -> Self {
        match data {
            Data::String(s) => Cell::text(s.as_str()),
            Data::Float(f) => Cell::Number(*f),
            Data::Int(i) => Cell::Number(*i as f64),
            Data::Bool(b) => Cell::Bool(*b),
            Data::DateTime(dt) => Cell::Number(dt.as_f64()),
            Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::text(s.as_str()),
            Data::Error(_) | Data::Empty => Cell::Empty,
        }
    }
}

/// Container format of an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SheetFormat {
    /// xlsx / xlsb / ods (ZIP) or xls (CFB)
    Workbook,
    /// csv, tsv and other delimited text
    Delimited,
}

impl fmt::Display for SheetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SheetFormat::Workbook => f.write_str("workbook"),
            SheetFormat::Delimited => f.write_str("delimited"),
        }
    }
}

/// A decoded sheet with metadata about how it was read.
#[derive(Debug, Clone)]
pub struct Sheet {
    /// Rows of cells; row 0 is the header row
    pub rows: Vec<Vec<Cell>>,
    /// Detected container format
    pub format: SheetFormat,
    /// Text encoding, delimited text only
    pub encoding: Option<String>,
    /// Field delimiter, delimited text only
    pub delimiter: Option<char>,
}

impl Sheet {
    /// Header row rendered as trimmed strings.
    pub fn headers(&self) -> Vec<String> {
        self.rows
            .first()
            .map(|row| row.iter().map(|c| c.to_string().trim().to_string()).collect())
            .unwrap_or_default()
    }

    /// Number of rows after the header.
    pub fn data_row_count(&self) -> usize {
        self.rows.len().saturating_sub(1)
    }
}

/// Detect the container format from the leading bytes.
pub fn detect_format(bytes: &[u8]) -> SheetFormat {
    if bytes.starts_with(ZIP_MAGIC) || bytes.starts_with(CFB_MAGIC) {
        SheetFormat::Workbook
    } else {
        SheetFormat::Delimited
    }
}

/// Detect the encoding of raw bytes using chardet.
///
/// Valid UTF-8 is taken as is. Otherwise always returns a label `encoding_rs`
/// understands, falling back to UTF-8.
pub fn detect_encoding(bytes: &[u8]) -> String {
    if std::str::from_utf8(bytes).is_ok() {
        return "utf-8".to_string();
    }

    let result = chardet::detect(bytes);
    let charset = result.0.to_lowercase();

    let normalized = match charset.as_str() {
        "ascii" | "utf-8" | "utf8" | "" => "utf-8".to_string(),
        "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "cp1252" => "windows-1252".to_string(),
        "cp1254" => "windows-1254".to_string(),
        _ => charset,
    };

    match encoding_rs::Encoding::for_label(normalized.as_bytes()) {
        Some(_) => normalized,
        None => "utf-8".to_string(),
    }
}

/// Decode bytes to a string using the given encoding label.
///
/// A byte order mark overrides the label. Invalid sequences are replaced.
pub fn decode_content(bytes: &[u8], encoding: &str) -> SheetResult<String> {
    let encoding = encoding_rs::Encoding::for_label(encoding.trim().as_bytes())
        .ok_or_else(|| SheetError::Encoding(format!("unknown encoding '{}'", encoding)))?;
    let (text, _, _) = encoding.decode(bytes);
    Ok(text.into_owned())
}

/// Detect the delimiter by counting occurrences in the first line.
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [';', ',', '\t', '|'];
    let mut best_sep = ';';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Split delimited text into rows of text cells.
///
/// Rows keep their own length; quoting follows RFC 4180.
pub fn parse_delimited(content: &str, delimiter: char) -> SheetResult<Vec<Vec<Cell>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter as u8)
        .from_reader(content.as_bytes());

    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record.map_err(|e| SheetError::Delimited {
            record: idx + 1,
            message: e.to_string(),
        })?;
        rows.push(record.iter().map(Cell::text).collect());
    }

    Ok(rows)
}

/// Read the first worksheet of a binary workbook.
///
/// Rows and columns are relative to the used range: the first used row is
/// row 0 and the first used column is index 0, wherever the sheet starts.
pub fn parse_workbook(bytes: &[u8]) -> SheetResult<Vec<Vec<Cell>>> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;
    let range = workbook.worksheet_range_at(0).ok_or(SheetError::NoSheets)??;

    Ok(range
        .rows()
        .map(|row| row.iter().map(Cell::from).collect())
        .collect())
}

/// Decode upload bytes with format, encoding and delimiter auto-detection.
pub fn parse_bytes_auto(bytes: &[u8]) -> SheetResult<Sheet> {
    match detect_format(bytes) {
        SheetFormat::Workbook => Ok(Sheet {
            rows: parse_workbook(bytes)?,
            format: SheetFormat::Workbook,
            encoding: None,
            delimiter: None,
        }),
        SheetFormat::Delimited => {
            let encoding = detect_encoding(bytes);
            let content = decode_content(bytes, &encoding)?;
            let delimiter = detect_delimiter(&content);
            Ok(Sheet {
                rows: parse_delimited(&content, delimiter)?,
                format: SheetFormat::Delimited,
                encoding: Some(encoding),
                delimiter: Some(delimiter),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_delimited() {
        let rows = parse_delimited("code;name\nA1;Bolt\nA2;Nut", ';').unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1][0], Cell::Text("A1".into()));
        assert_eq!(rows[2][1], Cell::Text("Nut".into()));
    }

    #[test]
    fn test_quoted_values_keep_delimiters() {
        let rows = parse_delimited("a,b\n\"Bolt, M8\",\"12,50\"", ',').unwrap();

        assert_eq!(rows[1][0], Cell::Text("Bolt, M8".into()));
        assert_eq!(rows[1][1], Cell::Text("12,50".into()));
    }

    #[test]
    fn test_ragged_rows_and_blank_cells() {
        let rows = parse_delimited("a;b;c\n1;;3\n4", ';').unwrap();

        assert_eq!(rows[1].len(), 3);
        assert_eq!(rows[1][1], Cell::Empty);
        assert_eq!(rows[2].len(), 1);
    }

    #[test]
    fn test_empty_content_gives_empty_grid() {
        let rows = parse_delimited("", ';').unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_detect_delimiter_semicolon() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
    }

    #[test]
    fn test_detect_delimiter_comma() {
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), ',');
    }

    #[test]
    fn test_detect_delimiter_tab() {
        assert_eq!(detect_delimiter("a\tb\tc\n1\t2\t3"), '\t');
    }

    #[test]
    fn test_detect_format() {
        assert_eq!(detect_format(b"PK\x03\x04rest"), SheetFormat::Workbook);
        assert_eq!(detect_format(CFB_MAGIC), SheetFormat::Workbook);
        assert_eq!(detect_format(b"code;name"), SheetFormat::Delimited);
    }

    #[test]
    fn test_auto_parse_delimited() {
        let sheet = parse_bytes_auto(b"code;name\nA1;Bolt").unwrap();

        assert_eq!(sheet.format, SheetFormat::Delimited);
        assert_eq!(sheet.delimiter, Some(';'));
        assert_eq!(sheet.headers(), vec!["code", "name"]);
        assert_eq!(sheet.data_row_count(), 1);
    }

    #[test]
    fn test_windows_1254_decoding() {
        // "ŞİŞE" (bottle) in Windows-1254
        let bytes: &[u8] = &[0xDE, 0xDD, 0xDE, 0x45];
        let decoded = decode_content(bytes, "windows-1254").unwrap();
        assert_eq!(decoded, "ŞİŞE");
    }

    #[test]
    fn test_valid_utf8_is_kept() {
        assert_eq!(detect_encoding("ÜRÜN ADI;LİSTE FİYATI".as_bytes()), "utf-8");
    }

    #[test]
    fn test_unknown_encoding_label() {
        assert!(matches!(
            decode_content(b"abc", "klingon-8"),
            Err(SheetError::Encoding(_))
        ));
    }

    #[test]
    fn test_corrupt_workbook_is_sheet_error() {
        let mut bytes = ZIP_MAGIC.to_vec();
        bytes.extend_from_slice(b"definitely not a zip archive");

        let result = parse_bytes_auto(&bytes);
        assert!(matches!(result, Err(SheetError::Workbook(_))));
    }

    const SHEET_AT_A1: &[u8] = include_bytes!("../../tests/fixtures/price-list-a1.xlsx");
    const SHEET_AT_B2: &[u8] = include_bytes!("../../tests/fixtures/price-list-b2.xlsx");

    #[test]
    fn test_workbook_at_a1() {
        let sheet = parse_bytes_auto(SHEET_AT_A1).unwrap();

        assert_eq!(sheet.format, SheetFormat::Workbook);
        assert_eq!(sheet.encoding, None);
        assert_eq!(sheet.rows.len(), 4);
        assert_eq!(sheet.rows[0][0], Cell::Text("STOK KODU".into()));
        assert_eq!(sheet.rows[1][0], Cell::Text("A-1".into()));
        assert_eq!(sheet.rows[1][4], Cell::Number(100.0));
        assert_eq!(sheet.rows[1][7], Cell::Empty);
        assert_eq!(sheet.rows[2][4], Cell::Text("12,50".into()));
    }

    #[test]
    fn test_workbook_rows_are_relative_to_used_range() {
        let rows = parse_workbook(SHEET_AT_B2).unwrap();

        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0][0], Cell::Text("STOK KODU".into()));
        assert_eq!(rows[1][0], Cell::Text("B-1".into()));
        assert_eq!(rows[1][4], Cell::Number(100.0));
        assert!(rows[2].iter().all(Cell::is_blank));
        assert_eq!(rows[3][2], Cell::Text("Washer".into()));
    }

    #[test]
    fn test_data_cell_conversion() {
        assert_eq!(Cell::from(&Data::Int(7)), Cell::Number(7.0));
        assert_eq!(Cell::from(&Data::String("  ".into())), Cell::Empty);
        assert_eq!(Cell::from(&Data::Empty), Cell::Empty);
    }

    #[test]
    fn test_number_cell_display_matches_sheet_text() {
        assert_eq!(Cell::Number(1001.0).to_string(), "1001");
        assert_eq!(Cell::Number(12.5).to_string(), "12.5");
    }
}
