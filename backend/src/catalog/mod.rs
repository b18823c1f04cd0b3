//! The catalog: held uploads and the product union built from them.
//!
//! Uploads are admitted in batches. The whole batch is refused when it would
//! exceed the file ceiling; otherwise files are processed one by one and each
//! gets its own [`FileOutcome`]. A failing file never affects its siblings and
//! its products are either all admitted or none are.

use serde::Serialize;
use std::collections::HashSet;

use crate::api::logs::{log_error, log_info, log_success, log_warning_indent};
use crate::error::{PipelineResult, UploadError};
use crate::models::{Product, UploadedFile};
use crate::normalize::NormalizedUpload;

/// Default ceiling on held uploads.
pub const MAX_UPLOADED_FILES: usize = 30;

/// Default number of search results.
pub const DEFAULT_SEARCH_LIMIT: usize = 10;

/// A file waiting to be admitted.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl IncomingFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

/// What happened to one file of a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    #[serde(rename_all = "camelCase")]
    Added {
        name: String,
        product_count: usize,
        skipped_rows: usize,
        layout: String,
    },
    Duplicate {
        name: String,
    },
    Failed {
        name: String,
        error: String,
    },
}

impl FileOutcome {
    pub fn name(&self) -> &str {
        match self {
            FileOutcome::Added { name, .. }
            | FileOutcome::Duplicate { name }
            | FileOutcome::Failed { name, .. } => name,
        }
    }

    pub fn is_added(&self) -> bool {
        matches!(self, FileOutcome::Added { .. })
    }
}

/// Per-file outcomes of an admitted batch, in submission order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchOutcome {
    pub files: Vec<FileOutcome>,
}

impl BatchOutcome {
    pub fn added(&self) -> usize {
        self.files.iter().filter(|f| f.is_added()).count()
    }

    pub fn rejected(&self) -> usize {
        self.files.len() - self.added()
    }
}

/// Result of a removal request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RemoveOutcome {
    #[serde(rename_all = "camelCase")]
    Removed { name: String, product_count: usize },
    NotFound { name: String },
}

/// Catalog totals.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogStats {
    pub supplier_count: usize,
    pub product_count: usize,
    pub unique_stock_codes: usize,
    pub max_files: usize,
}

/// Held uploads plus the flattened product union.
#[derive(Debug, Clone)]
pub struct Catalog {
    files: Vec<UploadedFile>,
    products: Vec<Product>,
    max_files: usize,
}

impl Catalog {
    pub fn new() -> Self {
        Self::with_max_files(MAX_UPLOADED_FILES)
    }

    pub fn with_max_files(max_files: usize) -> Self {
        Self {
            files: Vec::new(),
            products: Vec::new(),
            max_files,
        }
    }

    pub fn files(&self) -> &[UploadedFile] {
        &self.files
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn max_files(&self) -> usize {
        self.max_files
    }

    pub fn contains(&self, name: &str) -> bool {
        self.files.iter().any(|f| f.name == name)
    }

    /// Refuse a batch that would push the held count past the ceiling.
    pub fn check_capacity(&self, incoming: usize) -> Result<(), UploadError> {
        let held = self.files.len();
        if held + incoming > self.max_files {
            return Err(UploadError::CapacityExceeded {
                held,
                incoming,
                limit: self.max_files,
            });
        }
        Ok(())
    }

    /// Admit a batch of files, decoding each with `decode`.
    ///
    /// Fails as a whole only on capacity. Files are then handled in order:
    /// duplicates (including earlier files of the same batch) and decode
    /// failures are reported per file.
    pub fn upload_batch<F>(&mut self, files: Vec<IncomingFile>, mut decode: F) -> Result<BatchOutcome, UploadError>
    where
        F: FnMut(&IncomingFile) -> PipelineResult<NormalizedUpload>,
    {
        if let Err(e) = self.check_capacity(files.len()) {
            log_error(e.to_string());
            return Err(e);
        }

        log_info(format!("📦 Processing {} file(s)...", files.len()));
        let mut outcome = BatchOutcome::default();

        for file in files {
            if self.contains(&file.name) {
                log_warning_indent(format!("{}: already uploaded", file.name), 1);
                outcome.files.push(FileOutcome::Duplicate { name: file.name });
                continue;
            }

            let file_outcome = match decode(&file) {
                Ok(upload) => {
                    let product_count = upload.products.len();
                    let skipped_rows = upload.skipped.len();
                    self.admit(&file.name, upload.products)?;
                    FileOutcome::Added {
                        name: file.name,
                        product_count,
                        skipped_rows,
                        layout: upload.layout,
                    }
                }
                Err(e) => {
                    log_warning_indent(format!("{}: {}", file.name, e), 1);
                    FileOutcome::Failed {
                        name: file.name,
                        error: e.to_string(),
                    }
                }
            };
            outcome.files.push(file_outcome);
        }

        log_success(format!(
            "{} added, {} rejected, {} held",
            outcome.added(),
            outcome.rejected(),
            self.files.len()
        ));
        Ok(outcome)
    }

    /// Admit one normalized file. Products are tagged with the upload name.
    pub fn admit(&mut self, name: &str, mut products: Vec<Product>) -> Result<(), UploadError> {
        if self.contains(name) {
            return Err(UploadError::Duplicate {
                name: name.to_string(),
            });
        }
        self.check_capacity(1)?;

        for product in &mut products {
            product.source_file = name.to_string();
        }
        self.products.extend(products.iter().cloned());
        self.files.push(UploadedFile::new(name, products));
        Ok(())
    }

    /// Drop an upload and exactly the products it contributed.
    pub fn remove(&mut self, name: &str) -> RemoveOutcome {
        let Some(index) = self.files.iter().position(|f| f.name == name) else {
            return RemoveOutcome::NotFound {
                name: name.to_string(),
            };
        };

        let removed = self.files.remove(index);
        self.products.retain(|p| p.source_file != name);
        log_info(format!("Removed {} ({} products)", name, removed.products.len()));

        RemoveOutcome::Removed {
            name: removed.name,
            product_count: removed.products.len(),
        }
    }

    /// Case-insensitive substring search on product name or stock code.
    ///
    /// The query is matched as typed, surrounding spaces included. Results are
    /// ordered by lowest price, ties keep catalog order. A blank query matches
    /// nothing.
    pub fn search(&self, query: &str, limit: usize) -> Vec<&Product> {
        if query.trim().is_empty() {
            return Vec::new();
        }
        let query = query.to_lowercase();

        let mut hits: Vec<&Product> = self
            .products
            .iter()
            .filter(|p| {
                p.product_name.to_lowercase().contains(&query)
                    || p.stock_code.to_lowercase().contains(&query)
            })
            .collect();

        hits.sort_by(|a, b| {
            a.lowest_price
                .partial_cmp(&b.lowest_price)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(limit);
        hits
    }

    /// Products with a stock code, optionally limited to one upload.
    pub fn find(&self, source_file: Option<&str>, stock_code: &str) -> Vec<&Product> {
        self.products
            .iter()
            .filter(|p| p.stock_code == stock_code)
            .filter(|p| source_file.map_or(true, |s| p.source_file == s))
            .collect()
    }

    pub fn stats(&self) -> CatalogStats {
        let codes: HashSet<&str> = self.products.iter().map(|p| p.stock_code.as_str()).collect();
        CatalogStats {
            supplier_count: self.files.len(),
            product_count: self.products.len(),
            unique_stock_codes: codes.len(),
            max_files: self.max_files,
        }
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}
