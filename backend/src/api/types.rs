//! REST API request and response types.
//!
//! All bodies are camelCase JSON. Errors share one shape:
//! `{ "status": "error", "error": "<message>" }`.

use axum::{http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::catalog::{BatchOutcome, CatalogStats, FileOutcome};
use crate::error::{ServerError, UploadError};
use crate::models::{CalculationRecord, Product, UploadedFile};
use crate::pricing::{PriceQuote, RateTable, StaticRates};

/// Response to a batch upload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub batch_id: String,
    /// "ready" when every file was added, "warning" otherwise
    pub status: String,
    pub added: usize,
    pub rejected: usize,
    pub files: Vec<FileOutcome>,
    pub catalog: CatalogStats,
}

impl UploadResponse {
    pub fn new(outcome: BatchOutcome, catalog: CatalogStats) -> Self {
        let rejected = outcome.rejected();
        Self {
            batch_id: Uuid::new_v4().to_string(),
            status: if rejected == 0 { "ready" } else { "warning" }.to_string(),
            added: outcome.added(),
            rejected,
            files: outcome.files,
            catalog,
        }
    }
}

/// One held upload, without its products.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSummary {
    pub name: String,
    pub product_count: usize,
    pub uploaded_at: DateTime<Utc>,
}

impl From<&UploadedFile> for FileSummary {
    fn from(file: &UploadedFile) -> Self {
        Self {
            name: file.name.clone(),
            product_count: file.products.len(),
            uploaded_at: file.uploaded_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilesResponse {
    pub files: Vec<FileSummary>,
    pub max_files: usize,
}

/// `GET /api/search` parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub query: String,
    pub count: usize,
    pub products: Vec<Product>,
}

/// `POST /api/price` body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceRequest {
    pub stock_code: String,
    /// Restrict to one upload when the stock code exists at several suppliers
    #[serde(default)]
    pub source_file: Option<String>,
    pub margin_percent: f64,
    #[serde(default)]
    pub extra_discount_percent: f64,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// A product with its rounded quote and the record to persist.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductQuote {
    pub product: Product,
    pub quote: PriceQuote,
    pub formatted: String,
    pub record: CalculationRecord,
}

#[derive(Debug, Clone, Serialize)]
pub struct PriceResponse {
    pub quotes: Vec<ProductQuote>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RateEntry {
    pub code: String,
    pub rate: f64,
    pub symbol: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RatesResponse {
    pub base: String,
    pub rates: Vec<RateEntry>,
}

impl From<&StaticRates> for RatesResponse {
    fn from(table: &StaticRates) -> Self {
        Self {
            base: table.base_currency().to_string(),
            rates: table
                .rates
                .iter()
                .map(|(code, rate)| RateEntry {
                    code: code.clone(),
                    rate: *rate,
                    symbol: table.symbol(code).map(str::to_string),
                })
                .collect(),
        }
    }
}

/// Create an error response body
pub fn error_response(error: &str) -> Value {
    json!({
        "status": "error",
        "error": error,
    })
}

/// Status code for a server error.
pub fn status_for(err: &ServerError) -> StatusCode {
    match err {
        ServerError::Upload(UploadError::Duplicate { .. }) => StatusCode::CONFLICT,
        ServerError::Upload(UploadError::CapacityExceeded { .. }) => StatusCode::UNPROCESSABLE_ENTITY,
        ServerError::Pricing(_) | ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
        ServerError::NotFound(_) => StatusCode::NOT_FOUND,
        ServerError::Io(_) | ServerError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Map a server error to the handler error type.
pub fn api_error(err: impl Into<ServerError>) -> (StatusCode, Json<Value>) {
    let err = err.into();
    (status_for(&err), Json(error_response(&err.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PricingError;

    #[test]
    fn test_status_mapping() {
        let (status, body) = api_error(UploadError::CapacityExceeded {
            held: 30,
            incoming: 1,
            limit: 30,
        });
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body.0["status"], "error");

        let (status, _) = api_error(PricingError::InvalidMargin(100.0));
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = api_error(ServerError::NotFound("x.csv".into()));
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_upload_response_status() {
        let outcome = BatchOutcome {
            files: vec![FileOutcome::Duplicate { name: "a.csv".into() }],
        };
        let stats = CatalogStats {
            supplier_count: 1,
            product_count: 3,
            unique_stock_codes: 3,
            max_files: 30,
        };
        let response = UploadResponse::new(outcome, stats);
        assert_eq!(response.status, "warning");
        assert_eq!(response.rejected, 1);

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["files"][0]["status"], "duplicate");
        assert_eq!(json["catalog"]["productCount"], 3);
    }

    #[test]
    fn test_rates_response() {
        let response = RatesResponse::from(&StaticRates::default());
        assert_eq!(response.base, "TRY");
        let usd = response.rates.iter().find(|r| r.code == "USD").unwrap();
        assert_eq!(usd.symbol.as_deref(), Some("$"));
    }

    #[test]
    fn test_price_request_defaults() {
        let req: PriceRequest =
            serde_json::from_str(r#"{ "stockCode": "A-1", "marginPercent": 20 }"#).unwrap();
        assert_eq!(req.extra_discount_percent, 0.0);
        assert!(req.currency.is_none());
    }
}
