//! HTTP Server for the pricedepot API.
//!
//! # API Endpoints
//!
//! | Method | Path                  | Description                     |
//! |--------|-----------------------|---------------------------------|
//! | GET    | `/health`             | Health check                    |
//! | POST   | `/api/upload`         | Upload one or more price lists  |
//! | GET    | `/api/files`          | Held uploads                    |
//! | DELETE | `/api/files/{name}`   | Remove an upload                |
//! | GET    | `/api/search?q=`      | Search the catalog              |
//! | POST   | `/api/price`          | Quote a product                 |
//! | GET    | `/api/rates`          | Effective rate table            |
//! | GET    | `/api/stats`          | Catalog statistics              |
//! | GET    | `/api/logs`           | SSE stream for real-time logs   |

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, Method, StatusCode},
    response::{sse::Event, Json, Sse},
    routing::{delete, get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{
    collections::{HashMap, VecDeque},
    convert::Infallible,
    net::SocketAddr,
    sync::Arc,
    time::Duration,
};
use tokio::sync::RwLock;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::logs::{log_error, log_info, LOG_BROADCASTER};
use super::types::{
    api_error, FileSummary, FilesResponse, PriceRequest, PriceResponse, ProductQuote, RatesResponse,
    SearchQuery, SearchResponse, UploadResponse,
};
use crate::catalog::{Catalog, CatalogStats, IncomingFile, RemoveOutcome};
use crate::config::AppConfig;
use crate::error::{PipelineResult, ServerError};
use crate::normalize::{normalize_bytes, NormalizeOptions, NormalizedUpload};
use crate::pricing::{price, StaticRates};

/// Request body ceiling for uploads
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<Value>)>;

/// Shared server state. The catalog has a single writer at a time.
pub struct AppState {
    pub catalog: RwLock<Catalog>,
    pub rates: StaticRates,
    pub options: NormalizeOptions,
    pub search_limit: usize,
}

impl AppState {
    pub fn new(config: &AppConfig, rates: StaticRates) -> Self {
        Self {
            catalog: RwLock::new(Catalog::with_max_files(config.max_files)),
            rates,
            options: config.normalize_options(),
            search_limit: config.search_limit,
        }
    }
}

pub type SharedState = Arc<AppState>;

/// Build the API router
pub fn router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/upload", post(upload_files))
        .route("/api/files", get(list_files))
        .route("/api/files/{name}", delete(remove_file))
        .route("/api/search", get(search))
        .route("/api/price", post(quote))
        .route("/api/rates", get(rates))
        .route("/api/stats", get(stats))
        .route("/api/logs", get(sse_logs))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let rates = config.load_rates()?;
    let state = Arc::new(AppState::new(&config, rates));
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    println!("🚀 pricedepot server running on http://localhost:{}", config.port);
    println!("   POST   /api/upload        - Upload price lists");
    println!("   GET    /api/search?q=     - Search products");
    println!("   POST   /api/price         - Quote a product");
    println!("   DELETE /api/files/{{name}}  - Remove an upload");
    println!("   GET    /api/logs          - SSE log stream");
    println!("   Layout: {} | max files: {}", config.layout, config.max_files);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(ServerError::from)?;
    axum::serve(listener, app).await.map_err(ServerError::from)?;

    Ok(())
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "pricedepot",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    // Lagged receivers skip the dropped entries
    let stream = BroadcastStream::new(rx).filter_map(|result| {
        let entry = result.ok()?;
        let json = serde_json::to_string(&entry).ok()?;
        Some(Ok(Event::default().data(json)))
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Multipart upload; every `file` field is one price list
async fn upload_files(State(state): State<SharedState>, mut multipart: Multipart) -> ApiResult<UploadResponse> {
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| api_error(ServerError::BadRequest(format!("Multipart error: {}", e))))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let name = field
            .file_name()
            .map(str::to_string)
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| api_error(ServerError::BadRequest("File field without a file name".into())))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| api_error(ServerError::BadRequest(format!("Read error: {}", e))))?;

        files.push(IncomingFile::new(name, bytes.to_vec()));
    }

    if files.is_empty() {
        return Err(api_error(ServerError::BadRequest("No file provided".into())));
    }

    log_info(format!("📄 Upload of {} file(s)", files.len()));

    // Refuse an oversized batch before spending time decoding it
    if let Err(e) = state.catalog.read().await.check_capacity(files.len()) {
        log_error(e.to_string());
        return Err(api_error(e));
    }

    let (files, mut decoded) = decode_batch(files, state.options.clone())
        .await
        .map_err(api_error)?;

    let mut catalog = state.catalog.write().await;
    let outcome = catalog
        .upload_batch(files, |file| {
            decoded
                .get_mut(&file.name)
                .and_then(VecDeque::pop_front)
                .unwrap_or_else(|| normalize_bytes(&file.bytes, &file.name, &state.options))
        })
        .map_err(api_error)?;

    Ok(Json(UploadResponse::new(outcome, catalog.stats())))
}

/// Decoded uploads keyed by file name, in submission order per name.
type DecodedBatch = HashMap<String, VecDeque<PipelineResult<NormalizedUpload>>>;

/// Decode every file on the blocking pool, outside the catalog lock.
///
/// The catalog asks for each non-duplicate file in submission order, so
/// popping from the front of a name's queue yields that file's result.
async fn decode_batch(
    files: Vec<IncomingFile>,
    options: NormalizeOptions,
) -> Result<(Vec<IncomingFile>, DecodedBatch), ServerError> {
    tokio::task::spawn_blocking(move || {
        let mut decoded = DecodedBatch::new();
        for file in &files {
            decoded
                .entry(file.name.clone())
                .or_default()
                .push_back(normalize_bytes(&file.bytes, &file.name, &options));
        }
        (files, decoded)
    })
    .await
    .map_err(|e| ServerError::Task(e.to_string()))
}

async fn list_files(State(state): State<SharedState>) -> Json<FilesResponse> {
    let catalog = state.catalog.read().await;
    Json(FilesResponse {
        files: catalog.files().iter().map(FileSummary::from).collect(),
        max_files: catalog.max_files(),
    })
}

async fn remove_file(State(state): State<SharedState>, Path(name): Path<String>) -> ApiResult<RemoveOutcome> {
    let mut catalog = state.catalog.write().await;
    match catalog.remove(&name) {
        RemoveOutcome::NotFound { name } => Err(api_error(ServerError::NotFound(name))),
        removed => Ok(Json(removed)),
    }
}

async fn search(State(state): State<SharedState>, Query(query): Query<SearchQuery>) -> Json<SearchResponse> {
    let limit = query.limit.unwrap_or(state.search_limit);
    let catalog = state.catalog.read().await;
    let products: Vec<_> = catalog
        .search(&query.q, limit)
        .into_iter()
        .cloned()
        .collect();

    Json(SearchResponse {
        query: query.q.trim().to_string(),
        count: products.len(),
        products,
    })
}

async fn quote(State(state): State<SharedState>, Json(request): Json<PriceRequest>) -> ApiResult<PriceResponse> {
    let catalog = state.catalog.read().await;
    let products = catalog.find(request.source_file.as_deref(), &request.stock_code);
    if products.is_empty() {
        return Err(api_error(ServerError::NotFound(format!(
            "product {}",
            request.stock_code
        ))));
    }

    let currency = request.currency.as_deref().unwrap_or("");
    let mut quotes = Vec::with_capacity(products.len());
    for product in products {
        let quote = price(
            product,
            request.margin_percent,
            request.extra_discount_percent,
            currency,
            &state.rates,
        )
        .map_err(api_error)?;

        quotes.push(ProductQuote {
            record: quote.to_record(product, request.user_id.clone()),
            formatted: quote.display().formatted(),
            quote: quote.display(),
            product: product.clone(),
        });
    }

    Ok(Json(PriceResponse { quotes }))
}

async fn rates(State(state): State<SharedState>) -> Json<RatesResponse> {
    Json(RatesResponse::from(&state.rates))
}

async fn stats(State(state): State<SharedState>) -> Json<CatalogStats> {
    Json(state.catalog.read().await.stats())
}
