//! HTTP transport.
//!
//! A thin axum layer over [`QueryService`]. Every handler forwards to one
//! service operation and serializes the result.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | HTML page: discovered schema, upload form, query box |
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/api/schema` | Schema snapshot taken at startup |
//! | `POST` | `/api/upload-documents` | Multipart upload (`files` fields); returns `{ job_id }` |
//! | `GET`  | `/api/ingest/status?job_id=` | Progress of an ingestion job |
//! | `GET`  | `/api/documents/{id}` | A stored document |
//! | `POST` | `/api/query` | `{ "query": "..." }` → query result |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "unknown job: 42" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `internal` (500).
//! Malformed query strings and JSON bodies are reported as `bad_request`.
//! Failures while answering a query are not HTTP errors: they come back in
//! the result's `results.error` field with status 200.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        DefaultBodyLimit, Multipart, Path, Query, State,
    },
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::config::{Config, ServerConfig};
use crate::models::{Document, IngestJob, QueryResult, RawFile};
use crate::schema::SchemaSnapshot;
use crate::service::QueryService;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    service: Arc<QueryService>,
}

/// Opens the service from `config` and serves until Ctrl-C.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let service = Arc::new(QueryService::open(config).await?);
    let app = router(Arc::clone(&service), &config.server);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!(bind = %config.server.bind, "server listening");
    println!("Server running at http://{}", config.server.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    service.close().await;
    Ok(())
}

/// Builds the router. Exposed so tests and embedders can serve it on their
/// own listener.
pub fn router(service: Arc<QueryService>, config: &ServerConfig) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_index))
        .route("/health", get(handle_health))
        .route("/api/schema", get(handle_schema))
        .route("/api/upload-documents", post(handle_upload))
        .route("/api/ingest/status", get(handle_ingest_status))
        .route("/api/documents/{id}", get(handle_get_document))
        .route("/api/query", post(handle_query))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(cors)
        .with_state(AppState { service })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /api/schema ============

async fn handle_schema(State(state): State<AppState>) -> Json<SchemaSnapshot> {
    Json(state.service.schema_snapshot().clone())
}

// ============ POST /api/upload-documents ============

#[derive(Serialize)]
struct UploadResponse {
    job_id: String,
}

async fn handle_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(e.to_string()))?
    {
        if field.name() != Some("files") {
            continue;
        }
        let name = field
            .file_name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("upload-{}", files.len() + 1));
        let bytes = field
            .bytes()
            .await
            .map_err(|e| bad_request(e.to_string()))?;
        files.push(RawFile::new(name, bytes.to_vec()));
    }

    if files.is_empty() {
        return Err(bad_request("no files uploaded under field 'files'"));
    }

    let job_id = state.service.start_ingestion(files);
    Ok(Json(UploadResponse { job_id }))
}

// ============ GET /api/ingest/status ============

#[derive(Deserialize)]
struct StatusParams {
    job_id: String,
}

async fn handle_ingest_status(
    State(state): State<AppState>,
    params: Result<Query<StatusParams>, QueryRejection>,
) -> Result<Json<IngestJob>, AppError> {
    let Query(params) = params.map_err(|e| bad_request(e.body_text()))?;
    state
        .service
        .ingestion_status(&params.job_id)
        .map(Json)
        .ok_or_else(|| not_found(format!("unknown job: {}", params.job_id)))
}

// ============ GET /api/documents/{id} ============

async fn handle_get_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Document>, AppError> {
    match state.service.get_document(&id).await {
        Ok(Some(doc)) => Ok(Json(doc)),
        Ok(None) => Err(not_found(format!("document not found: {}", id))),
        Err(e) => Err(internal(e.to_string())),
    }
}

// ============ POST /api/query ============

#[derive(Deserialize)]
struct QueryRequest {
    #[serde(default)]
    query: String,
}

async fn handle_query(
    State(state): State<AppState>,
    req: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResult>, AppError> {
    let Json(req) = req.map_err(|e| bad_request(e.body_text()))?;
    if req.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }
    Ok(Json(state.service.run_query(&req.query).await))
}

// ============ GET / ============

async fn handle_index(State(state): State<AppState>) -> Html<String> {
    let schema_json = serde_json::to_string_pretty(state.service.schema_snapshot())
        .unwrap_or_else(|_| "{}".to_string());
    Html(INDEX_HTML.replace("{{SCHEMA}}", &escape_html(&schema_json)))
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

const INDEX_HTML: &str = r#"<!doctype html>
<html>
<head>
  <title>NLQ Engine</title>
  <style>
    body { font-family: Arial, sans-serif; margin: 24px; }
    .panel { border: 1px solid #ddd; padding: 12px; margin-bottom: 16px; border-radius: 8px; }
    input[type=text] { width: 100%; padding: 8px; box-sizing: border-box; }
    .small { font-size: 12px; color: #666; }
  </style>
</head>
<body>
  <h2>NLQ Engine</h2>
  <div class="panel">
    <h3>Discovered Schema</h3>
    <pre>{{SCHEMA}}</pre>
  </div>
  <div class="panel">
    <h3>Upload Documents</h3>
    <input id="files" type="file" name="files" multiple />
    <button type="button" onclick="upload()">Upload</button>
    <div id="uploadStatus" class="small"></div>
  </div>
  <div class="panel">
    <h3>Query</h3>
    <input id="q" type="text" placeholder='Try: "How many employees do we have?"'/>
    <button onclick="runQuery()">Run</button>
    <pre id="result"></pre>
  </div>
  <script>
    async function poll(jobId) {
      const r = await fetch('/api/ingest/status?job_id=' + encodeURIComponent(jobId));
      const j = await r.json();
      document.getElementById('uploadStatus').innerText =
        'Job ' + jobId + ': ' + j.processed + ' / ' + j.total + (j.done ? ' done' : '');
      if (!j.done) setTimeout(() => poll(jobId), 500);
    }
    async function upload() {
      const files = document.getElementById('files').files;
      if (!files.length) { alert('Choose files'); return; }
      const fd = new FormData();
      for (const f of files) fd.append('files', f);
      const r = await fetch('/api/upload-documents', { method: 'POST', body: fd });
      const j = await r.json();
      if (j.job_id) poll(j.job_id);
    }
    async function runQuery() {
      const q = document.getElementById('q').value;
      if (!q) { alert('Enter a query'); return; }
      const r = await fetch('/api/query', {
        method: 'POST',
        headers: { 'content-type': 'application/json' },
        body: JSON.stringify({ query: q })
      });
      document.getElementById('result').innerText = JSON.stringify(await r.json(), null, 2);
    }
  </script>
</body>
</html>
"#;
