//! HTTP API.
//!
//! # Endpoints
//!
//! | Method | Path | Auth | Description |
//! |--------|------|------|-------------|
//! | `GET`  | `/api/health` | no | Liveness check (returns version) |
//! | `GET`  | `/api/documents` | yes | Caller's documents, newest first |
//! | `GET`  | `/api/documents/{id}` | yes | One of the caller's documents |
//! | `POST` | `/api/documents/upload` | yes | Multipart upload (field `file`), stored and indexed |
//! | `POST` | `/api/documents/search` | yes | `{query, limit?}` similarity search |
//! | `POST` | `/api/documents/chat` | yes | `{query}` retrieval-augmented answer |
//!
//! Authenticated routes expect `Authorization: Bearer <jwt>`; the token's
//! `sub` claim is the owner id every operation is scoped to.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "Query is required" } }
//! ```
//!
//! | Code | Status |
//! |------|--------|
//! | `bad_request` | 400 |
//! | `unauthorized` | 401 |
//! | `not_found` | 404 |
//! | `payload_too_large` | 413 |
//! | `extraction_failed` | 422 |
//! | `storage_failed` | 500 |
//! | `indexing_failed`, `retrieval_failed`, `generation_failed` | 502 |
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted for browser clients.

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::{JsonRejection, PathRejection},
        DefaultBodyLimit, FromRequestParts, Multipart, Path, State,
    },
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use memory_vault_core::error::PipelineError;
use memory_vault_core::models::{Document, RetrievedChunk};
use memory_vault_core::pipeline::Vault;

use crate::app::{build_vault, guess_content_type};
use crate::auth::{AuthError, Authenticator};
use crate::config::Config;

/// Multipart framing allowance on top of `server.max_upload_bytes`.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    vault: Arc<Vault>,
    auth: Arc<Authenticator>,
    max_upload_bytes: usize,
}

impl AppState {
    pub fn new(vault: Arc<Vault>, auth: Arc<Authenticator>, max_upload_bytes: usize) -> Self {
        Self {
            vault,
            auth,
            max_upload_bytes,
        }
    }
}

/// Starts the HTTP server on `[server].bind` with collaborators built from
/// `config`. Runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let vault = Arc::new(build_vault(config).await?);
    let auth = Arc::new(Authenticator::from_config(&config.auth)?);
    run_server_with_vault(config, vault, auth).await
}

/// Like [`run_server`], but serves an already assembled [`Vault`].
pub async fn run_server_with_vault(
    config: &Config,
    vault: Arc<Vault>,
    auth: Arc<Authenticator>,
) -> anyhow::Result<()> {
    let state = AppState::new(vault, auth, config.server.max_upload_bytes);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!(addr = %listener.local_addr()?, "MemoryVault server listening");
    axum::serve(listener, app).await?;

    Ok(())
}

/// The full route table with CORS and upload size limits applied.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(handle_health))
        .route("/api/documents", get(handle_list_documents))
        .route("/api/documents/{id}", get(handle_get_document))
        .route(
            "/api/documents/upload",
            post(handle_upload)
                .layer(DefaultBodyLimit::max(state.max_upload_bytes + MULTIPART_OVERHEAD)),
        )
        .route("/api/documents/search", post(handle_search))
        .route("/api/documents/chat", post(handle_chat))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`, `"unauthorized"`).
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            warn!(code = %self.code, message = %self.message, "request failed");
        }
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
    AppError::new(StatusCode::BAD_REQUEST, "bad_request", message)
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::NOT_FOUND, "not_found", message)
}

fn payload_too_large(limit: usize) -> AppError {
    AppError::new(
        StatusCode::PAYLOAD_TOO_LARGE,
        "payload_too_large",
        format!("File exceeds the {} byte upload limit", limit),
    )
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        PipelineError::from(e).into()
    }
}

impl From<PipelineError> for AppError {
    fn from(e: PipelineError) -> Self {
        let status = match &e {
            // Auth messages are shown to clients as-is.
            PipelineError::Auth(message) => {
                return AppError::new(StatusCode::UNAUTHORIZED, e.code(), message.clone())
            }
            PipelineError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            PipelineError::Extraction(_) => StatusCode::UNPROCESSABLE_ENTITY,
            PipelineError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            PipelineError::Indexing(_)
            | PipelineError::Retrieval(_)
            | PipelineError::Generation(_) => StatusCode::BAD_GATEWAY,
        };
        AppError::new(status, e.code(), e.to_string())
    }
}

// ============ Authentication ============

/// The authenticated caller's owner id, taken from a verified bearer token.
pub struct Owner(pub String);

impl FromRequestParts<AppState> for Owner {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let header = match parts.headers.get(AUTHORIZATION) {
            Some(value) => Some(
                value
                    .to_str()
                    .map_err(|_| AppError::from(AuthError::Malformed))?,
            ),
            None => None,
        };
        Ok(Owner(state.auth.authenticate(header)?))
    }
}

// ============ GET /api/health ============

#[derive(Serialize)]
struct HealthResponse {
    /// Always `"UP"` when the server is running.
    status: &'static str,
    message: &'static str,
    version: &'static str,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "UP",
        message: "MemoryVault backend is running",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============ GET /api/documents ============

async fn handle_list_documents(
    State(state): State<AppState>,
    Owner(owner): Owner,
) -> Result<Json<Vec<Document>>, AppError> {
    Ok(Json(state.vault.documents(&owner).await?))
}

async fn handle_get_document(
    State(state): State<AppState>,
    Owner(owner): Owner,
    id: Result<Path<String>, PathRejection>,
) -> Result<Json<Document>, AppError> {
    let Path(id) = id.map_err(|e| bad_request(e.body_text()))?;
    state
        .vault
        .document(&owner, &id)
        .await?
        .map(Json)
        .ok_or_else(|| not_found(format!("document not found: {}", id)))
}

// ============ POST /api/documents/upload ============

#[derive(Serialize)]
struct UploadResponse {
    message: &'static str,
    document: Document,
}

fn multipart_error(e: MultipartError, limit: usize) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        payload_too_large(limit)
    } else {
        bad_request(e.body_text())
    }
}

async fn handle_upload(
    State(state): State<AppState>,
    Owner(owner): Owner,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<UploadResponse>), AppError> {
    let limit = state.max_upload_bytes;
    let mut multipart = multipart.map_err(|e| bad_request(e.body_text()))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field
            .file_name()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or("upload")
            .to_string();
        let content_type = match field.content_type() {
            Some(ct) if ct != "application/octet-stream" => ct.to_string(),
            _ => guess_content_type(&file_name).to_string(),
        };
        let bytes = field.bytes().await.map_err(|e| multipart_error(e, limit))?;
        if bytes.len() > limit {
            return Err(payload_too_large(limit));
        }

        let document = state
            .vault
            .upload(&owner, &file_name, &content_type, &bytes)
            .await?;

        return Ok((
            StatusCode::CREATED,
            Json(UploadResponse {
                message: "File uploaded and indexed successfully",
                document,
            }),
        ));
    }

    Err(bad_request("No file uploaded"))
}

// ============ POST /api/documents/search ============

#[derive(Deserialize)]
struct SearchRequest {
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Serialize)]
struct SearchResponse {
    message: &'static str,
    results: Vec<RetrievedChunk>,
}

/// Unwrap a JSON body, mapping malformed input to 400.
fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    body.map(|Json(b)| b).map_err(|e| bad_request(e.body_text()))
}

fn required_query(query: Option<&str>) -> Result<String, AppError> {
    query
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(str::to_string)
        .ok_or_else(|| bad_request("Query is required"))
}

async fn handle_search(
    State(state): State<AppState>,
    Owner(owner): Owner,
    body: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<SearchResponse>, AppError> {
    let req = json_body(body)?;
    let query = required_query(req.query.as_deref())?;
    if req.limit == Some(0) {
        return Err(bad_request("limit must be at least 1"));
    }

    let results = state.vault.search(&owner, &query, req.limit).await?;
    Ok(Json(SearchResponse {
        message: "Search successful",
        results,
    }))
}

// ============ POST /api/documents/chat ============

#[derive(Deserialize)]
struct ChatRequest {
    #[serde(default)]
    query: Option<String>,
}

#[derive(Serialize)]
struct ChatResponse {
    message: &'static str,
    answer: String,
}

async fn handle_chat(
    State(state): State<AppState>,
    Owner(owner): Owner,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, AppError> {
    let req = json_body(body)?;
    let query = required_query(req.query.as_deref())?;
    let answer = state.vault.chat(&owner, &query).await?;
    Ok(Json(ChatResponse {
        message: "Chat successful",
        answer,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_errors_map_to_status_and_code() {
        let cases = [
            (PipelineError::InvalidInput("x".into()), 400, "bad_request"),
            (PipelineError::Extraction("x".into()), 422, "extraction_failed"),
            (PipelineError::Indexing("x".into()), 502, "indexing_failed"),
            (PipelineError::Retrieval("x".into()), 502, "retrieval_failed"),
            (PipelineError::Generation("x".into()), 502, "generation_failed"),
            (PipelineError::Storage("x".into()), 500, "storage_failed"),
            (PipelineError::Auth("x".into()), 401, "unauthorized"),
        ];
        for (err, status, code) in cases {
            let app = AppError::from(err);
            assert_eq!(app.status.as_u16(), status);
            assert_eq!(app.code, code);
        }
    }

    #[test]
    fn blank_query_rejected() {
        assert_eq!(required_query(Some("  hi ")).unwrap(), "hi");
        let err = required_query(Some("   ")).unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "Query is required");
        assert!(required_query(None).is_err());
    }

    #[test]
    fn auth_errors_are_401_with_message() {
        let app = AppError::from(AuthError::MissingHeader);
        assert_eq!(app.status, StatusCode::UNAUTHORIZED);
        assert_eq!(app.code, "unauthorized");
        assert_eq!(app.message, "No authorization header found");
    }
}
