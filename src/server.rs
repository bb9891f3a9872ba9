//! HTTP transport for the command and query API.
//!
//! ## Endpoints
//!
//! - `GET  /health`
//! - `GET  /api/base-data`
//! - `GET  /api/translations/:key`
//! - `GET  /api/requests/:id`
//! - `GET  /api/keys/search?q=`
//! - `GET  /api/keys/tree`
//! - `GET  /api/languages/tree`
//! - `GET  /api/export/keys`
//! - `GET  /api/export/languages/:id?fallback=`
//! - `GET  /api/metrics`
//! - `POST /api/command`

use crate::command::{Command, CommandResponse};
use crate::error::{CommandError, ErrorBody, ErrorKind};
use crate::model::{LanguageId, TranslationRequestId};
use crate::query::QueryService;
use crate::store::Store;
use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use std::future::Future;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Header naming the person issuing a command
pub const ACTOR_HEADER: &str = "x-translator-actor";

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub queries: QueryService,
}

impl AppState {
    pub fn new(store: Store) -> Self {
        Self {
            queries: QueryService::new(store.clone()),
            store,
        }
    }
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Deserialize)]
pub struct ExportParams {
    #[serde(default)]
    pub fallback: bool,
}

/// A command or query error rendered as `{ "error": { code, message } }`.
pub struct ApiError(CommandError);

impl From<CommandError> for ApiError {
    fn from(error: CommandError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        let body = CommandResponse::Error {
            error: ErrorBody::from(&self.0),
        };
        (status, Json(body)).into_response()
    }
}

fn status_for(error: &CommandError) -> StatusCode {
    match error.kind() {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// ============================================================================
// Router
// ============================================================================

pub fn build_router(store: Store) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/base-data", get(base_data))
        .route("/api/translations/:key", get(key_detail))
        .route("/api/requests/:id", get(translation_request))
        .route("/api/keys/search", get(search_keys))
        .route("/api/keys/tree", get(key_tree))
        .route("/api/languages/tree", get(language_tree))
        .route("/api/export/keys", get(export_keys))
        .route("/api/export/languages/:id", get(export_language))
        .route("/api/metrics", get(metrics))
        .route("/api/command", post(command))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState::new(store))
}

/// Serve on `listener` until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    store: Store,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let addr = listener
        .local_addr()
        .context("Listener has no local address")?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, build_router(store))
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server failed")
}

// ============================================================================
// Handlers
// ============================================================================

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// POST /api/command
///
/// Body: `{ "cmd": "CreateKey", "data": { "key": "greeting.hello" } }`.
/// A body that does not parse as a known command is a `ValidationError`.
async fn command(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<Command>, JsonRejection>,
) -> Response {
    let command = match payload {
        Ok(Json(command)) => command,
        Err(rejection) => {
            return ApiError(CommandError::Validation(rejection.body_text())).into_response()
        }
    };

    let actor = headers
        .get(ACTOR_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());

    match state.store.execute(command, actor) {
        Ok(outcome) => Json(CommandResponse::Ok { data: outcome }).into_response(),
        Err(error) => ApiError(error).into_response(),
    }
}

async fn base_data(State(state): State<AppState>) -> Result<Response, ApiError> {
    Ok(Json(state.queries.base_data()?).into_response())
}

async fn key_detail(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response, ApiError> {
    Ok(Json(state.queries.key_detail(&key)?).into_response())
}

async fn translation_request(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id: TranslationRequestId = id.parse().map_err(|_| {
        CommandError::Validation(format!("'{}' is not a translation request id", id))
    })?;
    Ok(Json(state.queries.translation_request(id)?).into_response())
}

async fn search_keys(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Response, ApiError> {
    Ok(Json(state.queries.search_keys(&params.q)?).into_response())
}

async fn key_tree(State(state): State<AppState>) -> Result<Response, ApiError> {
    Ok(Json(state.queries.key_tree()?).into_response())
}

async fn language_tree(State(state): State<AppState>) -> Result<Response, ApiError> {
    Ok(Json(state.queries.language_forest()?).into_response())
}

async fn export_keys(State(state): State<AppState>) -> Result<Response, ApiError> {
    Ok(Json(state.queries.export_key_tree()?).into_response())
}

async fn export_language(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<ExportParams>,
) -> Result<Response, ApiError> {
    let export = state
        .queries
        .export_by_language(&LanguageId::from(id), params.fallback)?;
    Ok(Json(export).into_response())
}

async fn metrics(State(state): State<AppState>) -> Json<crate::metrics::MetricsReport> {
    Json(state.queries.metrics())
}
