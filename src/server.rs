//! HTTP surface for the assistant.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/ingest` | Ingest URLs and/or raw texts into the index |
//! | `POST` | `/search` | K-nearest-neighbor search over indexed chunks |
//! | `POST` | `/process` | Full question-answering flow, blocking |
//! | `POST` | `/process_stream` | Same flow, newline-delimited JSON stream |
//! | `GET`  | `/health` | Health check |
//!
//! # Error Contract
//!
//! `/ingest` and `/search` reply `{ "error": "..." }` with 400 for invalid
//! input and 500 for internal failures. `/process` always replies 200 with
//! either `{ "response": ..., "error": false }` or an `{ "error", "message" }`
//! pair. `/process_stream` emits `{"chunk": ...}` lines followed by one
//! `{"final_response": ...}` line, or a single `{"error": ...}` line; a
//! connection is never left without a terminal marker the server could send.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! clients.

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures_util::StreamExt;
use serde::Serialize;
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::error::PipelineError;
use crate::index::EmbeddingIndex;
use crate::ingest::ContentIngestionPipeline;
use crate::models::{ChatRequest, IngestRequest, SearchRequest};
use crate::orchestrator::RetrievalOrchestrator;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<ContentIngestionPipeline>,
    pub index: Arc<EmbeddingIndex>,
    pub orchestrator: Arc<RetrievalOrchestrator>,
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ingest", post(handle_ingest))
        .route("/search", post(handle_search))
        .route("/process", post(handle_process))
        .route("/process_stream", post(handle_process_stream))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

/// Bind and serve until the process is terminated.
pub async fn run_server(state: AppState, bind: &str) -> anyhow::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(bind = %bind, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

// ============ Error response ============

/// JSON error reply: `{ "error": "..." }` with a mapped status code.
struct AppError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        let status = match err {
            PipelineError::Validation(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(kind = err.kind(), error = %err, "request failed");
        }
        AppError {
            status,
            message: err.to_string(),
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    message: &'static str,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        message: "Service is running",
    })
}

// ============ POST /ingest ============

async fn handle_ingest(
    State(state): State<AppState>,
    Json(request): Json<IngestRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let summary = state.pipeline.ingest(request).await?;
    Ok(Json(
        json!({ "message": format!("Processed {} item(s)", summary.processed) }),
    ))
}

// ============ POST /search ============

async fn handle_search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    if request.query.trim().is_empty() {
        return Err(PipelineError::Validation("Query cannot be empty".to_string()).into());
    }
    if request.k < 1 {
        return Err(PipelineError::Validation("k must be >= 1".to_string()).into());
    }

    let hits = state.index.search(request.query.trim(), request.k).await?;
    Ok(Json(serde_json::to_value(hits).unwrap_or_else(|_| json!([]))))
}

// ============ POST /process ============

/// Blocking question answering. Failures are reported in the body, not as
/// transport-level faults.
async fn handle_process(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Json<serde_json::Value> {
    let turn = match request.into_turn() {
        Ok(turn) => turn,
        Err(err) => {
            return Json(json!({
                "error": err.to_string(),
                "message": "Please provide a valid query.",
            }));
        }
    };

    match state.orchestrator.process(&turn).await {
        Ok(answer) => Json(json!({ "response": answer, "error": false })),
        Err(err) => {
            error!(request_id = %turn.request_id, kind = err.kind(), error = %err, "processing failed");
            Json(json!({
                "error": err.to_string(),
                "message": "We are facing some trouble, please try again in some time.",
            }))
        }
    }
}

// ============ POST /process_stream ============

/// Streaming question answering: newline-delimited JSON, one `{"chunk"}`
/// object per delta, then a final `{"final_response"}` object carrying the
/// concatenation. Upstream failure emits a single `{"error"}` line instead.
async fn handle_process_stream(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Response {
    let turn = match request.into_turn() {
        Ok(turn) => turn,
        Err(err) => return single_line(&json!({ "error": err.to_string() })),
    };

    let mut deltas = match state.orchestrator.process_stream(&turn).await {
        Ok(deltas) => deltas,
        Err(err) => {
            error!(request_id = %turn.request_id, kind = err.kind(), error = %err, "streaming failed");
            return single_line(&json!({ "error": err.to_string() }));
        }
    };

    let request_id = turn.request_id.clone();
    let body_stream = async_stream::stream! {
        let mut gathered = String::new();

        while let Some(item) = deltas.next().await {
            match item {
                Ok(chunk) => {
                    gathered.push_str(&chunk);
                    yield Ok::<String, Infallible>(format!("{}\n", json!({ "chunk": chunk })));
                }
                Err(err) => {
                    error!(request_id = %request_id, error = %err, "stream aborted");
                    yield Ok(format!("{}\n", json!({ "error": err.to_string() })));
                    return;
                }
            }
        }

        yield Ok(format!("{}\n", json!({ "final_response": gathered })));
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(Body::from_stream(body_stream))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

fn single_line(value: &serde_json::Value) -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(Body::from(format!("{}\n", value)))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
