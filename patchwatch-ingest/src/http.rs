/**
 * INGEST API - HTTP front of the ingestion service
 *
 * ROUTES:
 * - GET  /health
 * - POST /api/v1/windows/update
 * - POST /api/v1/linux/update
 *
 * Both POST routes run the same handler with a different `OsKind`. Bodies are
 * parsed as JSON regardless of Content-Type; the file work runs on the
 * blocking pool.
 */

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{routing::{get, post}, Json, Router};
use patchwatch_store::{OsKind, RecordStore};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::ingest::{ingest, parse_payload, IngestError};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RecordStore>,
}

#[derive(Debug, Serialize)]
struct IngestResponse {
    message: String,
    history_count: usize,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    field: Option<&'static str>,
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        let status = if self.is_client_error() {
            warn!("rejected update report: {self}");
            StatusCode::BAD_REQUEST
        } else {
            error!("failed to record update report: {self}");
            StatusCode::INTERNAL_SERVER_ERROR
        };
        let body = ErrorBody { error: self.to_string(), field: self.field() };
        (status, Json(body)).into_response()
    }
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/v1/windows/update", post(ingest_windows))
        .route("/api/v1/linux/update", post(ingest_linux))
        .with_state(app_state)
}

// POST /api/v1/windows/update
async fn ingest_windows(
    State(app): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<IngestResponse>), IngestError> {
    receive(app, OsKind::Windows, body).await
}

// POST /api/v1/linux/update
async fn ingest_linux(
    State(app): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<IngestResponse>), IngestError> {
    receive(app, OsKind::Linux, body).await
}

async fn receive(
    app: AppState,
    os: OsKind,
    body: Bytes,
) -> Result<(StatusCode, Json<IngestResponse>), IngestError> {
    let payload = parse_payload(&body)?;
    let store = Arc::clone(&app.store);
    let outcome = tokio::task::spawn_blocking(move || ingest(&store, os, &payload))
        .await
        .map_err(|e| IngestError::Worker(e.to_string()))??;
    debug!(server_id = %outcome.server_id, "report stored");

    let response = IngestResponse {
        message: format!("{} update received.", os.tag()),
        history_count: outcome.history_count,
    };
    Ok((StatusCode::CREATED, Json(response)))
}
