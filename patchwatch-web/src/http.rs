/**
 * DASHBOARD API - Read side of patchwatch
 *
 * ROUTES:
 * - GET /health
 * - GET /all-data  => {"count", "items", "generated_at"}, always 200 while the process is healthy
 *
 * /all-data goes through the shared `ReadCache`; only a miss or an expired
 * slot triggers a full directory scan.
 */

use axum::extract::State;
use axum::http::StatusCode;
use axum::{routing::get, Json, Router};
use std::sync::Arc;
use tracing::error;

use crate::aggregator::{AggregatedView, FleetAggregator};
use crate::cache::ReadCache;

#[derive(Clone)]
pub struct AppState {
    pub aggregator: Arc<FleetAggregator>,
    pub cache: Arc<ReadCache<AggregatedView>>,
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/all-data", get(all_data))
        .with_state(app_state)
}

// GET /all-data
async fn all_data(State(app): State<AppState>) -> Result<Json<Arc<AggregatedView>>, StatusCode> {
    let view = tokio::task::spawn_blocking(move || app.cache.get_or_refresh(|| app.aggregator.build()))
        .await
        .map_err(|e| {
            error!("fleet scan worker failed: {e}");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    Ok(Json(view))
}
