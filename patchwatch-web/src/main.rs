/**
 * PATCHWATCH WEB - Entry point of the dashboard service
 *
 * ROLE: serves the merged, normalized update status of the whole fleet,
 * built from the history files written by patchwatch-ingest, behind a
 * TTL cache constructed here and shared with every request.
 */

mod aggregator;
mod cache;
mod config;
mod http;

use anyhow::Context;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::aggregator::FleetAggregator;
use crate::cache::ReadCache;
use crate::config::load_config;
use crate::http::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg = load_config().await;
    info!(
        "reading histories from {} (cache ttl {}s)",
        cfg.data_dir.display(),
        cfg.cache_ttl_secs
    );

    let app_state = AppState {
        aggregator: Arc::new(FleetAggregator::new(&cfg.data_dir)),
        cache: Arc::new(ReadCache::new(cfg.cache_ttl())),
    };
    let app = http::build_router(app_state);

    let listener = TcpListener::bind(cfg.listen)
        .await
        .with_context(|| format!("failed to bind {}", cfg.listen))?;
    info!("listening on http://{}", cfg.listen);
    axum::serve(listener, app).await.context("dashboard server stopped")?;
    Ok(())
}
