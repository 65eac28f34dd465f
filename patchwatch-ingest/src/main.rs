/**
 * PATCHWATCH INGEST - Entry point of the ingestion service
 *
 * ROLE: receives update reports from Windows and Linux servers and appends
 * them to one history file per server in the shared data directory.
 * The dashboard service (patchwatch-web) reads the same directory.
 */

mod config;
mod http;
mod ingest;

use anyhow::Context;
use patchwatch_store::RecordStore;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::load_config;
use crate::http::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg = load_config().await;

    if let Err(e) = std::fs::create_dir_all(&cfg.data_dir) {
        warn!("failed to create data dir {}: {e}", cfg.data_dir.display());
    }
    info!("storing histories in {}", cfg.data_dir.display());

    let store = Arc::new(RecordStore::new(&cfg.data_dir));
    let app = http::build_router(AppState { store });

    let listener = TcpListener::bind(cfg.listen)
        .await
        .with_context(|| format!("failed to bind {}", cfg.listen))?;
    info!("listening on http://{}", cfg.listen);
    axum::serve(listener, app).await.context("ingest server stopped")?;
    Ok(())
}
