use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::Path, path::PathBuf};
use tokio::fs;
use tracing::warn;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct IngestConfig {
    pub listen: SocketAddr,
    pub data_dir: PathBuf, // shared with patchwatch-web
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 8000)),
            data_dir: PathBuf::from("./data/json"),
        }
    }
}

/// Parses a YAML config; empty or invalid text falls back to the defaults.
pub fn parse_config(txt: &str) -> IngestConfig {
    if txt.trim().is_empty() {
        return IngestConfig::default();
    }
    serde_yaml::from_str(txt).unwrap_or_else(|e| {
        warn!("invalid ingest config, using defaults: {e}");
        IngestConfig::default()
    })
}

pub async fn load_config() -> IngestConfig {
    let path = std::env::var("PATCHWATCH_INGEST_CONFIG").unwrap_or_else(|_| "ingest.yaml".into());
    let mut cfg = if Path::new(&path).exists() {
        let txt = fs::read_to_string(&path).await.unwrap_or_default();
        parse_config(&txt)
    } else {
        warn!("no {path}, using default config");
        IngestConfig::default()
    };

    if let Ok(dir) = std::env::var("PATCHWATCH_DATA_DIR") {
        cfg.data_dir = PathBuf::from(dir);
    }
    cfg
}
