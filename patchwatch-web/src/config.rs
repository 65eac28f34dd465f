use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::Path, path::PathBuf, time::Duration};
use tokio::fs;
use tracing::warn;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct WebConfig {
    pub listen: SocketAddr,
    pub data_dir: PathBuf,
    pub cache_ttl_secs: u64,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 8080)),
            data_dir: PathBuf::from("./data/json"),
            cache_ttl_secs: 60,
        }
    }
}

impl WebConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

pub fn parse_config(txt: &str) -> WebConfig {
    if txt.trim().is_empty() {
        return WebConfig::default();
    }
    serde_yaml::from_str(txt).unwrap_or_else(|e| {
        warn!("invalid web config, using defaults: {e}");
        WebConfig::default()
    })
}

pub async fn load_config() -> WebConfig {
    let path = std::env::var("PATCHWATCH_WEB_CONFIG").unwrap_or_else(|_| "web.yaml".into());
    let mut cfg = if Path::new(&path).exists() {
        let txt = fs::read_to_string(&path).await.unwrap_or_default();
        parse_config(&txt)
    } else {
        warn!("no {path}, using default config");
        WebConfig::default()
    };

    if let Ok(dir) = std::env::var("PATCHWATCH_DATA_DIR") {
        cfg.data_dir = PathBuf::from(dir);
    }
    cfg
}
