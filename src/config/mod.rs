// src/config/mod.rs
mod models;

pub use models::*;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::Path;

pub const LISTEN_ADDR_ENV: &str = "HOMELAB_PULSE_ADDR";
const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|s| s.to_str()),
        Some("yaml") | Some("yml")
    )
}

/// Load a dashboard from a file (YAML or JSON)
pub async fn load_config<P: AsRef<Path>>(path: P) -> Result<Dashboard> {
    let path = path.as_ref();
    let contents = tokio::fs::read_to_string(path)
        .await
        .context("Failed to read config file")?;

    let dashboard: Dashboard = if is_yaml(path) {
        serde_yaml::from_str(&contents).context("Failed to parse YAML config")?
    } else {
        serde_json::from_str(&contents).context("Failed to parse JSON config")?
    };

    dashboard.validate()?;
    Ok(dashboard)
}

/// Persist a dashboard, in the format implied by the file extension
pub async fn save_config<P: AsRef<Path>>(path: P, dashboard: &Dashboard) -> Result<()> {
    let path = path.as_ref();
    let contents = if is_yaml(path) {
        serde_yaml::to_string(dashboard).context("Failed to serialize YAML config")?
    } else {
        dashboard
            .to_json_pretty()
            .context("Failed to serialize JSON config")?
    };

    tokio::fs::write(path, contents)
        .await
        .context("Failed to write config file")?;
    Ok(())
}

/// Address the status API binds to
pub fn listen_addr() -> Result<SocketAddr> {
    let raw = std::env::var(LISTEN_ADDR_ENV).unwrap_or_else(|_| DEFAULT_LISTEN_ADDR.to_string());
    raw.parse()
        .with_context(|| format!("Invalid listen address: {}", raw))
}
