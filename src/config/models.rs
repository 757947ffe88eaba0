// src/config/models.rs
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::time::Duration;

pub type TileId = String;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Tile at position {0} has an empty id")]
    EmptyTileId(usize),

    #[error("Duplicate tile id: {0}")]
    DuplicateTileId(TileId),

    #[error("Health check interval must be positive")]
    ZeroInterval,

    #[error("Health check timeout must be positive")]
    ZeroTimeout,
}

/// One service shortcut on the start page.
///
/// Presentation fields the health engine does not read (icon, position,
/// size, ...) are kept in `extra` so an imported dashboard exports unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tile {
    pub id: TileId,

    #[serde(default)]
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alive_check_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_in_new_tab: Option<bool>,

    #[serde(default)]
    pub show_status_indicator: bool,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Tile {
    pub fn new(id: impl Into<TileId>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            description: None,
            url: url.into(),
            alive_check_url: None,
            fallback_url: None,
            category: None,
            open_in_new_tab: None,
            show_status_indicator: false,
            extra: Map::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_alive_check_url(mut self, url: impl Into<String>) -> Self {
        self.alive_check_url = Some(url.into());
        self
    }

    pub fn with_fallback_url(mut self, url: impl Into<String>) -> Self {
        self.fallback_url = Some(url.into());
        self
    }

    pub fn with_status_indicator(mut self, show: bool) -> Self {
        self.show_status_indicator = show;
        self
    }

    /// URL the prober should hit: the alive-check override when set, else `url`.
    pub fn check_url(&self) -> &str {
        non_empty(self.alive_check_url.as_deref()).unwrap_or(&self.url)
    }

    pub fn primary_url(&self) -> Option<&str> {
        non_empty(Some(&self.url))
    }

    pub fn fallback(&self) -> Option<&str> {
        non_empty(self.fallback_url.as_deref())
    }

    /// Tiles open in a new tab unless they say otherwise.
    pub fn opens_in_new_tab(&self) -> bool {
        self.open_in_new_tab.unwrap_or(true)
    }

    /// Only tiles that show a status indicator are polled.
    pub fn is_health_checked(&self) -> bool {
        self.show_status_indicator
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    pub enabled: bool,
    /// Seconds between poll cycles.
    pub interval: u64,
    /// Seconds a single probe may take before it counts as offline.
    pub timeout: u64,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: 30,
            timeout: 5,
        }
    }
}

impl HealthCheckConfig {
    pub fn new(interval_secs: u64, timeout_secs: u64) -> Self {
        Self {
            enabled: true,
            interval: interval_secs,
            timeout: timeout_secs,
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval.max(1))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

/// The whole start-page configuration, in the same shape the browser
/// editor exports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    #[serde(default)]
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,

    #[serde(default)]
    pub tiles: Vec<Tile>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<Category>,

    #[serde(default)]
    pub health_check: HealthCheckConfig,

    /// Theme, layout and anything else owned by the editors.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Dashboard {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for (index, tile) in self.tiles.iter().enumerate() {
            if tile.id.trim().is_empty() {
                return Err(ConfigError::EmptyTileId(index));
            }
            if !seen.insert(tile.id.as_str()) {
                return Err(ConfigError::DuplicateTileId(tile.id.clone()));
            }
            if tile.is_health_checked() && tile.check_url().trim().is_empty() {
                tracing::warn!(tile = %tile.id, "tile has no URL to check and will always report offline");
            }
        }

        if self.health_check.interval == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        if self.health_check.timeout == 0 {
            return Err(ConfigError::ZeroTimeout);
        }

        Ok(())
    }

    pub fn tile(&self, id: &str) -> Option<&Tile> {
        self.tiles.iter().find(|tile| tile.id == id)
    }

    /// Parse and validate an exported dashboard.
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let dashboard: Dashboard = serde_json::from_str(json)?;
        dashboard.validate()?;
        Ok(dashboard)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl Default for Dashboard {
    fn default() -> Self {
        let sample = |id: &str, title: &str, url: &str, check: &str, category: &str| {
            let mut tile = Tile::new(id, url)
                .with_title(title)
                .with_alive_check_url(check)
                .with_status_indicator(true);
            tile.category = Some(category.to_string());
            tile
        };

        let category = |id: &str, name: &str, color: &str, icon: &str| Category {
            id: id.to_string(),
            name: name.to_string(),
            color: Some(color.to_string()),
            icon: Some(icon.to_string()),
        };

        Self {
            title: "Homelab Dashboard".to_string(),
            subtitle: Some("Your personal service hub".to_string()),
            tiles: vec![
                sample(
                    "1",
                    "Proxmox",
                    "https://proxmox.local:8006",
                    "https://proxmox.local:8006/api2/json/version",
                    "Infrastructure",
                ),
                sample(
                    "2",
                    "Home Assistant",
                    "http://homeassistant.local:8123",
                    "http://homeassistant.local:8123/api/",
                    "Automation",
                ),
                sample(
                    "3",
                    "Plex",
                    "http://plex.local:32400",
                    "http://plex.local:32400/web/index.html",
                    "Media",
                ),
            ],
            categories: vec![
                category("1", "Infrastructure", "#ef4444", "server"),
                category("2", "Automation", "#10b981", "home"),
                category("3", "Media", "#8b5cf6", "play"),
                category("4", "Monitoring", "#f59e0b", "activity"),
            ],
            health_check: HealthCheckConfig::default(),
            extra: Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_url_prefers_alive_check_override() {
        let tile = Tile::new("a", "http://nas.local").with_alive_check_url("http://nas.local/ping");
        assert_eq!(tile.check_url(), "http://nas.local/ping");

        let tile = Tile::new("a", "http://nas.local").with_alive_check_url("  ");
        assert_eq!(tile.check_url(), "http://nas.local");
    }

    #[test]
    fn default_dashboard_is_valid() {
        let dashboard = Dashboard::default();
        assert!(dashboard.validate().is_ok());
        assert_eq!(dashboard.tiles.len(), 3);
        assert!(dashboard.tiles.iter().all(Tile::is_health_checked));
    }

    #[test]
    fn rejects_duplicate_ids() {
        let mut dashboard = Dashboard::default();
        dashboard.tiles.push(Tile::new("1", "http://dup.local"));
        assert_eq!(
            dashboard.validate(),
            Err(ConfigError::DuplicateTileId("1".to_string()))
        );
    }

    #[test]
    fn rejects_zero_interval() {
        let mut dashboard = Dashboard::default();
        dashboard.health_check.interval = 0;
        assert_eq!(dashboard.validate(), Err(ConfigError::ZeroInterval));
    }

    #[test]
    fn parses_browser_export_and_keeps_unknown_fields() {
        let json = r##"{
            "title": "Lab",
            "theme": { "mode": "dark", "primaryColor": "#3b82f6" },
            "tiles": [{
                "id": "x",
                "title": "Grafana",
                "url": "http://grafana.local",
                "fallbackUrl": "http://10.0.0.5:3000",
                "showStatusIndicator": true,
                "position": { "x": 0, "y": 0 }
            }],
            "healthCheck": { "enabled": true, "interval": 60, "timeout": 3 }
        }"##;

        let dashboard = Dashboard::from_json(json).unwrap();
        let tile = dashboard.tile("x").unwrap();
        assert_eq!(tile.fallback(), Some("http://10.0.0.5:3000"));
        assert!(tile.extra.contains_key("position"));
        assert!(dashboard.extra.contains_key("theme"));
        assert_eq!(dashboard.health_check.interval(), Duration::from_secs(60));

        let exported = dashboard.to_json_pretty().unwrap();
        let reparsed = Dashboard::from_json(&exported).unwrap();
        assert_eq!(reparsed, dashboard);
    }

    #[test]
    fn missing_health_check_section_uses_defaults() {
        let dashboard = Dashboard::from_json(r#"{ "tiles": [] }"#).unwrap();
        assert_eq!(dashboard.health_check, HealthCheckConfig::default());
    }
}
