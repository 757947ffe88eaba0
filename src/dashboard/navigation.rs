// src/dashboard/navigation.rs
use crate::config::Tile;
use crate::health::Status;
use serde::Serialize;

/// Where a click on a tile should lead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Navigation {
    pub url: String,
    pub new_tab: bool,
    pub via_fallback: bool,
}

/// Resolve the navigation target of `tile` given its current status.
///
/// An offline tile with a fallback URL leads to the fallback; everything
/// else leads to the primary URL. Returns `None` when there is nowhere to go.
pub fn resolve(tile: &Tile, status: Option<Status>) -> Option<Navigation> {
    let new_tab = tile.opens_in_new_tab();

    if status == Some(Status::Offline) {
        if let Some(fallback) = tile.fallback() {
            return Some(Navigation {
                url: fallback.to_string(),
                new_tab,
                via_fallback: true,
            });
        }
    }

    tile.primary_url().map(|url| Navigation {
        url: url.to_string(),
        new_tab,
        via_fallback: false,
    })
}
