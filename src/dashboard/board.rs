// src/dashboard/board.rs
use super::navigation::{self, Navigation};
use crate::config::{Tile, TileId};
use crate::health::{HealthScheduler, Status, StatusMap};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Body returned to the page by the status API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub statuses: StatusMap,
    pub checking: bool,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Read-only view of the scheduler for the presentation layer.
#[derive(Clone)]
pub struct StatusBoard {
    scheduler: HealthScheduler,
}

impl StatusBoard {
    pub fn new(scheduler: HealthScheduler) -> Self {
        Self { scheduler }
    }

    pub fn snapshot(&self) -> Arc<StatusMap> {
        self.scheduler.snapshot()
    }

    pub fn status_of(&self, tile_id: &str) -> Option<Status> {
        self.scheduler.snapshot().get(tile_id)
    }

    /// True while any tile is still being checked.
    pub fn is_checking(&self) -> bool {
        self.scheduler.snapshot().any_checking()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<StatusMap>> {
        self.scheduler.subscribe()
    }

    /// Manual refresh.
    pub async fn poll_now(&self) -> Arc<StatusMap> {
        self.scheduler.poll_now().await
    }

    pub fn report(&self) -> StatusReport {
        let statuses = self.snapshot();
        StatusReport {
            checking: statuses.any_checking(),
            statuses: (*statuses).clone(),
            updated_at: self.scheduler.settled_at(),
        }
    }

    /// Tile with `id` among the tiles currently handed to the scheduler.
    pub fn tile(&self, id: &str) -> Option<Tile> {
        self.scheduler
            .watchlist()
            .tiles
            .iter()
            .find(|tile| tile.id == id)
            .cloned()
    }

    /// Resolve a click on `tile` against the freshest known status.
    pub fn navigate(&self, tile: &Tile) -> Option<Navigation> {
        let status = self.status_of(&tile.id);
        let navigation = navigation::resolve(tile, status);
        if let Some(nav) = &navigation {
            if nav.via_fallback {
                info!(tile = %tile.id, url = %nav.url, "Service is offline, using fallback URL");
            }
        }
        navigation
    }

    /// Log every online/offline flip until the scheduler goes away.
    pub fn spawn_transition_logger(&self) -> JoinHandle<()> {
        let mut updates = self.subscribe();

        tokio::spawn(async move {
            let mut last_known: HashMap<TileId, Status> = HashMap::new();

            while updates.changed().await.is_ok() {
                let statuses = updates.borrow_and_update().clone();
                for change in transitions(&mut last_known, &statuses) {
                    match change.to {
                        Status::Online => info!(tile = %change.tile, "Tile is back online"),
                        _ => warn!(tile = %change.tile, "Tile went offline"),
                    }
                }
            }

            debug!("Status channel closed, transition logger exiting");
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub tile: TileId,
    pub from: Status,
    pub to: Status,
}

/// Compare settled entries of `statuses` with the last settled status seen
/// for each tile, updating `last_known`. `checking` entries are ignored and
/// a tile's first settled status is not a transition.
pub fn transitions(
    last_known: &mut HashMap<TileId, Status>,
    statuses: &StatusMap,
) -> Vec<Transition> {
    let mut changes = Vec::new();

    for (id, status) in statuses.iter().filter(|(_, s)| s.is_settled()) {
        match last_known.insert(id.to_string(), status) {
            Some(previous) if previous != status => changes.push(Transition {
                tile: id.to_string(),
                from: previous,
                to: status,
            }),
            _ => {}
        }
    }

    changes
}
