// src/health/status.rs
use crate::config::TileId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// What the status indicator of a tile shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Online,
    Offline,
    Checking,
}

impl Status {
    pub fn is_settled(self) -> bool {
        self != Status::Checking
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Status::Online => "online",
            Status::Offline => "offline",
            Status::Checking => "checking",
        };
        f.write_str(label)
    }
}

/// Terminal outcome of a single probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reachability {
    Online,
    Offline,
}

impl From<Reachability> for Status {
    fn from(reachability: Reachability) -> Self {
        match reachability {
            Reachability::Online => Status::Online,
            Reachability::Offline => Status::Offline,
        }
    }
}

/// Tile id to status. Always replaced as a whole, never patched in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusMap(BTreeMap<TileId, Status>);

impl StatusMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// A map with every given tile marked as checking.
    pub fn checking<'a, I>(ids: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        ids.into_iter()
            .map(|id| (id.to_string(), Status::Checking))
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<Status> {
        self.0.get(id).copied()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Status)> {
        self.0.iter().map(|(id, status)| (id.as_str(), *status))
    }

    pub fn any_checking(&self) -> bool {
        self.0.values().any(|status| *status == Status::Checking)
    }

    pub fn count(&self, status: Status) -> usize {
        self.0.values().filter(|s| **s == status).count()
    }

    /// This map with every `checking` entry put back to its status in
    /// `settled`, or removed when `settled` never saw the tile.
    pub fn without_checking(&self, settled: &StatusMap) -> StatusMap {
        self.0
            .iter()
            .filter_map(|(id, status)| match status {
                Status::Checking => settled.get(id).map(|previous| (id.clone(), previous)),
                settled_status => Some((id.clone(), *settled_status)),
            })
            .collect()
    }
}

impl FromIterator<(TileId, Status)> for StatusMap {
    fn from_iter<T: IntoIterator<Item = (TileId, Status)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
