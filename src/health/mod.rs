// src/health/mod.rs
mod prober;
mod scheduler;
mod status;
mod transport;

pub use prober::{favicon_url, Prober, FALLBACK_PROBE_TIMEOUT};
pub use scheduler::{HealthScheduler, Watchlist};
pub use status::{Reachability, Status, StatusMap};
pub use transport::{ReqwestTransport, Transport, TransportError};
