// src/health/scheduler.rs
use super::prober::Prober;
use super::status::{Status, StatusMap};
use crate::config::{HealthCheckConfig, Tile};
use arc_swap::{ArcSwap, ArcSwapOption};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Tiles and settings a cycle runs against. Replaced as a whole on `start`.
#[derive(Debug, Clone, Default)]
pub struct Watchlist {
    pub tiles: Vec<Tile>,
    pub config: HealthCheckConfig,
}

impl Watchlist {
    pub fn eligible(&self) -> Vec<Tile> {
        self.tiles
            .iter()
            .filter(|tile| tile.is_health_checked())
            .cloned()
            .collect()
    }
}

struct TimerSlot {
    handle: JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
}

impl TimerSlot {
    fn cancel(self) {
        let _ = self.shutdown_tx.send(true);
        self.handle.abort();
    }
}

struct Inner {
    prober: Prober,
    watchlist: ArcSwap<Watchlist>,
    statuses: watch::Sender<Arc<StatusMap>>,
    settled_at: ArcSwapOption<DateTime<Utc>>,
    /// Last map published by a cycle that ran to completion.
    last_settled: ArcSwap<StatusMap>,
    timer: Mutex<Option<TimerSlot>>,
    /// Generation of the newest cycle. Guards every publication so a stale
    /// cycle can never overwrite a newer one.
    generation: Mutex<u64>,
}

/// A cycle that has published its `checking` map and still has to probe.
struct PendingCycle {
    id: Uuid,
    generation: u64,
    tiles: Vec<Tile>,
    timeout: Duration,
}

/// Polls every tile that shows a status indicator and publishes the
/// resulting `StatusMap`.
///
/// Cycles may overlap when one outlasts the interval. The latest cycle to
/// start wins: results of a cycle that has been overtaken, or that was
/// still running when the scheduler was stopped, are dropped.
#[derive(Clone)]
pub struct HealthScheduler {
    inner: Arc<Inner>,
}

impl HealthScheduler {
    pub fn new(prober: Prober) -> Self {
        let (statuses, _) = watch::channel(Arc::new(StatusMap::new()));

        Self {
            inner: Arc::new(Inner {
                prober,
                watchlist: ArcSwap::from_pointee(Watchlist::default()),
                statuses,
                settled_at: ArcSwapOption::empty(),
                last_settled: ArcSwap::from_pointee(StatusMap::new()),
                timer: Mutex::new(None),
                generation: Mutex::new(0),
            }),
        }
    }

    /// (Re)configure the watched tiles.
    ///
    /// Any previous timer is torn down first. When enabled, a cycle begins
    /// before this returns (its `checking` map is already visible) and a
    /// timer is armed for every `config.interval` seconds after that.
    pub fn start(&self, tiles: Vec<Tile>, config: HealthCheckConfig) {
        let mut timer = self.inner.timer.lock();
        if let Some(previous) = timer.take() {
            previous.cancel();
        }
        self.invalidate_in_flight();

        let enabled = config.enabled;
        let period = config.interval();
        self.inner
            .watchlist
            .store(Arc::new(Watchlist { tiles, config }));

        if !enabled {
            info!("Health checks disabled");
            return;
        }

        if let Some(cycle) = self.begin_cycle() {
            let scheduler = self.clone();
            tokio::spawn(async move {
                scheduler.settle(cycle).await;
            });
        }

        *timer = Some(self.arm_timer(period));
        info!("Health checks every {:?}", period);
    }

    /// Cancel the timer. Results of cycles still in flight are discarded.
    pub fn stop(&self) {
        if let Some(previous) = self.inner.timer.lock().take() {
            previous.cancel();
            info!("Health checks stopped");
        }
        self.invalidate_in_flight();
    }

    /// Run one cycle now, regardless of the timer, and return its result.
    ///
    /// When checks are disabled or no tile is eligible this is a no-op and
    /// the current map is returned.
    pub async fn poll_now(&self) -> Arc<StatusMap> {
        match self.begin_cycle() {
            Some(cycle) => self.settle(cycle).await,
            None => self.snapshot(),
        }
    }

    pub fn snapshot(&self) -> Arc<StatusMap> {
        self.inner.statuses.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<StatusMap>> {
        self.inner.statuses.subscribe()
    }

    /// When the last published cycle settled.
    pub fn settled_at(&self) -> Option<DateTime<Utc>> {
        self.inner.settled_at.load_full().map(|at| *at)
    }

    pub fn watchlist(&self) -> Arc<Watchlist> {
        self.inner.watchlist.load_full()
    }

    pub fn is_running(&self) -> bool {
        self.inner.timer.lock().is_some()
    }

    /// Drop results of running cycles. Their `checking` entries go back to
    /// the last settled result so nothing stays checking with no cycle left.
    fn invalidate_in_flight(&self) {
        let mut generation = self.inner.generation.lock();
        *generation += 1;

        let current = self.snapshot();
        if current.any_checking() {
            let restored = current.without_checking(&self.inner.last_settled.load());
            self.inner.statuses.send_replace(Arc::new(restored));
        }
    }

    /// Publish the `checking` map for every eligible tile and hand back the
    /// work still to do. Nothing here suspends.
    fn begin_cycle(&self) -> Option<PendingCycle> {
        let watchlist = self.inner.watchlist.load();
        if !watchlist.config.enabled {
            return None;
        }

        let tiles = watchlist.eligible();
        if tiles.is_empty() {
            debug!("No tiles to check");
            return None;
        }

        let checking = Arc::new(StatusMap::checking(tiles.iter().map(|t| t.id.as_str())));
        let generation = {
            let mut generation = self.inner.generation.lock();
            *generation += 1;
            self.inner.statuses.send_replace(checking);
            *generation
        };

        Some(PendingCycle {
            id: Uuid::new_v4(),
            generation,
            tiles,
            timeout: watchlist.config.timeout(),
        })
    }

    async fn settle(&self, cycle: PendingCycle) -> Arc<StatusMap> {
        let span = info_span!("poll_cycle", cycle_id = %cycle.id, tiles = cycle.tiles.len());
        self.probe_all(cycle).instrument(span).await
    }

    async fn probe_all(&self, cycle: PendingCycle) -> Arc<StatusMap> {
        let started = Instant::now();

        let tasks: Vec<_> = cycle
            .tiles
            .iter()
            .map(|tile| {
                let prober = self.inner.prober.clone();
                let target = tile.check_url().to_string();
                let timeout = cycle.timeout;
                tokio::spawn(async move { prober.probe(&target, timeout).await })
            })
            .collect();

        // Wait for every probe; one failing never affects its siblings
        let results = futures::future::join_all(tasks).await;

        let statuses: StatusMap = cycle
            .tiles
            .iter()
            .zip(results)
            .map(|(tile, result)| {
                let status = match result {
                    Ok(reachability) => Status::from(reachability),
                    Err(e) => {
                        warn!(tile = %tile.id, error = %e, "Probe task failed");
                        Status::Offline
                    }
                };
                (tile.id.clone(), status)
            })
            .collect();
        let statuses = Arc::new(statuses);

        let published = {
            let generation = self.inner.generation.lock();
            if *generation == cycle.generation {
                self.inner.statuses.send_replace(statuses.clone());
                self.inner.last_settled.store(statuses.clone());
                self.inner.settled_at.store(Some(Arc::new(Utc::now())));
                true
            } else {
                false
            }
        };

        if published {
            info!(
                "Health check complete: {} online, {} offline in {:?}",
                statuses.count(Status::Online),
                statuses.count(Status::Offline),
                started.elapsed()
            );
        } else {
            debug!("Cycle overtaken, discarding its results");
        }

        statuses
    }

    fn arm_timer(&self, period: Duration) -> TimerSlot {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        // The timer must not keep the scheduler alive on its own
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let Some(inner) = weak.upgrade() else { break };
                        let scheduler = HealthScheduler { inner };
                        if let Some(cycle) = scheduler.begin_cycle() {
                            tokio::spawn(async move {
                                scheduler.settle(cycle).await;
                            });
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        debug!("Health timer shutting down");
                        break;
                    }
                }
            }
        });

        TimerSlot {
            handle,
            shutdown_tx,
        }
    }
}
