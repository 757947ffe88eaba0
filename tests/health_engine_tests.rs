// tests/health_engine_tests.rs
use async_trait::async_trait;
use homelab_pulse::config::{HealthCheckConfig, Tile};
use homelab_pulse::dashboard::StatusBoard;
use homelab_pulse::health::{HealthScheduler, Prober, Status, Transport, TransportError};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// `good.local` answers, anything on 10.255.255.1 blackholes, the rest refuse.
struct Lab;

#[async_trait]
impl Transport for Lab {
    async fn head_request(&self, url: &str, _timeout: Duration) -> Result<(), TransportError> {
        if url.starts_with("http://good.local") {
            Ok(())
        } else if url.starts_with("http://10.255.255.1") {
            futures::future::pending().await
        } else {
            Err(TransportError::Network("connection refused".into()))
        }
    }

    async fn load_probe(&self, url: &str, _timeout: Duration) -> Result<(), TransportError> {
        if url.starts_with("http://10.255.255.1") {
            futures::future::pending().await
        } else {
            Err(TransportError::Network("connection refused".into()))
        }
    }
}

fn board() -> (HealthScheduler, StatusBoard) {
    let scheduler = HealthScheduler::new(Prober::new(Arc::new(Lab)));
    let board = StatusBoard::new(scheduler.clone());
    (scheduler, board)
}

#[tokio::test]
async fn reachable_tile_ends_online() {
    let (scheduler, board) = board();
    let tile = Tile::new("x", "http://good.local").with_status_indicator(true);

    scheduler.start(vec![tile], HealthCheckConfig::new(30, 5));
    board.poll_now().await;

    assert_eq!(board.status_of("x"), Some(Status::Online));
    scheduler.stop();
}

#[tokio::test(start_paused = true)]
async fn blackholed_tile_ends_offline_within_its_timeout() {
    let (scheduler, board) = board();
    let tile = Tile::new("y", "http://10.255.255.1").with_status_indicator(true);
    scheduler.start(vec![tile], HealthCheckConfig::new(30, 1));

    let started = Instant::now();
    let statuses = board.poll_now().await;

    assert_eq!(statuses.get("y"), Some(Status::Offline));
    assert!(started.elapsed() <= Duration::from_secs(4));
    scheduler.stop();
}

#[tokio::test]
async fn empty_url_is_offline_and_navigates_to_fallback() {
    let (scheduler, board) = board();
    let tile = Tile::new("z", "")
        .with_fallback_url("http://backup.local")
        .with_status_indicator(true);
    scheduler.start(vec![tile.clone()], HealthCheckConfig::new(30, 5));

    let statuses = board.poll_now().await;
    assert_eq!(statuses.get("z"), Some(Status::Offline));

    let navigation = board.navigate(&tile).expect("fallback target");
    assert_eq!(navigation.url, "http://backup.local");
    scheduler.stop();
}

#[tokio::test(start_paused = true)]
async fn timer_keeps_refreshing_the_board() {
    let (scheduler, board) = board();
    let tiles = vec![
        Tile::new("a", "http://good.local/a").with_status_indicator(true),
        Tile::new("b", "http://refused.local").with_status_indicator(true),
        Tile::new("c", "http://good.local/c"),
    ];
    scheduler.start(tiles, HealthCheckConfig::new(10, 2));
    assert!(board.is_checking());

    let mut updates = board.subscribe();
    let mut settled = 0;
    while settled < 3 {
        updates.changed().await.unwrap();
        let statuses = updates.borrow_and_update().clone();
        assert_eq!(statuses.len(), 2);
        assert!(!statuses.contains("c"));
        if !statuses.any_checking() {
            assert_eq!(statuses.get("a"), Some(Status::Online));
            assert_eq!(statuses.get("b"), Some(Status::Offline));
            settled += 1;
        }
    }

    scheduler.stop();
}
