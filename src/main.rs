// src/main.rs
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

use homelab_pulse::{
    config::{self, Dashboard},
    health::{HealthScheduler, Prober, ReqwestTransport},
    server::{AppState, RequestHandler, ServerBuilder},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("homelab_pulse=debug".parse()?)
                .add_directive("hyper=info".parse()?),
        )
        .init();

    // Load configuration
    let config_path = PathBuf::from(
        std::env::args()
            .nth(1)
            .unwrap_or_else(|| "dashboard.yaml".to_string()),
    );

    info!("Loading configuration from: {}", config_path.display());
    let dashboard = load_or_default(&config_path).await?;

    // Health engine
    let transport = Arc::new(ReqwestTransport::new()?);
    let scheduler = HealthScheduler::new(Prober::new(transport));
    let state = Arc::new(AppState::new(
        scheduler.clone(),
        dashboard.clone(),
        Some(config_path.clone()),
    ));

    let transitions = state.board().spawn_transition_logger();
    state.apply(dashboard);

    #[cfg(unix)]
    spawn_reload_on_hangup(state.clone(), config_path);

    let addr = config::listen_addr()?;
    info!("Starting status API on {}", addr);

    ServerBuilder::new(addr)
        .with_handler(RequestHandler::new(state))
        .serve_with_shutdown(shutdown_signal())
        .await?;

    scheduler.stop();
    transitions.abort();
    info!("Shutdown complete");
    Ok(())
}

/// A missing file starts the page with the sample dashboard; a broken one
/// is an error.
async fn load_or_default(path: &Path) -> Result<Dashboard> {
    if tokio::fs::try_exists(path).await.unwrap_or(false) {
        config::load_config(path).await
    } else {
        warn!(
            "No configuration at {}, using the sample dashboard",
            path.display()
        );
        Ok(Dashboard::default())
    }
}

/// SIGHUP re-reads the config file and reconfigures health checks.
#[cfg(unix)]
fn spawn_reload_on_hangup(state: Arc<AppState>, path: PathBuf) {
    tokio::spawn(async move {
        let mut hangup = match signal::unix::signal(signal::unix::SignalKind::hangup()) {
            Ok(hangup) => hangup,
            Err(e) => {
                error!("Failed to install SIGHUP handler: {}", e);
                return;
            }
        };

        while hangup.recv().await.is_some() {
            match config::load_config(&path).await {
                Ok(dashboard) => {
                    info!(tiles = dashboard.tiles.len(), "Configuration reloaded");
                    state.apply(dashboard);
                }
                Err(e) => error!("Reload failed, keeping current configuration: {:#}", e),
            }
        }
    });
}

// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
