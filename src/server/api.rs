// src/server/api.rs
//! Status API consumed by the start page.

use crate::config::{self, Dashboard};
use crate::dashboard::StatusBoard;
use crate::health::HealthScheduler;
use arc_swap::ArcSwap;
use hyper::header::{HeaderValue, CONTENT_TYPE, LOCATION};
use hyper::{Body, Method, Request, Response, StatusCode};
use percent_encoding::percent_decode_str;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Everything the API handlers share.
pub struct AppState {
    scheduler: HealthScheduler,
    board: StatusBoard,
    dashboard: ArcSwap<Dashboard>,
    config_path: Option<PathBuf>,
}

impl AppState {
    pub fn new(scheduler: HealthScheduler, dashboard: Dashboard, config_path: Option<PathBuf>) -> Self {
        Self {
            board: StatusBoard::new(scheduler.clone()),
            scheduler,
            dashboard: ArcSwap::from_pointee(dashboard),
            config_path,
        }
    }

    pub fn board(&self) -> &StatusBoard {
        &self.board
    }

    pub fn dashboard(&self) -> Arc<Dashboard> {
        self.dashboard.load_full()
    }

    pub fn config_path(&self) -> Option<&PathBuf> {
        self.config_path.as_ref()
    }

    /// Make `dashboard` current and restart health checks against it.
    pub fn apply(&self, dashboard: Dashboard) {
        self.scheduler
            .start(dashboard.tiles.clone(), dashboard.health_check.clone());
        self.dashboard.store(Arc::new(dashboard));
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Not found")]
    NotFound,

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ApiError> for Response<Body> {
    fn from(err: ApiError) -> Self {
        let status = match err {
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let mut response = Response::new(Body::from(err.to_string()));
        *response.status_mut() = status;
        response
    }
}

fn json<T: Serialize>(status: StatusCode, value: &T) -> Result<Response<Body>, ApiError> {
    let body = serde_json::to_vec(value).map_err(|e| ApiError::Internal(e.to_string()))?;

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(response)
}

fn redirect(url: &str) -> Result<Response<Body>, ApiError> {
    let location = HeaderValue::from_str(url)
        .map_err(|_| ApiError::BadRequest(format!("unusable navigation target: {}", url)))?;

    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::FOUND;
    response.headers_mut().insert(LOCATION, location);
    Ok(response)
}

pub async fn route(state: Arc<AppState>, req: Request<Body>) -> Result<Response<Body>, ApiError> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    debug!(%method, %path, "api request");

    match (&method, path.as_str()) {
        (&Method::GET, "/api/status") => json(StatusCode::OK, &state.board().report()),

        (&Method::POST, "/api/refresh") => {
            state.board().poll_now().await;
            json(StatusCode::OK, &state.board().report())
        }

        (&Method::GET, "/api/config") => json(StatusCode::OK, &*state.dashboard()),

        (&Method::PUT, "/api/config") => {
            let bytes = hyper::body::to_bytes(req.into_body())
                .await
                .map_err(|e| ApiError::BadRequest(e.to_string()))?;
            let text = std::str::from_utf8(&bytes).map_err(|e| ApiError::BadRequest(e.to_string()))?;
            let dashboard = Dashboard::from_json(text).map_err(|e| ApiError::BadRequest(e.to_string()))?;

            if let Some(path) = state.config_path() {
                config::save_config(path, &dashboard).await.map_err(|e| {
                    error!(error = %e, "failed to persist imported dashboard");
                    ApiError::Internal(e.to_string())
                })?;
            }

            info!(tiles = dashboard.tiles.len(), "Dashboard imported");
            state.apply(dashboard);
            json(StatusCode::OK, &*state.dashboard())
        }

        (&Method::GET, _) if path.starts_with("/go/") => {
            let id = percent_decode_str(&path["/go/".len()..])
                .decode_utf8()
                .map_err(|e| ApiError::BadRequest(e.to_string()))?;
            let dashboard = state.dashboard();
            let tile = dashboard.tile(&id).ok_or(ApiError::NotFound)?;
            let navigation = state.board().navigate(tile).ok_or(ApiError::NotFound)?;
            redirect(&navigation.url)
        }

        _ => Err(ApiError::NotFound),
    }
}
