// src/health/transport.rs
//! Network primitives the prober is built on.
//!
//! The prober only ever asks two questions: "did a HEAD request get any
//! answer at all?" and "can the site's favicon be loaded?". Keeping them
//! behind a trait lets the probe algorithm run against a fake in tests.

use async_trait::async_trait;
use reqwest::{header, redirect, Client, StatusCode};
use std::time::Duration;
use tracing::debug;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Request timeout")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Minimal request against `url`. Any response counts as success;
    /// only transport failures are errors.
    async fn head_request(&self, url: &str, timeout: Duration) -> Result<(), TransportError>;

    /// Secondary best-effort probe, the equivalent of loading an image.
    async fn load_probe(&self, url: &str, timeout: Duration) -> Result<(), TransportError>;
}

/// `Transport` backed by a shared reqwest client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, TransportError> {
        // Redirects are not followed: a 3xx already proves the host answered.
        // Targets live on the LAN, so system proxies are bypassed.
        let client = Client::builder()
            .user_agent(concat!("homelab-pulse/", env!("CARGO_PKG_VERSION")))
            .redirect(redirect::Policy::none())
            .no_proxy()
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;

        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

fn parse_http_url(url: &str) -> Result<Url, TransportError> {
    let parsed = Url::parse(url).map_err(|e| TransportError::InvalidUrl(e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(TransportError::UnsupportedScheme(other.to_string())),
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_builder() {
        TransportError::InvalidUrl(err.to_string())
    } else {
        TransportError::Network(err.to_string())
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn head_request(&self, url: &str, timeout: Duration) -> Result<(), TransportError> {
        let url = parse_http_url(url)?;

        let response = self
            .client
            .head(url)
            .header(header::CACHE_CONTROL, "no-cache")
            .header(header::PRAGMA, "no-cache")
            .timeout(timeout)
            .send()
            .await
            .map_err(classify)?;

        // The status is deliberately ignored: a 404 or 503 still means
        // something is listening.
        debug!(status = %response.status(), url = %response.url(), "head request answered");
        Ok(())
    }

    async fn load_probe(&self, url: &str, timeout: Duration) -> Result<(), TransportError> {
        let url = parse_http_url(url)?;

        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_MODIFIED {
            Ok(())
        } else {
            Err(TransportError::Network(format!("HTTP {}", status)))
        }
    }
}
