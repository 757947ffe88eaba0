// src/health/prober.rs
use super::status::Reachability;
use super::transport::{Transport, TransportError};
use chrono::Utc;
use std::sync::Arc;
use tokio::time::{timeout, Duration};
use tracing::debug;
use url::Url;

/// Budget of the favicon fallback, independent of the configured timeout.
pub const FALLBACK_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Decides whether a single URL is reachable.
///
/// This is best-effort reachability, not service health: the primary probe
/// cannot see response codes, so a server answering 500 reports online.
/// Only DNS failures, refused connections and timeouts count as offline.
#[derive(Clone)]
pub struct Prober {
    transport: Arc<dyn Transport>,
    fallback_timeout: Duration,
}

impl Prober {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            fallback_timeout: FALLBACK_PROBE_TIMEOUT,
        }
    }

    pub fn with_fallback_timeout(mut self, fallback_timeout: Duration) -> Self {
        self.fallback_timeout = fallback_timeout;
        self
    }

    /// Probe `url`, never failing.
    ///
    /// A HEAD request runs first under `deadline`. A timeout there is final;
    /// any other failure falls back to loading `<origin>/favicon.ico`.
    pub async fn probe(&self, url: &str, deadline: Duration) -> Reachability {
        let url = url.trim();
        if url.is_empty() {
            debug!("no probe target, reporting offline");
            return Reachability::Offline;
        }

        let result = timeout(deadline, self.transport.head_request(url, deadline)).await;

        match result {
            Ok(Ok(())) => Reachability::Online,
            Ok(Err(TransportError::Timeout)) | Err(_) => {
                debug!(%url, ?deadline, "probe timed out");
                Reachability::Offline
            }
            Ok(Err(e)) => {
                debug!(%url, error = %e, "head request failed, trying favicon");
                self.favicon_probe(url).await
            }
        }
    }

    async fn favicon_probe(&self, url: &str) -> Reachability {
        let target = match favicon_url(url, Utc::now().timestamp_millis()) {
            Ok(target) => target,
            Err(e) => {
                debug!(%url, error = %e, "cannot derive favicon location");
                return Reachability::Offline;
            }
        };

        let result = timeout(
            self.fallback_timeout,
            self.transport.load_probe(target.as_str(), self.fallback_timeout),
        )
        .await;

        match result {
            Ok(Ok(())) => Reachability::Online,
            Ok(Err(e)) => {
                debug!(%target, error = %e, "favicon probe failed");
                Reachability::Offline
            }
            Err(_) => {
                debug!(%target, "favicon probe timed out");
                Reachability::Offline
            }
        }
    }
}

/// `<origin>/favicon.ico?t=<cache_buster>` for the origin of `url`.
pub fn favicon_url(url: &str, cache_buster: i64) -> Result<Url, TransportError> {
    let parsed = Url::parse(url).map_err(|e| TransportError::InvalidUrl(e.to_string()))?;

    let origin = parsed.origin();
    if !origin.is_tuple() {
        return Err(TransportError::UnsupportedScheme(parsed.scheme().to_string()));
    }

    let favicon = format!(
        "{}/favicon.ico?t={}",
        origin.ascii_serialization(),
        cache_buster
    );
    Url::parse(&favicon).map_err(|e| TransportError::InvalidUrl(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// Scripted transport recording every call it receives.
    struct FakeTransport {
        head: Option<Result<(), TransportError>>,
        load: Option<Result<(), TransportError>>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeTransport {
        /// `None` means the call never completes.
        fn new(
            head: Option<Result<(), TransportError>>,
            load: Option<Result<(), TransportError>>,
        ) -> Arc<Self> {
            Arc::new(Self {
                head,
                load,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn head_request(&self, url: &str, _timeout: Duration) -> Result<(), TransportError> {
            self.calls.lock().push(format!("HEAD {}", url));
            match self.head.clone() {
                Some(result) => result,
                None => futures::future::pending().await,
            }
        }

        async fn load_probe(&self, url: &str, _timeout: Duration) -> Result<(), TransportError> {
            self.calls.lock().push(format!("LOAD {}", url));
            match self.load.clone() {
                Some(result) => result,
                None => futures::future::pending().await,
            }
        }
    }

    fn network_error() -> TransportError {
        TransportError::Network("connection refused".to_string())
    }

    #[tokio::test]
    async fn answered_head_request_is_online() {
        let transport = FakeTransport::new(Some(Ok(())), None);
        let prober = Prober::new(transport.clone());

        let result = prober.probe("http://good.local", Duration::from_secs(5)).await;

        assert_eq!(result, Reachability::Online);
        assert_eq!(transport.calls(), vec!["HEAD http://good.local"]);
    }

    #[tokio::test]
    async fn empty_url_is_offline_without_io() {
        let transport = FakeTransport::new(Some(Ok(())), Some(Ok(())));
        let prober = Prober::new(transport.clone());

        assert_eq!(prober.probe("", Duration::from_secs(5)).await, Reachability::Offline);
        assert_eq!(prober.probe("   ", Duration::from_secs(5)).await, Reachability::Offline);
        assert!(transport.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_final_and_skips_fallback() {
        let transport = FakeTransport::new(None, Some(Ok(())));
        let prober = Prober::new(transport.clone());

        let started = tokio::time::Instant::now();
        let result = prober.probe("http://10.255.255.1", Duration::from_secs(1)).await;

        assert_eq!(result, Reachability::Offline);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(1) && elapsed < Duration::from_millis(1100));
        assert_eq!(transport.calls(), vec!["HEAD http://10.255.255.1"]);
    }

    #[tokio::test]
    async fn transport_reported_timeout_skips_fallback() {
        let transport = FakeTransport::new(Some(Err(TransportError::Timeout)), Some(Ok(())));
        let prober = Prober::new(transport.clone());

        let result = prober.probe("http://slow.local", Duration::from_secs(5)).await;

        assert_eq!(result, Reachability::Offline);
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn network_error_falls_back_to_favicon() {
        let transport = FakeTransport::new(Some(Err(network_error())), Some(Ok(())));
        let prober = Prober::new(transport.clone());

        let result = prober
            .probe("http://plex.local:32400/web/index.html", Duration::from_secs(5))
            .await;

        assert_eq!(result, Reachability::Online);
        let calls = transport.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[1].starts_with("LOAD http://plex.local:32400/favicon.ico?t="));
    }

    #[tokio::test]
    async fn failed_fallback_is_offline() {
        let transport = FakeTransport::new(Some(Err(network_error())), Some(Err(network_error())));
        let prober = Prober::new(transport);

        let result = prober.probe("http://down.local", Duration::from_secs(5)).await;
        assert_eq!(result, Reachability::Offline);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_fallback_gives_up_after_its_own_budget() {
        let transport = FakeTransport::new(Some(Err(network_error())), None);
        let prober = Prober::new(transport);

        let started = tokio::time::Instant::now();
        let result = prober.probe("http://down.local", Duration::from_secs(10)).await;

        assert_eq!(result, Reachability::Offline);
        let elapsed = started.elapsed();
        assert!(elapsed >= FALLBACK_PROBE_TIMEOUT && elapsed < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn malformed_url_is_offline_after_primary_failure() {
        let transport = FakeTransport::new(
            Some(Err(TransportError::InvalidUrl("relative URL".to_string()))),
            Some(Ok(())),
        );
        let prober = Prober::new(transport.clone());

        let result = prober.probe("nas.local/admin", Duration::from_secs(5)).await;

        assert_eq!(result, Reachability::Offline);
        assert_eq!(transport.calls(), vec!["HEAD nas.local/admin"]);
    }

    #[test]
    fn favicon_url_uses_origin_only() {
        let url = favicon_url("https://user:pw@proxmox.local:8006/api2/json/version?x=1#top", 42).unwrap();
        assert_eq!(url.as_str(), "https://proxmox.local:8006/favicon.ico?t=42");

        let url = favicon_url("http://nas.local:80/", 7).unwrap();
        assert_eq!(url.as_str(), "http://nas.local/favicon.ico?t=7");
    }

    #[test]
    fn favicon_url_rejects_opaque_origins() {
        assert!(matches!(
            favicon_url("mailto:admin@nas.local", 1),
            Err(TransportError::UnsupportedScheme(_))
        ));
        assert!(matches!(favicon_url("::", 1), Err(TransportError::InvalidUrl(_))));
    }
}
