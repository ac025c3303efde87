//! Cache-first request gateway with a versioned install/activate lifecycle.

use parking_lot::Mutex;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use shoresquad_core::{AppError, CacheError, OfflineConfig};
use thiserror::Error;
use tracing::instrument;
use url::{Origin, Url};

use crate::network::{FetchError, Fetcher};
use crate::request::{CachedResponse, Request};
use crate::store::{retain_only, CacheBucket, CacheStore};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Precache of {url} returned HTTP {status}")]
    PrecacheStatus { url: String, status: u16 },

    #[error("Invalid URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("Cannot {action} while {state:?}")]
    InvalidState {
        action: &'static str,
        state: WorkerState,
    },
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Cache(e) => AppError::Cache(e),
            GatewayError::Fetch(FetchError::Network { source, .. }) => AppError::Network(source),
            other => AppError::Service(other.to_string()),
        }
    }
}

/// Lifecycle of one gateway version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    /// Install failed or a newer version took over; never serves requests
    Redundant,
}

/// Messages a page can post to the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    SkipWaiting,
}

/// Outcome of offering a request to the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interception {
    /// Not handled; the caller goes to the network itself
    PassThrough,
    Respond(CachedResponse),
}

/// Resolved settings for one gateway version.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub origin: Url,
    pub version: String,
    pub offline_fallback: Url,
    pub precache: Vec<Url>,
}

fn resolve(base: &Url, path: &str) -> Result<Url, GatewayError> {
    base.join(path).map_err(|e| GatewayError::InvalidUrl {
        url: path.to_string(),
        message: e.to_string(),
    })
}

impl GatewayConfig {
    pub fn from_config(config: &OfflineConfig) -> Result<Self, GatewayError> {
        let origin = Url::parse(&config.origin).map_err(|e| GatewayError::InvalidUrl {
            url: config.origin.clone(),
            message: e.to_string(),
        })?;

        let offline_fallback = resolve(&origin, &config.offline_fallback)?;
        let precache = config
            .precache
            .iter()
            .map(|path| resolve(&origin, path))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            origin,
            version: config.cache_version.clone(),
            offline_fallback,
            precache,
        })
    }
}

#[derive(Debug)]
struct Lifecycle {
    state: WorkerState,
    skip_waiting: bool,
    controls_clients: bool,
}

/// Intercepts requests for one origin and answers them cache-first.
pub struct Gateway<S, F> {
    store: S,
    fetcher: F,
    config: GatewayConfig,
    origin: Origin,
    lifecycle: Mutex<Lifecycle>,
}

impl<S: CacheStore, F: Fetcher> Gateway<S, F> {
    pub fn new(store: S, fetcher: F, config: GatewayConfig) -> Self {
        let origin = config.origin.origin();
        Self {
            store,
            fetcher,
            config,
            origin,
            lifecycle: Mutex::new(Lifecycle {
                state: WorkerState::Parsed,
                skip_waiting: false,
                controls_clients: false,
            }),
        }
    }

    pub fn version(&self) -> &str {
        &self.config.version
    }

    pub fn state(&self) -> WorkerState {
        self.lifecycle.lock().state
    }

    pub fn skip_waiting(&self) -> bool {
        self.lifecycle.lock().skip_waiting
    }

    /// Whether this version currently intercepts requests
    pub fn controls_clients(&self) -> bool {
        self.lifecycle.lock().controls_clients
    }

    /// Installed and allowed to take over without waiting
    pub fn should_activate(&self) -> bool {
        let lifecycle = self.lifecycle.lock();
        lifecycle.state == WorkerState::Installed && lifecycle.skip_waiting
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn set_state(&self, state: WorkerState) {
        self.lifecycle.lock().state = state;
    }

    /// The bucket this version serves from, or `None` once another version
    /// has been activated in the same store. Never recreates a deleted bucket.
    fn serving_bucket(&self) -> Result<Option<S::Bucket>, CacheError> {
        if self.store.active()?.as_deref() != Some(self.config.version.as_str()) {
            return Ok(None);
        }
        self.store.get(&self.config.version)
    }

    fn retire(&self) {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.controls_clients {
            tracing::info!("Superseded by a newer cache version; no longer serving");
        }
        lifecycle.controls_clients = false;
        lifecycle.state = WorkerState::Redundant;
    }

    /// Fetch every precache entry and store them in the current bucket.
    ///
    /// Any failure leaves the bucket untouched and marks this version
    /// redundant. Success requests immediate activation.
    #[instrument(skip(self), fields(version = %self.config.version), level = "info")]
    pub async fn install(&self) -> WorkerState {
        {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.state != WorkerState::Parsed {
                tracing::warn!("Install requested while {:?}; ignoring", lifecycle.state);
                return lifecycle.state;
            }
            lifecycle.state = WorkerState::Installing;
        }

        match self.precache().await {
            Ok(count) => {
                tracing::info!("Caching {} app shell files", count);
                let mut lifecycle = self.lifecycle.lock();
                lifecycle.state = WorkerState::Installed;
                lifecycle.skip_waiting = true;
                lifecycle.state
            }
            Err(e) => {
                tracing::error!("Cache installation failed: {}", e);
                self.set_state(WorkerState::Redundant);
                WorkerState::Redundant
            }
        }
    }

    async fn precache(&self) -> Result<usize, GatewayError> {
        let mut entries = Vec::with_capacity(self.config.precache.len());

        for url in &self.config.precache {
            let response = self.fetcher.fetch(&Request::get(url.clone())).await?;
            if !response.is_success() {
                return Err(GatewayError::PrecacheStatus {
                    url: url.to_string(),
                    status: response.status,
                });
            }
            entries.push((url.clone(), response));
        }

        self.store.open(&self.config.version)?.put_all(&entries)?;
        Ok(entries.len())
    }

    /// Mark this version active in the store, delete every other version and
    /// take control of clients. Gateways of older versions sharing the store
    /// stop serving on their next request.
    ///
    /// Returns the versions that were removed.
    #[instrument(skip(self), fields(version = %self.config.version), level = "info")]
    pub async fn activate(&self) -> Result<Vec<String>, GatewayError> {
        {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.state != WorkerState::Installed {
                return Err(GatewayError::InvalidState {
                    action: "activate",
                    state: lifecycle.state,
                });
            }
            lifecycle.state = WorkerState::Activating;
        }

        let activated = self
            .store
            .set_active(&self.config.version)
            .and_then(|()| retain_only(&self.store, &self.config.version));

        match activated {
            Ok(removed) => {
                let mut lifecycle = self.lifecycle.lock();
                lifecycle.state = WorkerState::Activated;
                lifecycle.controls_clients = true;
                tracing::info!("Activated, removed {} old cache(s)", removed.len());
                Ok(removed)
            }
            Err(e) => {
                self.set_state(WorkerState::Installed);
                Err(e.into())
            }
        }
    }

    /// Answer a request cache-first.
    ///
    /// Only same-origin GETs are handled, and only while this version is the
    /// store's active one. A superseded gateway retires and passes everything
    /// through. A hit never touches the network. A miss goes to the network
    /// and a 200 same-origin response is written back. If the network fails,
    /// a navigation gets the cached offline page ([`CacheError::Miss`] when
    /// that page is not cached); anything else gets the fetch error.
    #[instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    pub async fn handle_fetch(&self, request: &Request) -> Result<Interception, GatewayError> {
        if !self.controls_clients()
            || request.method != Method::GET
            || request.url.origin() != self.origin
        {
            return Ok(Interception::PassThrough);
        }

        let Some(bucket) = self.serving_bucket()? else {
            self.retire();
            return Ok(Interception::PassThrough);
        };
        if let Some(hit) = bucket.lookup(&request.url)? {
            tracing::debug!("Cache hit");
            return Ok(Interception::Respond(hit));
        }

        match self.fetcher.fetch(request).await {
            Ok(response) => {
                if response.is_cacheable(&self.origin) {
                    if let Err(e) = bucket.put(&request.url, &response) {
                        tracing::warn!("Failed to cache {}: {}", request.url, e);
                    }
                }
                Ok(Interception::Respond(response))
            }
            Err(e) if request.is_navigation() => {
                tracing::info!("Offline navigation, serving {}", self.config.offline_fallback);
                match bucket.lookup(&self.config.offline_fallback)? {
                    Some(page) => Ok(Interception::Respond(page)),
                    None => {
                        tracing::warn!("Offline page not cached, navigation failed: {}", e);
                        Err(CacheError::Miss(self.config.offline_fallback.to_string()).into())
                    }
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn handle_message(&self, message: ControlMessage) {
        match message {
            ControlMessage::SkipWaiting => {
                tracing::debug!("Skip waiting requested");
                self.lifecycle.lock().skip_waiting = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::store::MemoryStore;

    /// Serves canned responses and counts calls. Unknown URLs fail as offline.
    #[derive(Default, Clone)]
    struct StubFetcher {
        responses: Arc<Mutex<HashMap<String, (u16, String)>>>,
        calls: Arc<AtomicUsize>,
    }

    impl StubFetcher {
        fn serve(&self, url: &str, status: u16, body: &str) {
            self.responses
                .lock()
                .insert(url.to_string(), (status, body.to_string()));
        }

        fn go_offline(&self) {
            self.responses.lock().clear();
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Fetcher for StubFetcher {
        fn fetch(
            &self,
            request: &Request,
        ) -> impl std::future::Future<Output = Result<CachedResponse, FetchError>> + Send
        {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let result = match self.responses.lock().get(request.url.as_str()) {
                Some((status, body)) => Ok(CachedResponse::new(
                    request.url.clone(),
                    *status,
                    body.as_bytes(),
                )),
                None => Err(FetchError::Offline(request.url.to_string())),
            };
            async move { result }
        }
    }

    const ORIGIN: &str = "http://localhost:8080";

    fn url(path: &str) -> Url {
        Url::parse(ORIGIN).unwrap().join(path).unwrap()
    }

    fn config(version: &str, precache: &[&str]) -> GatewayConfig {
        GatewayConfig {
            origin: url("/"),
            version: version.to_string(),
            offline_fallback: url("/index.html"),
            precache: precache.iter().copied().map(url).collect(),
        }
    }

    fn shell_fetcher() -> StubFetcher {
        let fetcher = StubFetcher::default();
        fetcher.serve(&url("/").to_string(), 200, "home");
        fetcher.serve(&url("/index.html").to_string(), 200, "<html>shell</html>");
        fetcher.serve(&url("/css/styles.css").to_string(), 200, "body {}");
        fetcher
    }

    async fn activated(
        store: MemoryStore,
        fetcher: StubFetcher,
        version: &str,
    ) -> Gateway<MemoryStore, StubFetcher> {
        let gateway = Gateway::new(
            store,
            fetcher,
            config(version, &["/", "/index.html", "/css/styles.css"]),
        );
        assert_eq!(gateway.install().await, WorkerState::Installed);
        gateway.activate().await.unwrap();
        gateway
    }

    #[test]
    fn test_config_resolves_paths_against_origin() {
        let cfg = GatewayConfig::from_config(&OfflineConfig::default()).unwrap();
        assert_eq!(cfg.offline_fallback.as_str(), "http://localhost:8080/index.html");
        assert_eq!(cfg.precache.len(), OfflineConfig::default().precache.len());
        assert_eq!(cfg.version, "shoresquad-v1.0.0");
    }

    #[test]
    fn test_config_rejects_bad_origin() {
        let cfg = OfflineConfig {
            origin: "nowhere".into(),
            ..OfflineConfig::default()
        };
        assert!(matches!(
            GatewayConfig::from_config(&cfg),
            Err(GatewayError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_control_message_wire_format() {
        let msg: ControlMessage = serde_json::from_str(r#"{"type":"SKIP_WAITING"}"#).unwrap();
        assert_eq!(msg, ControlMessage::SkipWaiting);
        assert!(serde_json::from_str::<ControlMessage>(r#"{"type":"RELOAD"}"#).is_err());
    }

    #[tokio::test]
    async fn test_install_caches_shell_and_requests_skip_waiting() {
        let store = MemoryStore::new();
        let gateway = Gateway::new(
            store.clone(),
            shell_fetcher(),
            config("v1", &["/", "/index.html"]),
        );
        assert_eq!(gateway.state(), WorkerState::Parsed);

        assert_eq!(gateway.install().await, WorkerState::Installed);
        assert!(gateway.skip_waiting());
        assert!(gateway.should_activate());
        assert!(!gateway.controls_clients());

        let mut keys = store.open("v1").unwrap().keys().unwrap();
        keys.sort();
        assert_eq!(keys, vec![url("/").to_string(), url("/index.html").to_string()]);
    }

    #[tokio::test]
    async fn test_install_is_all_or_nothing() {
        let store = MemoryStore::new();
        let fetcher = shell_fetcher();
        fetcher.serve(&url("/js/app.js").to_string(), 404, "missing");

        let gateway = Gateway::new(
            store.clone(),
            fetcher,
            config("v1", &["/", "/index.html", "/js/app.js"]),
        );

        assert_eq!(gateway.install().await, WorkerState::Redundant);
        assert!(!gateway.skip_waiting());
        assert!(store.open("v1").unwrap().keys().unwrap().is_empty());
        assert!(matches!(
            gateway.activate().await,
            Err(GatewayError::InvalidState { .. })
        ));
    }

    #[tokio::test]
    async fn test_install_twice_is_ignored() {
        let fetcher = shell_fetcher();
        let gateway = Gateway::new(MemoryStore::new(), fetcher.clone(), config("v1", &["/"]));
        gateway.install().await;
        gateway.install().await;
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_not_intercepting_before_activation() {
        let gateway = Gateway::new(MemoryStore::new(), shell_fetcher(), config("v1", &["/"]));
        gateway.install().await;
        let outcome = gateway.handle_fetch(&Request::get(url("/"))).await.unwrap();
        assert_eq!(outcome, Interception::PassThrough);
    }

    #[tokio::test]
    async fn test_hit_does_not_touch_network() {
        let fetcher = shell_fetcher();
        let gateway = activated(MemoryStore::new(), fetcher.clone(), "v1").await;
        let before = fetcher.calls();

        let outcome = gateway
            .handle_fetch(&Request::get(url("/css/styles.css")))
            .await
            .unwrap();

        assert_eq!(fetcher.calls(), before);
        match outcome {
            Interception::Respond(resp) => assert_eq!(resp.text(), "body {}"),
            other => panic!("expected a cached response, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_miss_writes_through_only_200() {
        let fetcher = shell_fetcher();
        let store = MemoryStore::new();
        let gateway = activated(store.clone(), fetcher.clone(), "v1").await;

        fetcher.serve(&url("/api/events").to_string(), 200, "[]");
        fetcher.serve(&url("/gone").to_string(), 404, "nope");

        gateway.handle_fetch(&Request::get(url("/api/events"))).await.unwrap();
        gateway.handle_fetch(&Request::get(url("/gone"))).await.unwrap();

        let bucket = store.open("v1").unwrap();
        assert!(bucket.lookup(&url("/api/events")).unwrap().is_some());
        assert!(bucket.lookup(&url("/gone")).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_non_get_and_cross_origin_pass_through() {
        let fetcher = shell_fetcher();
        let gateway = activated(MemoryStore::new(), fetcher.clone(), "v1").await;
        let before = fetcher.calls();

        let post = Request::get(url("/api/contact")).with_method(Method::POST);
        let cross = Request::get(Url::parse("https://api.data.gov.sg/v1/environment/rainfall").unwrap());

        assert_eq!(gateway.handle_fetch(&post).await.unwrap(), Interception::PassThrough);
        assert_eq!(gateway.handle_fetch(&cross).await.unwrap(), Interception::PassThrough);
        assert_eq!(fetcher.calls(), before);
    }

    #[tokio::test]
    async fn test_offline_navigation_gets_fallback_page() {
        let fetcher = shell_fetcher();
        let gateway = activated(MemoryStore::new(), fetcher.clone(), "v1").await;
        fetcher.go_offline();

        let outcome = gateway
            .handle_fetch(&Request::navigate(url("/events/42")))
            .await
            .unwrap();
        match outcome {
            Interception::Respond(resp) => assert_eq!(resp.text(), "<html>shell</html>"),
            other => panic!("expected the offline page, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_offline_subresource_miss_is_an_error() {
        let fetcher = shell_fetcher();
        let gateway = activated(MemoryStore::new(), fetcher.clone(), "v1").await;
        fetcher.go_offline();

        let err = gateway
            .handle_fetch(&Request::get(url("/images/hero.png")))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Fetch(FetchError::Offline(_))));
    }

    #[tokio::test]
    async fn test_offline_navigation_without_cached_page_is_a_miss() {
        let fetcher = shell_fetcher();
        let gateway = Gateway::new(MemoryStore::new(), fetcher.clone(), config("v1", &["/"]));
        gateway.install().await;
        gateway.activate().await.unwrap();
        fetcher.go_offline();

        let err = gateway
            .handle_fetch(&Request::navigate(url("/events")))
            .await
            .unwrap_err();
        match err {
            GatewayError::Cache(CacheError::Miss(page)) => {
                assert_eq!(page, url("/index.html").to_string())
            }
            other => panic!("expected a cache miss, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_superseded_gateway_stops_serving() {
        let store = MemoryStore::new();
        let old_fetcher = shell_fetcher();
        let old = activated(store.clone(), old_fetcher.clone(), "v1").await;
        let new = activated(store.clone(), shell_fetcher(), "v2").await;
        assert_eq!(store.active().unwrap().as_deref(), Some("v2"));

        let before = old_fetcher.calls();
        let outcome = old
            .handle_fetch(&Request::get(url("/css/styles.css")))
            .await
            .unwrap();

        assert_eq!(outcome, Interception::PassThrough);
        assert_eq!(old_fetcher.calls(), before);
        assert!(!old.controls_clients());
        assert_eq!(old.state(), WorkerState::Redundant);

        // The old bucket stays gone and the new gateway keeps serving
        assert_eq!(store.list_versions().unwrap(), vec!["v2"]);
        assert!(matches!(
            new.handle_fetch(&Request::get(url("/"))).await.unwrap(),
            Interception::Respond(_)
        ));
    }

    #[tokio::test]
    async fn test_new_version_evicts_old_cache() {
        let store = MemoryStore::new();
        let old_fetcher = shell_fetcher();
        activated(store.clone(), old_fetcher, "v1").await;

        let fetcher = shell_fetcher();
        let gateway = Gateway::new(store.clone(), fetcher.clone(), config("v2", &["/"]));
        gateway.install().await;
        let removed = gateway.activate().await.unwrap();

        assert_eq!(removed, vec!["v1"]);
        assert_eq!(store.list_versions().unwrap(), vec!["v2"]);

        // Only in v1, so it has to come from the network again
        let before = fetcher.calls();
        gateway
            .handle_fetch(&Request::get(url("/css/styles.css")))
            .await
            .unwrap();
        assert_eq!(fetcher.calls(), before + 1);
    }

    #[tokio::test]
    async fn test_skip_waiting_message() {
        let gateway = Gateway::new(MemoryStore::new(), StubFetcher::default(), config("v1", &[]));
        assert!(!gateway.skip_waiting());
        gateway.handle_message(ControlMessage::SkipWaiting);
        assert!(gateway.skip_waiting());
    }
}
