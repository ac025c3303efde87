//! Integration tests for the offline gateway and contact outbox using wiremock.

use std::time::Duration;

use shoresquad_offline::{
    CacheBucket, CacheStore, CachedResponse, ContactOutbox, ContactSubmission, FetchError,
    Gateway, GatewayConfig, GatewayError, HttpFetcher, Interception, OutboxSync, Request,
    SqliteStore, SyncReport, WorkerState,
};
use url::Url;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn gateway_config(server: &MockServer, version: &str, precache: &[&str]) -> GatewayConfig {
    let origin = Url::parse(&server.uri()).unwrap();
    GatewayConfig {
        offline_fallback: origin.join("/index.html").unwrap(),
        precache: precache.iter().map(|p| origin.join(p).unwrap()).collect(),
        version: version.to_string(),
        origin,
    }
}

/// Origin of a local port with nothing listening on it
fn refused_origin() -> Url {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    Url::parse(&format!("http://127.0.0.1:{}", port)).unwrap()
}

fn fetcher() -> HttpFetcher {
    HttpFetcher::new(Duration::from_secs(5)).unwrap()
}

async fn mount_shell(server: &MockServer) {
    for (route, body) in [
        ("/", "home"),
        ("/index.html", "<html>ShoreSquad</html>"),
        ("/css/styles.css", "body { color: teal; }"),
    ] {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }
}

async fn requests_to(server: &MockServer, route: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == route)
        .count()
}

fn respond_text(outcome: Interception) -> String {
    match outcome {
        Interception::Respond(resp) => resp.text(),
        Interception::PassThrough => panic!("expected a response, got pass-through"),
    }
}

#[tokio::test]
async fn test_install_and_serve_from_cache() {
    let server = MockServer::start().await;
    mount_shell(&server).await;

    let store = SqliteStore::in_memory().unwrap();
    let config = gateway_config(&server, "shoresquad-v1.0.0", &["/", "/index.html", "/css/styles.css"]);
    let styles = config.origin.join("/css/styles.css").unwrap();
    let gateway = Gateway::new(store.clone(), fetcher(), config);

    assert_eq!(gateway.install().await, WorkerState::Installed);
    assert!(gateway.should_activate());
    gateway.activate().await.unwrap();
    assert_eq!(gateway.state(), WorkerState::Activated);

    let outcome = gateway.handle_fetch(&Request::get(styles)).await.unwrap();
    assert_eq!(respond_text(outcome), "body { color: teal; }");

    // Served from the bucket: the only request was the precache one
    assert_eq!(requests_to(&server, "/css/styles.css").await, 1);
    assert_eq!(store.open("shoresquad-v1.0.0").unwrap().keys().unwrap().len(), 3);
}

#[tokio::test]
async fn test_install_failure_caches_nothing() {
    let server = MockServer::start().await;
    mount_shell(&server).await;
    Mock::given(method("GET"))
        .and(path("/js/app.js"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let store = SqliteStore::in_memory().unwrap();
    let gateway = Gateway::new(
        store.clone(),
        fetcher(),
        gateway_config(&server, "v1", &["/", "/index.html", "/js/app.js"]),
    );

    assert_eq!(gateway.install().await, WorkerState::Redundant);
    assert!(store.open("v1").unwrap().keys().unwrap().is_empty());
}

#[tokio::test]
async fn test_miss_is_written_through() {
    let server = MockServer::start().await;
    mount_shell(&server).await;
    Mock::given(method("GET"))
        .and(path("/images/hero.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0x89, 0x50, 0x4e, 0x47]))
        .mount(&server)
        .await;

    let store = SqliteStore::in_memory().unwrap();
    let config = gateway_config(&server, "v1", &["/index.html"]);
    let hero = config.origin.join("/images/hero.png").unwrap();
    let gateway = Gateway::new(store.clone(), fetcher(), config);
    gateway.install().await;
    gateway.activate().await.unwrap();

    gateway.handle_fetch(&Request::get(hero.clone())).await.unwrap();
    gateway.handle_fetch(&Request::get(hero.clone())).await.unwrap();

    assert_eq!(requests_to(&server, "/images/hero.png").await, 1);
    let cached = store.open("v1").unwrap().lookup(&hero).unwrap().unwrap();
    assert_eq!(cached.body, vec![0x89, 0x50, 0x4e, 0x47]);
}

#[tokio::test]
async fn test_error_responses_are_not_cached() {
    let server = MockServer::start().await;
    mount_shell(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/events"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let store = SqliteStore::in_memory().unwrap();
    let config = gateway_config(&server, "v1", &["/index.html"]);
    let events = config.origin.join("/api/events").unwrap();
    let gateway = Gateway::new(store.clone(), fetcher(), config);
    gateway.install().await;
    gateway.activate().await.unwrap();

    match gateway.handle_fetch(&Request::get(events.clone())).await.unwrap() {
        Interception::Respond(resp) => assert_eq!(resp.status, 503),
        other => panic!("expected the network response, got {:?}", other),
    }
    assert!(store.open("v1").unwrap().lookup(&events).unwrap().is_none());
}

#[tokio::test]
async fn test_activation_evicts_previous_version() {
    let server = MockServer::start().await;
    mount_shell(&server).await;

    let store = SqliteStore::in_memory().unwrap();
    let old = Gateway::new(
        store.clone(),
        fetcher(),
        gateway_config(&server, "shoresquad-v0.9.0", &["/", "/index.html", "/css/styles.css"]),
    );
    old.install().await;
    old.activate().await.unwrap();

    let config = gateway_config(&server, "shoresquad-v1.0.0", &["/", "/index.html"]);
    let styles = config.origin.join("/css/styles.css").unwrap();
    let new = Gateway::new(store.clone(), fetcher(), config);
    new.install().await;
    assert_eq!(new.activate().await.unwrap(), vec!["shoresquad-v0.9.0"]);
    assert_eq!(store.list_versions().unwrap(), vec!["shoresquad-v1.0.0"]);

    new.handle_fetch(&Request::get(styles)).await.unwrap();
    assert_eq!(requests_to(&server, "/css/styles.css").await, 2);
}

#[tokio::test]
async fn test_superseded_gateway_stops_serving_across_connections() {
    let server = MockServer::start().await;
    mount_shell(&server).await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.db");

    let old = Gateway::new(
        SqliteStore::new(&path).unwrap(),
        fetcher(),
        gateway_config(&server, "shoresquad-v0.9.0", &["/", "/index.html", "/css/styles.css"]),
    );
    old.install().await;
    old.activate().await.unwrap();

    let new = Gateway::new(
        SqliteStore::new(&path).unwrap(),
        fetcher(),
        gateway_config(&server, "shoresquad-v1.0.0", &["/", "/index.html"]),
    );
    new.install().await;
    new.activate().await.unwrap();

    let styles = Url::parse(&server.uri()).unwrap().join("/css/styles.css").unwrap();
    let outcome = old.handle_fetch(&Request::get(styles)).await.unwrap();
    assert_eq!(outcome, Interception::PassThrough);
    assert_eq!(old.state(), WorkerState::Redundant);
    assert_eq!(requests_to(&server, "/css/styles.css").await, 1);

    // The evicted version was not written back
    let store = SqliteStore::new(&path).unwrap();
    assert_eq!(store.list_versions().unwrap(), vec!["shoresquad-v1.0.0"]);
    assert_eq!(store.active().unwrap().as_deref(), Some("shoresquad-v1.0.0"));
}

#[tokio::test]
async fn test_offline_behaviour_depends_on_request_mode() {
    let origin = refused_origin();
    let shell = origin.join("/index.html").unwrap();
    let page = origin.join("/events").unwrap();
    let script = origin.join("/js/app.js").unwrap();

    // Shell cached by an earlier online session
    let store = SqliteStore::in_memory().unwrap();
    store
        .open("v1")
        .unwrap()
        .put(&shell, &CachedResponse::new(shell.clone(), 200, "<html>ShoreSquad</html>"))
        .unwrap();

    let config = GatewayConfig {
        origin,
        version: "v1".to_string(),
        offline_fallback: shell,
        precache: Vec::new(),
    };
    let gateway = Gateway::new(store, fetcher(), config);
    assert_eq!(gateway.install().await, WorkerState::Installed);
    gateway.activate().await.unwrap();

    let outcome = gateway.handle_fetch(&Request::navigate(page)).await.unwrap();
    assert_eq!(respond_text(outcome), "<html>ShoreSquad</html>");

    let err = gateway.handle_fetch(&Request::get(script)).await.unwrap_err();
    assert!(matches!(err, GatewayError::Fetch(FetchError::Network { .. })));
}

fn submission(name: &str) -> ContactSubmission {
    ContactSubmission {
        name: name.to_string(),
        email: "crew@shoresquad.sg".to_string(),
        subject: "partnership".to_string(),
        message: "We'd love to sponsor the next Changi cleanup.".to_string(),
    }
}

#[tokio::test]
async fn test_outbox_sync_removes_sent_forms() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/contact"))
        .and(body_json(serde_json::json!({
            "name": "Wei Ling",
            "email": "crew@shoresquad.sg",
            "subject": "partnership",
            "message": "We'd love to sponsor the next Changi cleanup."
        })))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/contact"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let outbox = ContactOutbox::in_memory().unwrap();
    outbox.enqueue(&submission("Wei Ling")).unwrap();
    outbox.enqueue(&submission("Rejected Sender")).unwrap();

    let endpoint = Url::parse(&server.uri()).unwrap().join("/api/contact").unwrap();
    let sync = OutboxSync::new(outbox.clone(), reqwest::Client::new(), endpoint, "contact-form-sync");

    let report = sync.sync("contact-form-sync").await.unwrap();
    assert_eq!(report, Some(SyncReport { sent: 1, failed: 1 }));

    let pending = outbox.pending().unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].submission.name, "Rejected Sender");
}

#[tokio::test]
async fn test_outbox_sync_keeps_forms_when_unreachable() {
    let endpoint = refused_origin().join("/api/contact").unwrap();

    let outbox = ContactOutbox::in_memory().unwrap();
    outbox.enqueue(&submission("Wei Ling")).unwrap();
    let sync = OutboxSync::new(outbox.clone(), reqwest::Client::new(), endpoint, "contact-form-sync");

    let report = sync.sync("contact-form-sync").await.unwrap();
    assert_eq!(report, Some(SyncReport { sent: 0, failed: 1 }));
    assert_eq!(outbox.len().unwrap(), 1);
}
