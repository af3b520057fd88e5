//! Contract Test: Control Channel
//!
//! Runs `HttpBackend` against an in-process mock controller.
//!
//! Constraints verified:
//! - Requests carry the zone, the version tag, the node address and the secret
//! - 304 and `{"unchanged": true}` both mean "no change"
//! - Status codes map to unavailable / rejected errors
//! - Incomplete bodies are malformed responses
//! - One request per call, no retries

use axum::Json;
use axum::Router;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use gslb_backend_http::{HttpBackend, SECRET_HEADER};
use gslb_core::traits::{Backend, ChangeCheck};
use gslb_core::Error;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const SECRET: &str = "test-secret-123";

#[derive(Clone, Default)]
struct Controller {
    /// Status and body returned by both endpoints
    reply: Arc<Mutex<(u16, Value)>>,
    /// Query of the last request
    last_query: Arc<Mutex<HashMap<String, String>>>,
    /// Requests received
    hits: Arc<AtomicUsize>,
}

impl Controller {
    fn replying(status: u16, body: Value) -> Self {
        let controller = Self::default();
        *controller.reply.lock().unwrap() = (status, body);
        controller
    }

    fn last_query(&self) -> HashMap<String, String> {
        self.last_query.lock().unwrap().clone()
    }

    fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

async fn handle(
    State(controller): State<Controller>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    controller.hits.fetch_add(1, Ordering::SeqCst);
    *controller.last_query.lock().unwrap() = query;

    let authorized = headers
        .get(SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == SECRET);
    if !authorized {
        return (StatusCode::UNAUTHORIZED, "unauthorized").into_response();
    }

    let (status, body) = controller.reply.lock().unwrap().clone();
    let status = StatusCode::from_u16(status).unwrap();
    if status == StatusCode::NOT_MODIFIED {
        return status.into_response();
    }
    (status, Json(body)).into_response()
}

async fn serve(controller: Controller) -> String {
    let router = Router::new()
        .route("/dns/snapshot", get(handle))
        .route("/dns/changes", get(handle))
        .with_state(controller);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    format!("http://{}/", addr)
}

fn backend(endpoint: &str, secret: &str, node_ip: Option<&str>) -> HttpBackend {
    HttpBackend::new(
        endpoint,
        secret,
        node_ip.map(str::to_string),
        Duration::from_secs(5),
        false,
    )
    .expect("backend construction succeeds")
}

fn snapshot_body() -> Value {
    json!({
        "zone": "gslb.example",
        "version_hash": "v1",
        "records": [
            {"name": "listener1.gslb.example", "type": "A", "ttl": 300, "ips": ["192.168.1.10"]},
            {"name": "listener2.gslb.example", "type": "A", "ips": [], "failover": "listener1.gslb.example"}
        ]
    })
}

#[tokio::test]
async fn fetch_snapshot_sends_zone_node_and_secret() {
    let controller = Controller::replying(200, snapshot_body());
    let endpoint = serve(controller.clone()).await;
    let backend = backend(&endpoint, SECRET, Some("10.1.1.1"));

    let snapshot = backend.fetch_snapshot("gslb.example.").await.unwrap();

    assert_eq!(snapshot.version_tag, "v1");
    assert_eq!(snapshot.records.len(), 2);
    assert_eq!(snapshot.records[1].failover, "listener1.gslb.example");
    assert!(snapshot.records[1].enabled);

    let query = controller.last_query();
    assert_eq!(query.get("zone").map(String::as_str), Some("gslb.example"));
    assert_eq!(query.get("node_ip").map(String::as_str), Some("10.1.1.1"));
    assert_eq!(controller.hits(), 1);
}

#[tokio::test]
async fn not_modified_means_unchanged() {
    let controller = Controller::replying(304, Value::Null);
    let endpoint = serve(controller.clone()).await;
    let backend = backend(&endpoint, SECRET, None);

    let check = backend.check_changes("gslb.example.", "v1").await.unwrap();

    assert_eq!(check, ChangeCheck::Unchanged);
    let query = controller.last_query();
    assert_eq!(query.get("since").map(String::as_str), Some("v1"));
    assert!(query.get("node_ip").is_none());
}

#[tokio::test]
async fn unchanged_flag_means_unchanged() {
    let controller = Controller::replying(200, json!({"unchanged": true}));
    let endpoint = serve(controller).await;

    let check = backend(&endpoint, SECRET, None)
        .check_changes("gslb.example.", "v1")
        .await
        .unwrap();

    assert_eq!(check, ChangeCheck::Unchanged);
}

#[tokio::test]
async fn changed_returns_full_snapshot() {
    let controller = Controller::replying(200, snapshot_body());
    let endpoint = serve(controller).await;

    let check = backend(&endpoint, SECRET, None)
        .check_changes("gslb.example.", "v0")
        .await
        .unwrap();

    match check {
        ChangeCheck::Changed(snapshot) => {
            assert_eq!(snapshot.version_tag, "v1");
            assert_eq!(snapshot.records.len(), 2);
        }
        other => panic!("expected changed, got {:?}", other),
    }
}

#[tokio::test]
async fn wrong_secret_is_rejected() {
    let controller = Controller::replying(200, snapshot_body());
    let endpoint = serve(controller).await;

    let err = backend(&endpoint, "wrong-secret", None)
        .fetch_snapshot("gslb.example.")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Backend { .. }), "got {:?}", err);
    assert!(!err.to_string().contains("wrong-secret"));
}

#[tokio::test]
async fn status_codes_map_to_error_kinds() {
    let cases = [
        (404, "backend"),
        (418, "backend"),
        (429, "unavailable"),
        (500, "unavailable"),
        (503, "unavailable"),
    ];

    for (status, expected) in cases {
        let controller = Controller::replying(status, json!({"error": "nope"}));
        let endpoint = serve(controller.clone()).await;

        let err = backend(&endpoint, SECRET, None)
            .fetch_snapshot("gslb.example.")
            .await
            .unwrap_err();

        let kind = match err {
            Error::Backend { .. } => "backend",
            Error::BackendUnavailable(_) => "unavailable",
            ref other => panic!("status {}: unexpected error {:?}", status, other),
        };
        assert_eq!(kind, expected, "status {}", status);
        assert_eq!(controller.hits(), 1, "status {} must not be retried", status);
    }
}

#[tokio::test]
async fn incomplete_bodies_are_malformed() {
    let bodies = [
        json!({"version_hash": "v1", "records": []}),
        json!({"zone": "gslb.example", "records": []}),
        json!("not an object"),
    ];

    for body in bodies {
        let controller = Controller::replying(200, body.clone());
        let endpoint = serve(controller).await;
        let backend = backend(&endpoint, SECRET, None);

        let err = backend.fetch_snapshot("gslb.example.").await.unwrap_err();
        assert!(matches!(err, Error::MalformedResponse(_)), "body {}: {:?}", body, err);

        let err = backend.check_changes("gslb.example.", "v0").await.unwrap_err();
        assert!(matches!(err, Error::MalformedResponse(_)), "body {}: {:?}", body, err);
    }
}

#[tokio::test]
async fn unreachable_backend_is_unavailable() {
    // Bind and drop to get a port nobody listens on
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = backend(&format!("http://{}", addr), SECRET, None)
        .fetch_snapshot("gslb.example.")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::BackendUnavailable(_)), "got {:?}", err);
}
