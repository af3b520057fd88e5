use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use gslb_core::traits::{Backend, ChangeCheck, Snapshot};
use gslb_core::{Error, GslbConfig, RawRecord, RecordKind, Result, SyncEngine};
use gslb_webhook::{SECRET_HEADER, WebhookState, create_routes};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

const SECRET: &str = "webhook-secret-123";

/// Backend answering from a fixed queue; an empty queue is an outage
struct QueueBackend {
    replies: Mutex<VecDeque<Snapshot>>,
}

impl QueueBackend {
    fn new(replies: impl IntoIterator<Item = Snapshot>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
        }
    }

    fn next(&self) -> Result<Snapshot> {
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::backend_unavailable("connection refused"))
    }
}

#[async_trait]
impl Backend for QueueBackend {
    async fn fetch_snapshot(&self, _zone: &str) -> Result<Snapshot> {
        self.next()
    }

    async fn check_changes(&self, _zone: &str, _since: &str) -> Result<ChangeCheck> {
        self.next().map(ChangeCheck::Changed)
    }

    fn backend_name(&self) -> &'static str {
        "queue"
    }
}

fn v1() -> Snapshot {
    Snapshot::new(
        "gslb.example",
        "v1",
        vec![
            RawRecord::new("listener1.gslb.example", RecordKind::A)
                .with_ttl(300)
                .with_ips(["192.168.1.10"]),
            RawRecord::new("listener2.gslb.example", RecordKind::A)
                .with_failover("listener1.gslb.example"),
        ],
    )
}

async fn create_test_app(replies: Vec<Snapshot>) -> (Router, Arc<SyncEngine>) {
    let config = GslbConfig::new("gslb.example");
    let (engine, _events) = SyncEngine::new(Box::new(QueueBackend::new(replies)), config)
        .expect("engine construction succeeds");
    let engine = Arc::new(engine);
    engine.initial_sync().await;

    let app = create_routes(WebhookState::new(Arc::clone(&engine), SECRET));
    (app, engine)
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

fn authed(method: &str, uri: &str, body: Body) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(SECRET_HEADER, SECRET)
        .header("content-type", "application/json")
        .body(body)
        .unwrap()
}

#[tokio::test]
async fn test_health_reports_loaded_generation() {
    let (app, _engine) = create_test_app(vec![v1()]).await;

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["zone"], "gslb.example.");
    assert_eq!(json["records_count"], 2);
    assert_eq!(json["version_hash"], "v1");
    assert_eq!(json["last_sync_status"], "success");
    assert!(json["last_sync"].is_string());
    assert!(json.get("error").is_none());
}

#[tokio::test]
async fn test_health_recent_failure_is_still_healthy() {
    let (app, _engine) = create_test_app(Vec::new()).await;

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["last_sync_status"], "failed");
    assert_eq!(json["records_count"], 0);
}

#[tokio::test]
async fn test_records_require_secret() {
    let (app, _engine) = create_test_app(vec![v1()]).await;

    let missing = app
        .clone()
        .oneshot(Request::builder().uri("/records").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

    let wrong = app
        .oneshot(
            Request::builder()
                .uri("/records")
                .header(SECRET_HEADER, "not-the-secret")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_records_lists_cache_content() {
    let (app, _engine) = create_test_app(vec![v1()]).await;

    let response = app
        .oneshot(authed("GET", "/records", Body::empty()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["version_hash"], "v1");
    assert_eq!(json["count"], 2);
    assert_eq!(json["records"][0]["name"], "listener1.gslb.example");
    assert_eq!(json["records"][0]["type"], "A");
    assert_eq!(json["records"][0]["ips"], json!(["192.168.1.10"]));
    assert_eq!(json["records"][1]["type"], "CNAME");
    assert_eq!(json["records"][1]["failover"], "listener1.gslb.example");
}

#[tokio::test]
async fn test_records_filter_by_type_and_name() {
    let (app, _engine) = create_test_app(vec![v1()]).await;

    let by_type = app
        .clone()
        .oneshot(authed("GET", "/records?type=cname", Body::empty()))
        .await
        .unwrap();
    let json = body_json(by_type).await;
    assert_eq!(json["count"], 1);
    assert_eq!(json["records"][0]["name"], "listener2.gslb.example");

    let by_name = app
        .oneshot(authed("GET", "/records?name=listener1", Body::empty()))
        .await
        .unwrap();
    let json = body_json(by_name).await;
    assert_eq!(json["count"], 1);
    assert_eq!(json["records"][0]["type"], "A");
}

#[tokio::test]
async fn test_notify_rejects_bad_json() {
    let (app, _engine) = create_test_app(vec![v1()]).await;

    let response = app
        .oneshot(authed("POST", "/notify", Body::from("{not json")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("invalid notification body"));
}

#[tokio::test]
async fn test_notify_requires_secret() {
    let (app, engine) = create_test_app(vec![v1()]).await;

    let payload = json!({
        "records": [{"name": "new.gslb.example", "type": "A", "ips": ["10.0.0.1"]}]
    });
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/notify")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(engine.cache().domain_count(), 2);
}

#[tokio::test]
async fn test_notify_merges_then_deletes() {
    let (app, engine) = create_test_app(vec![v1()]).await;

    let payload = json!({
        "records": [
            {"name": "listener2.gslb.example", "type": "A", "ttl": 60, "ips": ["10.0.0.2"]},
            {"name": "outside.other.example", "type": "A", "ips": ["10.0.0.3"]}
        ],
        "deletes": [
            {"name": "listener1.gslb.example", "type": "A"},
            {"name": "missing.gslb.example", "type": "A"}
        ]
    });

    let response = app
        .clone()
        .oneshot(authed("POST", "/notify", Body::from(payload.to_string())))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["updated"], 1);
    assert_eq!(json["deleted"], 1);

    // Push leaves the generation tag alone
    assert_eq!(engine.cache().version_tag(), "v1");

    let listing = app
        .oneshot(authed("GET", "/records", Body::empty()))
        .await
        .unwrap();
    let json = body_json(listing).await;
    assert_eq!(json["count"], 1);
    assert_eq!(json["records"][0]["name"], "listener2.gslb.example");
    assert_eq!(json["records"][0]["type"], "A");
    assert_eq!(json["records"][0]["ttl"], 60);
}

#[tokio::test]
async fn test_notify_empty_body_object_is_noop() {
    let (app, _engine) = create_test_app(vec![v1()]).await;

    let response = app
        .oneshot(authed("POST", "/notify", Body::from("{}")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["updated"], 0);
    assert_eq!(json["deleted"], 0);
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let (app, _engine) = create_test_app(vec![v1()]).await;

    let response = app
        .oneshot(Request::builder().uri("/dns").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_serve_stops_on_shutdown() {
    let (_app, engine) = create_test_app(vec![v1()]).await;
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    let handle = tokio::spawn(gslb_webhook::serve(
        listener,
        WebhookState::new(engine, SECRET),
        shutdown_rx,
    ));

    shutdown_tx.send(()).unwrap();
    let result = tokio::time::timeout(std::time::Duration::from_secs(5), handle).await;
    assert!(result.is_ok(), "listener should stop within 5 seconds");
    assert!(result.unwrap().unwrap().is_ok());
}
