//! End-to-end HTTP tests against the in-memory backend

use std::sync::Arc;

use archive_server::api::create_app;
use archive_server::core::config::StorageType;
use archive_server::storage::MemoryStore;
use archive_server::{AppState, Config};
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

struct TestApp {
    router: Router,
    store: Arc<MemoryStore>,
}

impl TestApp {
    fn new(cron_secret: Option<&str>) -> Self {
        let mut config = Config::default();
        config.storage.storage_type = StorageType::Memory;
        config.pipeline.cron_secret = cron_secret.map(str::to_string);

        let store = Arc::new(MemoryStore::new());
        let state = Arc::new(AppState::new(store.clone(), config));
        Self {
            router: create_app(state),
            store,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, body)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    async fn view(&self, document_id: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::POST)
            .uri(format!("/api/documents/{}/views", document_id))
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    async fn drain(&self, token: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::get("/api/cron/process-views");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }
}

#[tokio::test]
async fn test_drain_without_secret_is_open() {
    let app = TestApp::new(None);
    let (status, body) = app.drain(None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["processed"], json!(0));
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_drain_rejects_missing_or_wrong_secret() {
    let app = TestApp::new(Some("s3cret"));
    app.view("doc").await;

    for token in [None, Some("wrong")] {
        let (status, body) = app.drain(token).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({ "success": false, "error": "Unauthorized" }));
    }
    assert_eq!(app.store.queued_views().len(), 1);

    let (status, body) = app.drain(Some("s3cret")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["processed"], json!(1));
}

#[tokio::test]
async fn test_views_flow_from_queue_to_stats() {
    let app = TestApp::new(None);
    for _ in 0..3 {
        let (status, body) = app.view("letters-1891").await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body, json!({ "success": true, "queued": true }));
    }

    let (_, stats) = app.get("/api/documents/letters-1891/stats").await;
    assert_eq!(stats["data"]["views"], json!(0));
    assert_eq!(stats["data"]["pending_views"], json!(3));

    let (_, drained) = app.drain(None).await;
    assert_eq!(drained["processed"], json!(3));

    let (status, stats) = app.get("/api/documents/letters-1891/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["data"]["views"], json!(3));
    assert_eq!(stats["data"]["pending_views"], json!(0));

    let (_, again) = app.drain(None).await;
    assert_eq!(again["processed"], json!(0));
}

#[tokio::test]
async fn test_enqueue_never_fails_the_caller() {
    let app = TestApp::new(None);
    app.store.set_unavailable(true);

    let (status, body) = app.view("doc").await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body, json!({ "success": true, "queued": false }));
}

#[tokio::test]
async fn test_undecodable_document_id_is_skipped_not_rejected() {
    let app = TestApp::new(None);

    let (status, body) = app.view("%FF").await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body, json!({ "success": true, "queued": false }));
    assert!(app.store.queued_views().is_empty());
}

#[tokio::test]
async fn test_drain_storage_failure_is_500() {
    let app = TestApp::new(None);
    app.view("doc").await;
    app.store.set_unavailable(true);

    let (status, body) = app.drain(None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], json!(false));
    assert!(body["error"].is_string());

    app.store.set_unavailable(false);
    assert_eq!(app.store.queued_views().len(), 1);
}

#[tokio::test]
async fn test_comment_threads() {
    let app = TestApp::new(None);
    let uri = "/api/documents/doc/comments";

    let (status, first) = app
        .post_json(uri, json!({ "author_name": "Ada", "content": "First" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let first_id = first["data"]["id"].as_i64().unwrap();

    app.post_json(uri, json!({ "content": "Second" })).await;
    let (status, reply) = app
        .post_json(uri, json!({ "parent_id": first_id, "content": "Reply" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(reply["data"]["author_name"], json!("Anonymous"));

    let (status, listed) = app.get(uri).await;
    assert_eq!(status, StatusCode::OK);
    let threads = listed["data"].as_array().unwrap();
    assert_eq!(threads.len(), 2);
    assert_eq!(threads[0]["content"], json!("Second"));
    assert_eq!(threads[1]["content"], json!("First"));
    assert_eq!(threads[1]["replies"][0]["content"], json!("Reply"));

    let (_, stats) = app.get("/api/documents/doc/stats").await;
    assert_eq!(stats["data"]["comments"], json!(3));
}

#[tokio::test]
async fn test_comment_errors() {
    let app = TestApp::new(None);
    let uri = "/api/documents/doc/comments";

    let (status, body) = app
        .post_json(uri, json!({ "parent_id": 404, "content": "Reply" }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], json!(false));

    let (status, _) = app.post_json(uri, json!({ "content": "  " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("Malformed JSON"));
}

#[tokio::test]
async fn test_like_toggle_round_trip() {
    let app = TestApp::new(None);
    let uri = "/api/documents/doc/likes";

    let (_, before) = app.get(&format!("{}?user=reader-1", uri)).await;
    assert_eq!(before["data"], json!({ "liked": false, "likes": 0 }));

    let (status, liked) = app.post_json(uri, json!({ "user_identifier": "reader-1" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(liked["data"], json!({ "liked": true, "likes": 1 }));

    let (_, unliked) = app.post_json(uri, json!({ "user_identifier": "reader-1" })).await;
    assert_eq!(unliked["data"], before["data"]);

    let (status, _) = app.get(uri).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_analytics_endpoints() {
    let app = TestApp::new(None);
    for doc in ["a", "b", "b"] {
        app.view(doc).await;
    }
    app.drain(None).await;
    app.post_json("/api/documents/a/likes", json!({ "user_identifier": "u" }))
        .await;

    let (status, summary) = app.get("/api/analytics/summary").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["data"]["total_views"], json!(3));
    assert_eq!(summary["data"]["total_likes"], json!(1));
    assert_eq!(summary["data"]["unique_documents"], json!(2));

    let (_, daily) = app.get("/api/analytics/daily?days=7").await;
    let days = daily["data"].as_array().unwrap();
    assert_eq!(days.len(), 7);
    assert_eq!(days[6]["views"], json!(3));

    let (_, top) = app.get("/api/analytics/top?limit=1").await;
    assert_eq!(top["data"], json!([{ "document_id": "b", "views": 2 }]));

    let (status, _) = app.get("/api/analytics/daily?days=400").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_malformed_parameters_use_error_body() {
    let app = TestApp::new(None);

    for uri in [
        "/api/analytics/daily?days=abc",
        "/api/analytics/top?limit=-1",
        "/api/documents/%FF/stats",
    ] {
        let (status, body) = app.get(uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(body["success"], json!(false), "{}", uri);
        assert!(body["error"].is_string(), "{}", uri);
    }
}

#[tokio::test]
async fn test_health_and_metrics() {
    let app = TestApp::new(None);

    let (status, health) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], json!("healthy"));
    assert_eq!(health["version"], json!(archive_server::VERSION));

    app.view("doc").await;
    let (status, metrics) = app.get("/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(metrics
        .as_str()
        .unwrap()
        .contains("archive_views_enqueued_total"));
}
