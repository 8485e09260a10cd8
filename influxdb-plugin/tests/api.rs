use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use httpmock::prelude::*;
use serde_json::{json, Value};
use tower::ServiceExt;

use influxdb_plugin::client::InfluxClient;
use influxdb_plugin::config::InfluxCfg;
use influxdb_plugin::handlers::{router, AppState};
use influxdb_plugin::store::{MemoryStore, TimeSeriesStore};
use influxdb_plugin::{Plugin, Precision};

async fn app_on(store: Arc<dyn TimeSeriesStore>, limit: usize) -> Router {
    let plugin = Plugin::load(store, Precision::Ns, true).await.unwrap();
    router(Arc::new(AppState { plugin }), limit)
}

async fn call(app: Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(body.into())
        .unwrap()
}

#[tokio::test]
async fn health_is_ok() {
    let app = app_on(Arc::new(MemoryStore::new("db")), 1_000_000).await;
    let (status, body) = call(app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn ping_reflects_store_state() {
    let store = Arc::new(MemoryStore::new("db"));
    let app = app_on(store.clone(), 1_000_000).await;

    let (status, body) = call(app.clone(), get("/api/influxdb/ping")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");

    store.set_online(false);
    let (status, body) = call(app, get("/api/influxdb/ping")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "failed");
    assert_eq!(body["info"], "InfluxDB is offline: store is offline");
}

#[tokio::test]
async fn create_database_names_the_database() {
    let store = Arc::new(MemoryStore::new("telemetry"));
    let app = app_on(store.clone(), 1_000_000).await;

    let (status, body) = call(app, post_json("/api/influxdb/create_database", "")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["info"], "Database 'telemetry' created");
    assert!(store.is_provisioned());
}

#[tokio::test]
async fn write_returns_a_summary() {
    let store = Arc::new(MemoryStore::provisioned("db"));
    let app = app_on(store.clone(), 1_000_000).await;

    let payload = json!([
        {"name": "cpu", "host_t": "node1", "load_f": 0.75},
        {"name": "mem"}
    ]);
    let (status, body) = call(
        app,
        post_json("/api/influxdb/write", payload.to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"], json!({"written": 1, "skipped": 1}));
    assert_eq!(store.snapshot().len(), 1);
}

#[tokio::test]
async fn write_without_fields_is_a_bad_request() {
    let store = Arc::new(MemoryStore::provisioned("db"));
    let app = app_on(store, 1_000_000).await;

    let (status, body) = call(
        app,
        post_json("/api/influxdb/write", json!({"name": "mem"}).to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["info"], "payload holds no writable series");
}

#[tokio::test]
async fn malformed_json_is_rejected() {
    let app = app_on(Arc::new(MemoryStore::provisioned("db")), 1_000_000).await;
    let (status, _) = call(app, post_json("/api/influxdb/write", "{not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn oversized_payload_is_rejected() {
    let app = app_on(Arc::new(MemoryStore::provisioned("db")), 64).await;
    let payload = json!({"name": "cpu", "note_t": "x".repeat(128), "v_f": 1}).to_string();
    let (status, _) = call(app, post_json("/api/influxdb/write", payload)).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn write_goes_through_to_influxdb() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/ping");
            then.status(204);
        })
        .await;
    let write = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/write")
                .query_param("db", "telemetry")
                .body("cpu,host=node1 load=0.75 1000");
            then.status(204);
        })
        .await;

    let cfg = InfluxCfg {
        host: server.host(),
        port: server.port(),
        database: "telemetry".into(),
        ..InfluxCfg::default()
    };
    let client = InfluxClient::new(&cfg, 1_000_000).unwrap();
    let app = app_on(Arc::new(client), 1_000_000).await;

    let payload = json!({"name": "cpu", "timestamp": 1000, "host_t": "node1", "load_f": 0.75});
    let (status, body) = call(app, post_json("/api/influxdb/write", payload.to_string())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"]["written"], 1);
    write.assert_async().await;
}

#[tokio::test]
async fn influxdb_rejection_is_a_bad_gateway() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/ping");
            then.status(204);
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/write");
            then.status(500).body(r#"{"error":"engine: cache full"}"#);
        })
        .await;

    let cfg = InfluxCfg {
        host: server.host(),
        port: server.port(),
        ..InfluxCfg::default()
    };
    let client = InfluxClient::new(&cfg, 1_000_000).unwrap();
    let app = app_on(Arc::new(client), 1_000_000).await;

    let payload = json!({"name": "cpu", "load_f": 1});
    let (status, body) = call(app, post_json("/api/influxdb/write", payload.to_string())).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["status"], "failed");
    assert!(body["info"]
        .as_str()
        .unwrap()
        .ends_with("HTTP 500: engine: cache full"));
}
