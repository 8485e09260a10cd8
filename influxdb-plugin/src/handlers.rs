//! Axum routes dispatching HTTP calls to the plugin verbs.

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;
use tower_http::trace::TraceLayer;

use crate::error::PluginError;
use crate::models::VerbReply;
use crate::plugin::Plugin;

/// Shared state injected into every handler via `State`.
pub struct AppState {
    pub plugin: Plugin,
}

/// Verb routes under `/api/influxdb`, plus `/health`. Request bodies are
/// capped at `max_request_bytes`.
pub fn router(state: Arc<AppState>, max_request_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/influxdb/ping", get(ping))
        .route("/api/influxdb/create_database", post(create_database))
        .route("/api/influxdb/write", post(write))
        .layer(DefaultBodyLimit::max(max_request_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn status_for(err: &PluginError) -> StatusCode {
    match err {
        PluginError::Connectivity(_) => StatusCode::SERVICE_UNAVAILABLE,
        PluginError::Provisioning(_) | PluginError::Write(_) => StatusCode::BAD_GATEWAY,
        PluginError::NothingToWrite => StatusCode::BAD_REQUEST,
    }
}

fn failure(err: PluginError) -> (StatusCode, Json<VerbReply>) {
    (status_for(&err), Json(VerbReply::failed(&err)))
}

// ------------------------------------------------------------------ //
//  Verbs                                                              //
// ------------------------------------------------------------------ //

/// GET /api/influxdb/ping
pub async fn ping(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.plugin.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(VerbReply::success("InfluxDB is up and running.")),
        ),
        Err(e) => failure(e),
    }
}

/// POST /api/influxdb/create_database
pub async fn create_database(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.plugin.create_database().await {
        Ok(()) => (
            StatusCode::OK,
            Json(VerbReply::success(format!(
                "Database '{}' created",
                state.plugin.database()
            ))),
        ),
        Err(e) => failure(e),
    }
}

/// POST /api/influxdb/write
///
/// Accepts one metric object or an array of them.
pub async fn write(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<Value>,
) -> impl IntoResponse {
    match state.plugin.write(&payload).await {
        Ok(summary) => {
            let reply =
                VerbReply::success("metrics written").with_response(serde_json::json!(summary));
            (StatusCode::OK, Json(reply))
        }
        Err(e) => failure(e),
    }
}

// ------------------------------------------------------------------ //
//  Health                                                             //
// ------------------------------------------------------------------ //

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({"status": "ok"})))
}
