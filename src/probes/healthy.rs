//! Fast probes used as a baseline for the instrumentation pipeline.

use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

/// Returns immediately.
pub async fn fast() -> impl IntoResponse {
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0);
    Json(json!({
        "status": "success",
        "message": "this is a fast endpoint",
        "timestamp": timestamp,
    }))
}

/// Simple ping.
pub async fn ping() -> impl IntoResponse {
    Json(json!({ "ping": "pong" }))
}
