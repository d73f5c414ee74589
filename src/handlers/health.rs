//! Liveness check

use axum::Json;
use serde_json::Value;
use serde_json::json;

/// `GET /health`
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "vtfs-server",
    }))
}
