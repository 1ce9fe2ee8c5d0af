use axum::{extract::State, response::Json};
use serde_json::{json, Value};

use crate::state::AppState;

pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

pub async fn api_health_check(State(state): State<AppState>) -> Json<Value> {
    let status = |ok: bool| if ok { "connected" } else { "disconnected" };

    Json(json!({
        "status": "healthy",
        "directory": status(state.directory.ping().await.is_ok()),
        "otp_store": status(state.otp_service.ping().await.is_ok()),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
