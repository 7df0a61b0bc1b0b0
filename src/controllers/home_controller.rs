use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;

use crate::AppState;

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

// GET /health/engine
pub async fn health_engine(State(state): State<AppState>) -> impl IntoResponse {
    let stats = state.engine.get_alert_stats().await;
    (
        StatusCode::OK,
        Json(json!({
            "alerts": stats,
            "subscribers": state.events.subscriber_count(),
        })),
    )
}

pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "not found" })))
}
