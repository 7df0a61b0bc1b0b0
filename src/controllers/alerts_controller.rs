use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::{error::AlertError, models::AlertConfig, AppState};

pub fn error_response(e: AlertError) -> Response {
    let status = match &e {
        AlertError::Validation(_) => StatusCode::BAD_REQUEST,
        AlertError::NotFound(_) => StatusCode::NOT_FOUND,
        AlertError::InvalidTransition { .. } => StatusCode::CONFLICT,
        AlertError::Persistence { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let body = match &e {
        // the change is live in memory; tell the caller which alert it was
        AlertError::Persistence { alert_id, .. } => json!({
            "error": e.to_string(),
            "alertId": alert_id,
            "applied": true,
        }),
        _ => json!({ "error": e.to_string() }),
    };

    (status, Json(body)).into_response()
}

fn reply<T: serde::Serialize>(status: StatusCode, res: Result<T, AlertError>) -> Response {
    match res {
        Ok(v) => (status, Json(v)).into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub symbol: Option<String>,
}

// GET /api/alerts?symbol=AAPL
pub async fn get_alerts(State(state): State<AppState>, Query(q): Query<ListQuery>) -> Response {
    let items = match q.symbol.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(sym) => state.engine.get_alerts_by_symbol(sym).await,
        None => state.engine.list_alerts().await,
    };
    (StatusCode::OK, Json(items)).into_response()
}

// POST /api/alerts
pub async fn post_create_alert(
    State(state): State<AppState>,
    payload: Result<Json<AlertConfig>, JsonRejection>,
) -> Response {
    // unknown types and malformed bodies are client errors like any other
    let Json(config) = match payload {
        Ok(body) => body,
        Err(rejection) => return error_response(AlertError::validation(rejection.body_text())),
    };
    reply(StatusCode::CREATED, state.engine.create_alert(config).await)
}

// GET /api/alerts/stats
pub async fn get_alert_stats(State(state): State<AppState>) -> Response {
    let stats = state.engine.get_alert_stats().await;
    (StatusCode::OK, Json(stats)).into_response()
}

// GET /api/alerts/:id
pub async fn get_alert(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    reply(StatusCode::OK, state.engine.get_alert(&id).await)
}

// DELETE /api/alerts/:id
pub async fn delete_alert(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.engine.delete_alert(&id).await {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}

// POST /api/alerts/:id/enable
pub async fn post_enable_alert(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    reply(StatusCode::OK, state.engine.enable_alert(&id).await)
}

// POST /api/alerts/:id/disable
pub async fn post_disable_alert(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    reply(StatusCode::OK, state.engine.disable_alert(&id).await)
}

// POST /api/alerts/:id/reset
pub async fn post_reset_alert(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    reply(StatusCode::OK, state.engine.reset_alert(&id).await)
}
