use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::AppState;

#[derive(Deserialize)]
pub struct MarketTickBody {
    pub symbol: String,
    pub price: f64,
    #[serde(default)]
    pub volume: f64,
    pub ts: Option<i64>,
}

#[derive(Deserialize)]
pub struct IndicatorBody {
    pub symbol: String,
    pub name: String,
    pub value: f64,
    pub ts: Option<i64>,
}

// POST /api/market/ticks
pub async fn post_market_ticks(
    State(state): State<AppState>,
    Json(ticks): Json<Vec<MarketTickBody>>,
) -> Response {
    let now = state.engine.now_ms();
    let accepted = ticks
        .iter()
        .filter(|t| {
            state
                .engine
                .on_market_tick(&t.symbol, t.price, t.volume, t.ts.unwrap_or(now))
        })
        .count();

    (
        StatusCode::ACCEPTED,
        Json(json!({ "accepted": accepted, "rejected": ticks.len() - accepted })),
    )
        .into_response()
}

// POST /api/market/indicators
pub async fn post_indicator_updates(
    State(state): State<AppState>,
    Json(updates): Json<Vec<IndicatorBody>>,
) -> Response {
    let now = state.engine.now_ms();
    let accepted = updates
        .iter()
        .filter(|u| {
            state
                .engine
                .on_indicator_update(&u.symbol, &u.name, u.value, u.ts.unwrap_or(now))
        })
        .count();

    (
        StatusCode::ACCEPTED,
        Json(json!({ "accepted": accepted, "rejected": updates.len() - accepted })),
    )
        .into_response()
}
