use axum::{Router, routing::post};
use crate::{AppState, controllers::market_controller};

pub fn add_routes(router: Router<AppState>) -> Router<AppState> {
    router
        .route("/api/market/ticks", post(market_controller::post_market_ticks))
        .route("/api/market/indicators", post(market_controller::post_indicator_updates))
}
