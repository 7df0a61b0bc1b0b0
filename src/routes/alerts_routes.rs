use axum::{Router, routing::{get, post}};
use crate::{AppState, controllers::alerts_controller};

pub fn add_routes(router: Router<AppState>) -> Router<AppState> {
    router
        .route(
            "/api/alerts",
            get(alerts_controller::get_alerts).post(alerts_controller::post_create_alert),
        )
        .route("/api/alerts/stats", get(alerts_controller::get_alert_stats))
        .route(
            "/api/alerts/:id",
            get(alerts_controller::get_alert).delete(alerts_controller::delete_alert),
        )
        .route("/api/alerts/:id/enable", post(alerts_controller::post_enable_alert))
        .route("/api/alerts/:id/disable", post(alerts_controller::post_disable_alert))
        .route("/api/alerts/:id/reset", post(alerts_controller::post_reset_alert))
}
