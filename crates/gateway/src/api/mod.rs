pub mod admin;
pub mod health;
pub mod inbound;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Build the full API router. Admin routes gate themselves individually
/// via the [`admin::AdminGuard`] extractor rather than a blanket
/// middleware layer, since only two routes need it.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(health::healthz))
        .route("/v1/inbound", post(inbound::inbound))
        .route("/v1/flows/:id", get(admin::flows::get_flow))
        .route("/v1/flows/:id/modify", post(admin::flows::modify_flow))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
