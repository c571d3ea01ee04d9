use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::AppState;

pub fn app_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        // Chat platform outgoing webhook
        .route("/webhook", post(handlers::receive_webhook))
        // Read-only calendar listing
        .route("/api/calendars", get(handlers::list_calendars))
        // Manual poll trigger
        .route("/api/sync/trigger", post(handlers::trigger_sync))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
