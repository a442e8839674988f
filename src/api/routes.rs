//! Route definitions
//!
//! Maps URLs to handlers with type-safe routing.

use super::{handlers::*, websocket::websocket_handler};
use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

/// Build the API router with all endpoints
pub fn create_router(state: Arc<AppState>, cors_origins: &[String]) -> Router {
    Router::new()
        // Liveness
        .route("/health", get(health_handler))
        // Round state for viewers and polling clients
        .route("/round", get(round_handler))
        .route("/history", get(history_handler))
        // Wager lifecycle
        .route("/wagers", post(submit_wager_handler))
        .route("/wagers/:id/cancel", post(cancel_wager_handler))
        .route("/wagers/:id/cashout", post(cash_out_handler))
        // Stub ledger helpers for local runs
        .route("/accounts/deposit", post(deposit_handler))
        .route("/accounts/:owner", get(balance_handler))
        // Operator control surface
        .route("/admin/crash-override", post(crash_override_handler))
        // Real-time round stream
        .route("/ws", get(websocket_handler))
        .layer(TraceLayer::new_for_http())
        .layer(create_cors_layer(cors_origins))
        .with_state(state)
}

fn create_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("ignoring invalid CORS origin {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(parsed))
        .allow_methods(Any)
        .allow_headers(Any)
}
