//! Gateway Routes
//!
//! Configures the Axum router: admin endpoints plus the cached proxy fallback.

use axum::{middleware::from_fn_with_state, routing::get, Router};
use tower_http::trace::TraceLayer;

use super::handlers::{health_handler, stats_handler, AppState};
use super::middleware::response_cache;
use super::proxy::proxy_handler;

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /_cache/stats` - Cache statistics
/// - `GET /_cache/health` - Health check endpoint
/// - any other request - Cache filter, then upstream proxy
///
/// # Middleware
/// - Response cache: only wraps the proxied traffic, never the admin routes
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    let gateway = Router::new()
        .fallback(proxy_handler)
        .layer(from_fn_with_state(state.clone(), response_cache))
        .with_state(state.clone());

    Router::new()
        .route("/_cache/stats", get(stats_handler))
        .route("/_cache/health", get(health_handler))
        .fallback_service(gateway)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
