//! Gateway Module
//!
//! Axum integration: the response cache filter, the upstream proxy and the
//! cache admin endpoints.
//!
//! # Endpoints
//! - `GET /_cache/stats` - Cache statistics
//! - `GET /_cache/health` - Health check endpoint
//! - everything else - Served from cache or forwarded upstream

pub mod handlers;
pub mod middleware;
pub mod proxy;
pub mod routes;

pub use handlers::*;
pub use middleware::response_cache;
pub use proxy::proxy_handler;
pub use routes::create_router;
