//! Gateway Handlers
//!
//! Shared application state and the cache admin endpoints.

use std::sync::Arc;

use axum::{extract::State, Json};

use crate::cache::MemoryCache;
use crate::config::Config;
use crate::error::Result;
use crate::models::{HealthResponse, StatsResponse};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Response cache consulted by the cache filter
    pub cache: Arc<MemoryCache>,
    /// Client used to forward cache misses
    pub client: reqwest::Client,
    /// Origin base URL, without trailing slash
    pub upstream: Arc<str>,
}

impl AppState {
    /// Creates a new AppState around an existing cache.
    pub fn new(cache: MemoryCache, upstream: impl AsRef<str>) -> Self {
        Self {
            cache: Arc::new(cache),
            client: reqwest::Client::new(),
            upstream: Arc::from(upstream.as_ref().trim_end_matches('/')),
        }
    }

    /// Creates a new AppState from configuration.
    ///
    /// Validates the configuration first; the cache itself never fails to build.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(MemoryCache::new(&config.cache), &config.upstream_url))
    }
}

/// Handler for GET /_cache/stats
///
/// Returns current cache statistics.
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::from(state.cache.stats()))
}

/// Handler for GET /_cache/health
///
/// Returns health status of the gateway.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
