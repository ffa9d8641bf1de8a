//! Gateway Cache - An in-process HTTP response cache for a gateway pipeline
//!
//! Decides per request whether a stored response may be replayed, captures
//! eligible responses as they stream out, and expires them after a fixed TTL.

pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod gateway;
pub mod models;
mod tasks;

pub use cache::MemoryCache;
pub use config::{CacheSpec, Config};
pub use context::HttpContext;
pub use gateway::AppState;
