//! Response models for the cache admin endpoints
//!
//! This module defines the DTOs (Data Transfer Objects) serialized by
//! `/_cache/stats` and `/_cache/health`.

pub mod responses;

// Re-export commonly used types
pub use responses::{HealthResponse, StatsResponse};
