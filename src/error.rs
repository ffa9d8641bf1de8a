//! Error types for the gateway
//!
//! The cache core never fails a request; errors only arise from configuration
//! and from forwarding to the upstream.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Gateway Error Enum ==
/// Unified error type for the gateway.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Configuration rejected at startup
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Upstream could not be reached or answered with a broken stream
    #[error("Upstream error: {0}")]
    Upstream(#[from] reqwest::Error),
}

// == IntoResponse Implementation ==
impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = match &self {
            GatewayError::InvalidConfig(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::Upstream(_) => StatusCode::BAD_GATEWAY,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the gateway.
pub type Result<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_config_maps_to_500() {
        let response = GatewayError::InvalidConfig("codes must not be empty".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_upstream_maps_to_502() {
        let err = reqwest::Client::new()
            .get("not a url")
            .build()
            .unwrap_err();
        let response = GatewayError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_error_message() {
        let err = GatewayError::InvalidConfig("boom".into());
        assert_eq!(err.to_string(), "Invalid configuration: boom");
    }
}
