//! Gateway error types.
//!
//! Every failure a caller can see is a [`GatewayError`].  The enum
//! implements [`axum::response::IntoResponse`] so handlers can simply
//! return `Err(GatewayError::NotFound { .. })`; the body is always the
//! discriminated `{"success": false, "error": "..."}` shape.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::config::ConfigError;
use crate::storage::backend::StoreError;

/// Generate a 16-character hex request ID.
pub fn generate_request_id() -> String {
    let bytes: [u8; 8] = rand::random();
    hex::encode(bytes).to_uppercase()
}

/// Failures surfaced by gateway operations.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Missing or unusable configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The request is missing a required field or carries an unusable value.
    #[error("{message}")]
    InvalidInput { message: String },

    /// The request body exceeds the configured upload limit.
    #[error("File exceeds the {limit} byte upload limit")]
    PayloadTooLarge { limit: usize },

    /// The requested key does not exist.
    #[error("File not found")]
    NotFound { key: String },

    /// The object store could not be reached or rejected the call.
    #[error("{0}")]
    Store(#[source] StoreError),
}

impl From<StoreError> for GatewayError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { key } => GatewayError::NotFound { key },
            other => GatewayError::Store(other),
        }
    }
}

impl GatewayError {
    /// Shortcut for an input error.
    pub fn invalid(message: impl Into<String>) -> Self {
        GatewayError::InvalidInput {
            message: message.into(),
        }
    }

    /// Short machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::Config(_) => "ConfigurationError",
            GatewayError::InvalidInput { .. } => "InvalidInput",
            GatewayError::PayloadTooLarge { .. } => "PayloadTooLarge",
            GatewayError::NotFound { .. } => "NotFound",
            GatewayError::Store(_) => "StoreUnavailable",
        }
    }

    /// Return the appropriate HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            GatewayError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::NotFound { .. } => StatusCode::NOT_FOUND,
            GatewayError::Store(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::warn!(code = self.code(), "request failed: {self}");
        }

        let body = Json(json!({
            "success": false,
            "error": self.to_string(),
            "code": self.code(),
        }));

        (status, body).into_response()
    }
}

// -- Tests -------------------------------------------------------------------
