// src/error.rs
//! Centralized API error type for all handlers.
//! Logs full details server-side, returns sanitized JSON to the client.
//!
//! Response format:
//! ```json
//! {
//!   "error": {
//!     "code": "BAD_REQUEST",
//!     "message": "Human-readable description",
//!     "request_id": "uuid",
//!     "details": { ... }
//!   }
//! }
//! ```

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::fetch::FetchError;
use crate::formatter::FormatError;
use crate::secrets::SecretError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unprocessable: {0}")]
    Unprocessable(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Timeout: {0}")]
    Timeout(String),
}

impl ApiError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Unprocessable(_) => "UNPROCESSABLE",
            ApiError::Upstream(_) => "UPSTREAM_ERROR",
            ApiError::Internal(_) => "INTERNAL_ERROR",
            ApiError::Unavailable(_) => "SERVICE_UNAVAILABLE",
            ApiError::Timeout(_) => "TIMEOUT",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Sanitized message safe to return to clients. Upstream and internal
    /// failures get a generic message; the rest pass through.
    fn sanitized_message(&self) -> String {
        match self {
            ApiError::BadRequest(m) => m.clone(),
            ApiError::NotFound(_) => "Resource not found".to_string(),
            ApiError::Unprocessable(m) => m.clone(),
            ApiError::Upstream(_) => "Upstream service error".to_string(),
            ApiError::Internal(_) => "Internal server error".to_string(),
            ApiError::Unavailable(m) => m.clone(),
            ApiError::Timeout(m) => m.clone(),
        }
    }

    pub fn with_details(self, details: Value) -> ApiErrorWithDetails {
        ApiErrorWithDetails { error: self, details: Some(details) }
    }

    fn render(&self, details: Option<Value>) -> Response {
        let status = self.status_code();
        let request_id = Uuid::new_v4().to_string();

        tracing::error!(
            request_id = %request_id,
            code = self.error_code(),
            "API error ({}): {}",
            status.as_u16(),
            self
        );

        let body = json!({
            "error": {
                "code": self.error_code(),
                "message": self.sanitized_message(),
                "request_id": request_id,
                "details": details,
            }
        });
        (status, Json(body)).into_response()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.render(None)
    }
}

/// ApiError with structured details attached.
pub struct ApiErrorWithDetails {
    pub error: ApiError,
    pub details: Option<Value>,
}

impl IntoResponse for ApiErrorWithDetails {
    fn into_response(self) -> Response {
        self.error.render(self.details)
    }
}

impl From<ApiError> for ApiErrorWithDetails {
    fn from(error: ApiError) -> Self {
        Self { error, details: None }
    }
}

// ── Conversions from module errors ──────────────────────────────────────────

impl From<FetchError> for ApiErrorWithDetails {
    fn from(e: FetchError) -> Self {
        match &e {
            FetchError::InvalidUrl { .. } | FetchError::BlockedHost { .. } => {
                ApiError::BadRequest(e.to_string()).into()
            }
            FetchError::Status { url, status } => ApiError::Upstream(e.to_string())
                .with_details(json!({ "url": url, "status": status })),
            FetchError::TooLarge { limit, .. } => ApiError::Upstream(e.to_string())
                .with_details(json!({ "max_bytes": limit })),
            _ if e.is_timeout() => ApiError::Timeout("Remote host did not respond in time".into()).into(),
            FetchError::Transport { .. } | FetchError::Body { .. } => {
                ApiError::Upstream(e.to_string()).into()
            }
        }
    }
}

impl From<FormatError> for ApiError {
    fn from(e: FormatError) -> Self {
        match e {
            FormatError::InvalidInput { details } => {
                ApiError::Unprocessable(format!("Input is not valid source: {}", details))
            }
            FormatError::Timeout(_) => ApiError::Timeout(e.to_string()),
            FormatError::Failed { .. } | FormatError::Io { .. } => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<SecretError> for ApiError {
    fn from(e: SecretError) -> Self {
        match &e {
            SecretError::InvalidName(m) => ApiError::BadRequest(m.clone()),
            SecretError::Status { status: 404, .. } => ApiError::NotFound(e.to_string()),
            SecretError::Auth(_) => ApiError::Unavailable("Secret store credentials unavailable".into()),
            SecretError::Status { .. } | SecretError::Transport { .. } | SecretError::Decode { .. } => {
                ApiError::Upstream(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::BadRequest("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::Unprocessable("x".into()).status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(ApiError::Upstream("x".into()).status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(ApiError::Timeout("x".into()).status_code(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn test_internal_details_are_not_leaked() {
        let e = ApiError::Internal("db password wrong".into());
        assert_eq!(e.sanitized_message(), "Internal server error");
        let e = ApiError::Upstream("token=abc".into());
        assert_eq!(e.sanitized_message(), "Upstream service error");
    }

    #[test]
    fn test_format_error_mapping() {
        let e: ApiError = FormatError::InvalidInput { details: "Cannot parse: 1:4".into() }.into();
        assert!(matches!(e, ApiError::Unprocessable(ref m) if m.contains("Cannot parse")));
        let e: ApiError = FormatError::Timeout(std::time::Duration::from_secs(30)).into();
        assert!(matches!(e, ApiError::Timeout(_)));
    }

    #[test]
    fn test_secret_error_mapping() {
        let e: ApiError = SecretError::Status {
            name: "projects/p/secrets/s/versions/latest".into(),
            status: 404,
            message: "not found".into(),
        }
        .into();
        assert!(matches!(e, ApiError::NotFound(_)));
        let e: ApiError = SecretError::Auth("no metadata".into()).into();
        assert!(matches!(e, ApiError::Unavailable(_)));
    }

    #[test]
    fn test_fetch_error_mapping() {
        let e: ApiErrorWithDetails =
            FetchError::Status { url: "https://example.com".into(), status: 404 }.into();
        assert!(matches!(e.error, ApiError::Upstream(_)));
        assert_eq!(e.details.unwrap()["status"], 404);

        let e: ApiErrorWithDetails = FetchError::InvalidUrl {
            url: "ftp://x".into(),
            reason: "unsupported scheme".into(),
        }
        .into();
        assert!(matches!(e.error, ApiError::BadRequest(_)));
    }
}
