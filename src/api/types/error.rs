//! HTTP error types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// Broad error category reported as `type`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorType {
    InvalidRequestError,
    AuthenticationError,
    PermissionError,
    NotFoundError,
    ConflictError,
    RateLimitError,
    ServerError,
    ServiceUnavailableError,
}

impl std::fmt::Display for ApiErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidRequestError => write!(f, "invalid_request_error"),
            Self::AuthenticationError => write!(f, "authentication_error"),
            Self::PermissionError => write!(f, "permission_error"),
            Self::NotFoundError => write!(f, "not_found_error"),
            Self::ConflictError => write!(f, "conflict_error"),
            Self::RateLimitError => write!(f, "rate_limit_error"),
            Self::ServerError => write!(f, "server_error"),
            Self::ServiceUnavailableError => write!(f, "service_unavailable_error"),
        }
    }
}

/// Error response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorDetail,
}

/// Error detail structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub message: String,
    #[serde(rename = "type")]
    pub error_type: ApiErrorType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
    /// Stable machine-readable reason
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// API error with status code
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub response: ApiErrorResponse,
}

impl ApiError {
    /// Create a new API error
    pub fn new(
        status: StatusCode,
        error_type: ApiErrorType,
        message: impl Into<String>,
    ) -> Self {
        Self {
            status,
            response: ApiErrorResponse {
                error: ApiErrorDetail {
                    message: message.into(),
                    error_type,
                    param: None,
                    code: None,
                },
            },
        }
    }

    /// Add parameter info
    pub fn with_param(mut self, param: impl Into<String>) -> Self {
        self.response.error.param = Some(param.into());
        self
    }

    /// Add error code
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.response.error.code = Some(code.into());
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, ApiErrorType::InvalidRequestError, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, ApiErrorType::AuthenticationError, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, ApiErrorType::PermissionError, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, ApiErrorType::NotFoundError, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, ApiErrorType::ConflictError, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(StatusCode::TOO_MANY_REQUESTS, ApiErrorType::RateLimitError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, ApiErrorType::ServerError, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            ApiErrorType::ServiceUnavailableError,
            message,
        )
    }

    pub fn code(&self) -> Option<&str> {
        self.response.error.code.as_deref()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.response)).into_response()
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        let code = err.kind();

        let api_error = match &err {
            DomainError::RateLimited => Self::rate_limited(err.to_string()),
            DomainError::NotFound { message } => Self::not_found(message),
            DomainError::Revoked | DomainError::Expired | DomainError::UsageLimitExceeded => {
                Self::forbidden(err.to_string())
            }
            DomainError::AlreadyRevoked => Self::conflict(err.to_string()),
            DomainError::Validation { message } => Self::bad_request(message),
            DomainError::Conflict { message } => Self::conflict(message),
            DomainError::Unauthorized { message } => Self::unauthorized(message),
            DomainError::StoreUnavailable { .. } => {
                tracing::error!(error = %err, "Store unavailable");
                Self::unavailable("Key store is temporarily unavailable")
            }
            DomainError::Generation { .. } | DomainError::Internal { .. } => {
                tracing::error!(error = %err, "Internal error");
                Self::internal("Internal server error")
            }
        };

        api_error.with_code(code)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {}",
            self.response.error.error_type, self.response.error.message
        )
    }
}

impl std::error::Error for ApiError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_with_param() {
        let err = ApiError::bad_request("Invalid value")
            .with_param("expires_at")
            .with_code("invalid_type");

        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.response.error.param, Some("expires_at".to_string()));
        assert_eq!(err.code(), Some("invalid_type"));
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (DomainError::RateLimited, StatusCode::TOO_MANY_REQUESTS),
            (DomainError::not_found("x"), StatusCode::NOT_FOUND),
            (DomainError::Revoked, StatusCode::FORBIDDEN),
            (DomainError::Expired, StatusCode::FORBIDDEN),
            (DomainError::UsageLimitExceeded, StatusCode::FORBIDDEN),
            (DomainError::AlreadyRevoked, StatusCode::CONFLICT),
            (DomainError::store_unavailable("x"), StatusCode::SERVICE_UNAVAILABLE),
            (DomainError::generation("x"), StatusCode::INTERNAL_SERVER_ERROR),
            (DomainError::validation("x"), StatusCode::BAD_REQUEST),
            (DomainError::conflict("x"), StatusCode::CONFLICT),
            (DomainError::unauthorized("x"), StatusCode::UNAUTHORIZED),
            (DomainError::internal("x"), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, status) in cases {
            let kind = err.kind();
            let api: ApiError = err.into();
            assert_eq!(api.status, status, "status for {}", kind);
            assert_eq!(api.code(), Some(kind));
        }
    }

    #[test]
    fn test_forbidden_reasons_are_distinct() {
        let codes: Vec<String> = [
            DomainError::Revoked,
            DomainError::Expired,
            DomainError::UsageLimitExceeded,
        ]
        .into_iter()
        .map(|e| ApiError::from(e).code().unwrap_or_default().to_string())
        .collect();

        assert_eq!(codes, vec!["revoked", "expired", "usage_limit_exceeded"]);
    }

    #[test]
    fn test_store_details_not_leaked() {
        let api: ApiError = DomainError::store_unavailable("password=hunter2 host=db").into();
        assert!(!api.response.error.message.contains("hunter2"));
    }

    #[test]
    fn test_error_serialization() {
        let api = ApiError::from(DomainError::Expired);
        let json = serde_json::to_value(&api.response).unwrap();

        assert_eq!(json["error"]["type"], "permission_error");
        assert_eq!(json["error"]["code"], "expired");
        assert!(json["error"].get("param").is_none());
    }
}
