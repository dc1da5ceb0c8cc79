//! Unified API error handling.
//!
//! All failures leave the service as a standard JSON envelope with an
//! appropriate HTTP status code. Resolution failures map to 404; upstream
//! GitHub failures map to 502; a directory that has not finished its
//! bootstrap maps to 503.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Error codes for API responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    BadRequest,
    NotFound,
    ServiceUnavailable,
    ExternalServiceError,
    InternalError,
}

impl ErrorCode {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::BadRequest => StatusCode::BAD_REQUEST,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::ExternalServiceError => StatusCode::BAD_GATEWAY,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::BadRequest => "bad_request",
            ErrorCode::NotFound => "not_found",
            ErrorCode::ServiceUnavailable => "service_unavailable",
            ErrorCode::ExternalServiceError => "external_service_error",
            ErrorCode::InternalError => "internal_error",
        }
    }
}

/// The inner error object in the response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable error code
    pub code: String,
    /// Human-readable error message
    pub message: String,
}

/// The full error response envelope
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug)]
pub struct ApiError {
    code: ErrorCode,
    message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServiceUnavailable, message)
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ExternalServiceError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    #[cfg(test)]
    pub fn status(&self) -> StatusCode {
        self.code.status_code()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let response = ErrorResponse {
            error: ErrorBody {
                code: self.code.as_str().to_string(),
                message: self.message,
            },
        };

        (self.code.status_code(), Json(response)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for ApiError {}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::NotFound(message) => ApiError::not_found(message),
            Error::MissingTenant(owner) => ApiError::not_found(format!(
                "no installation recorded for {owner}; install the app for this account"
            )),
            Error::DirectoryNotReady => {
                ApiError::service_unavailable("installation directory is still being populated")
            }
            Error::Upstream { status, body } => {
                tracing::error!(status, body = %body, "upstream GitHub failure");
                ApiError::upstream(format!("GitHub responded with status {status}"))
            }
            Error::AuthExchangeRejected => {
                ApiError::bad_request("OAuth code was rejected; restart the login flow")
            }
            other => {
                tracing::error!(error = %other, "internal error");
                ApiError::internal("internal error")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_status_codes() {
        assert_eq!(ErrorCode::BadRequest.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ErrorCode::ServiceUnavailable.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ErrorCode::ExternalServiceError.status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_domain_error_mapping() {
        let not_found: ApiError = Error::NotFound("no artifacts for run".to_string()).into();
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);

        let missing: ApiError = Error::MissingTenant("octo".to_string()).into();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        assert!(missing.message.contains("octo"));

        let warming: ApiError = Error::DirectoryNotReady.into();
        assert_eq!(warming.status(), StatusCode::SERVICE_UNAVAILABLE);

        let upstream: ApiError = Error::Upstream {
            status: 500,
            body: "boom".to_string(),
        }
        .into();
        assert_eq!(upstream.status(), StatusCode::BAD_GATEWAY);
    }
}
