// src/api/error.rs — Error envelope and status mapping for the HTTP surface

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use super::types::{ErrorBody, ErrorEnvelope};
use crate::infra::errors::SpecLoopError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    MethodNotAllowed,
    RateLimited,
    QuotaExceeded,
    InternalError,
    UpstreamError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::BadRequest => "bad_request",
            ErrorCode::Unauthorized => "unauthorized",
            ErrorCode::Forbidden => "forbidden",
            ErrorCode::NotFound => "not_found",
            ErrorCode::MethodNotAllowed => "method_not_allowed",
            ErrorCode::RateLimited => "rate_limited",
            ErrorCode::QuotaExceeded => "quota_exceeded",
            ErrorCode::InternalError => "internal_error",
            ErrorCode::UpstreamError => "upstream_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ErrorCode::BadRequest => StatusCode::BAD_REQUEST,
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ErrorCode::RateLimited | ErrorCode::QuotaExceeded => StatusCode::TOO_MANY_REQUESTS,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::UpstreamError => StatusCode::BAD_GATEWAY,
        }
    }
}

/// A failed request, rendered as the error envelope.
#[derive(Debug, Clone)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    pub request_id: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>, request_id: &str) -> Self {
        Self {
            code,
            message: message.into(),
            request_id: request_id.to_string(),
        }
    }

    pub fn bad_request(message: impl Into<String>, request_id: &str) -> Self {
        Self::new(ErrorCode::BadRequest, message, request_id)
    }

    /// Map a core error onto the envelope. Internal detail never leaves the process.
    pub fn from_core(err: SpecLoopError, request_id: &str) -> Self {
        match &err {
            SpecLoopError::BadRequest(msg) => Self::bad_request(msg.clone(), request_id),
            e if e.is_upstream() => {
                tracing::warn!(request_id, error = %e, "Oracle call failed");
                Self::new(ErrorCode::UpstreamError, "upstream model call failed", request_id)
            }
            e if e.is_not_found() => Self::new(ErrorCode::NotFound, e.to_string(), request_id),
            SpecLoopError::InvariantViolation(detail) => {
                tracing::error!(request_id, detail = %detail, "Invariant violation");
                Self::internal(request_id)
            }
            e => {
                tracing::error!(request_id, error = %e, "Request failed");
                Self::internal(request_id)
            }
        }
    }

    fn internal(request_id: &str) -> Self {
        Self::new(ErrorCode::InternalError, "internal error", request_id)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorEnvelope {
            error: ErrorBody {
                code: self.code.as_str().to_string(),
                message: self.message,
            },
            request_id: self.request_id,
        };
        (self.code.status(), Json(body)).into_response()
    }
}
