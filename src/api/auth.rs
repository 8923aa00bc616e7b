// src/api/auth.rs

use axum::http::HeaderMap;

use super::error::{ApiError, ErrorCode};
use crate::api::ApiState;

/// Caller id used for limits when no token is configured.
pub const ANONYMOUS_CALLER: &str = "anonymous";

/// Verify the bearer token if one is configured and return the caller id.
///
/// A missing or malformed header is `unauthorized`; a well-formed but wrong
/// token is `forbidden`.
pub fn check_auth(
    state: &ApiState,
    headers: &HeaderMap,
    request_id: &str,
) -> Result<String, ApiError> {
    let Some(ref expected) = state.token else {
        return Ok(ANONYMOUS_CALLER.to_string());
    };

    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());

    let Some(token) = token else {
        return Err(ApiError::new(
            ErrorCode::Unauthorized,
            "missing bearer token",
            request_id,
        ));
    };

    if constant_time_eq(token.as_bytes(), expected.as_bytes()) {
        Ok(token.to_string())
    } else {
        Err(ApiError::new(
            ErrorCode::Forbidden,
            "invalid bearer token",
            request_id,
        ))
    }
}

/// Constant-time byte comparison to prevent timing attacks on token auth.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
