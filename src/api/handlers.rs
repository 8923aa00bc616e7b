// src/api/handlers.rs

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;

use super::error::{ApiError, ErrorCode};
use super::limits::Admission;
use super::types::HealthResponse;
use crate::api::{auth, ApiState};
use crate::pipeline::{
    new_request_id, ForwardRequest, ForwardResponse, ReverseRequest, ReverseResponse,
};

/// Authenticate, unwrap the JSON body, then consult the limiter.
///
/// Only authenticated, well-formed requests count against the caller's limits.
fn admit<T>(
    state: &ApiState,
    headers: &HeaderMap,
    body: Result<Json<T>, JsonRejection>,
    request_id: &str,
) -> Result<T, ApiError> {
    let caller = auth::check_auth(state, headers, request_id)?;
    let Json(request) =
        body.map_err(|rejection| ApiError::bad_request(rejection.body_text(), request_id))?;
    match state.limiter.admit(&caller) {
        Admission::Allowed => Ok(request),
        Admission::RateLimited => Err(ApiError::new(
            ErrorCode::RateLimited,
            "too many requests; retry in a minute",
            request_id,
        )),
        Admission::QuotaExceeded => Err(ApiError::new(
            ErrorCode::QuotaExceeded,
            "monthly quota exhausted",
            request_id,
        )),
    }
}

/// POST /v1/forward: code → claims → verification → remediation.
pub async fn forward(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: Result<Json<ForwardRequest>, JsonRejection>,
) -> Result<Json<ForwardResponse>, ApiError> {
    let request_id = new_request_id();
    let request = admit(&state, &headers, body, &request_id)?;

    let response = state
        .forward
        .run(request, &request_id)
        .await
        .map_err(|e| ApiError::from_core(e, &request_id))?;
    tracing::info!(
        request_id = %request_id,
        claims = response.claims.len(),
        remediations = response.remediation.len(),
        "Forward request complete"
    );
    Ok(Json(response))
}

/// POST /v1/reverse: task → spec + constraints → code → verification.
pub async fn reverse(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: Result<Json<ReverseRequest>, JsonRejection>,
) -> Result<Json<ReverseResponse>, ApiError> {
    let request_id = new_request_id();
    let request = admit(&state, &headers, body, &request_id)?;

    let response = state
        .reverse
        .run(request, &request_id)
        .await
        .map_err(|e| ApiError::from_core(e, &request_id))?;
    tracing::info!(
        request_id = %request_id,
        specs = response.specs.len(),
        percentage = response.verification.percentage,
        "Reverse request complete"
    );
    Ok(Json(response))
}

/// GET /v1/health: Health check (no auth required).
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}

pub async fn not_found() -> ApiError {
    ApiError::new(ErrorCode::NotFound, "no such route", &new_request_id())
}

pub async fn method_not_allowed() -> ApiError {
    ApiError::new(
        ErrorCode::MethodNotAllowed,
        "method not allowed on this route",
        &new_request_id(),
    )
}
