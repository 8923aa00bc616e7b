// src/api/mod.rs — HTTP surface for the forward and reverse pipelines

pub mod auth;
pub mod error;
pub mod handlers;
pub mod limits;
pub mod types;

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::infra::config::{ApiConfig, Config};
use crate::pipeline::{ForwardPipeline, ReversePipeline};
use crate::provider::Oracle;
pub use error::{ApiError, ErrorCode};
pub use limits::{limiter_for, Admission, UsageLimiter, WindowLimiter};

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub forward: Arc<ForwardPipeline>,
    pub reverse: Arc<ReversePipeline>,
    pub token: Option<String>,
    pub limiter: Arc<dyn UsageLimiter>,
}

impl ApiState {
    pub fn new(oracle: Oracle, config: &Config) -> Self {
        Self {
            forward: Arc::new(ForwardPipeline::new(
                oracle.clone(),
                config.pipeline.clone(),
            )),
            reverse: Arc::new(ReversePipeline::new(oracle, config.pipeline.clone())),
            token: config.api.token.clone(),
            limiter: limiter_for(config.api.requests_per_minute, config.api.monthly_quota),
        }
    }
}

/// Build the axum router with all API routes.
pub fn build_router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://localhost:5173"),
            HeaderValue::from_static("http://127.0.0.1:3000"),
            HeaderValue::from_static("http://127.0.0.1:5173"),
        ])
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any);

    Router::new()
        .route("/v1/forward", post(handlers::forward))
        .route("/v1/reverse", post(handlers::reverse))
        .route("/v1/health", get(handlers::health))
        .fallback(handlers::not_found)
        .method_not_allowed_fallback(handlers::method_not_allowed)
        .layer(cors)
        .with_state(state)
}

/// Start the API server and serve until Ctrl-C.
pub async fn start_server(config: &ApiConfig, state: ApiState) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.bind, config.port);
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("API server listening on http://{addr}");
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down API server");
        })
        .await?;
    Ok(())
}
