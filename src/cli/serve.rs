// src/cli/serve.rs — `specloop serve`

use crate::api::{self, ApiState};
use crate::infra::config::Config;
use crate::provider::Oracle;

pub async fn run_serve(oracle: Oracle, mut config: Config, port: Option<u16>) -> anyhow::Result<()> {
    if let Some(port) = port {
        config.api.port = port;
    }
    if config.api.token.is_none() && !is_loopback(&config.api.bind) {
        tracing::warn!(
            bind = %config.api.bind,
            "Serving without a bearer token on a non-loopback address"
        );
    }

    eprintln!(
        "[serve] http://{}:{} (model {})",
        config.api.bind,
        config.api.port,
        oracle.model_ref()
    );
    let state = ApiState::new(oracle, &config);
    api::start_server(&config.api, state).await
}

fn is_loopback(bind: &str) -> bool {
    matches!(bind, "127.0.0.1" | "localhost" | "::1")
}
