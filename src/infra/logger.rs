// src/infra/logger.rs — Structured logging with tracing

use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the global subscriber.
///
/// Filter precedence: `SPECLOOP_LOG`, then `RUST_LOG`, then `level`.
/// Logs go to stderr so stdout stays clean for command output.
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_env("SPECLOOP_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(level));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}
