// src/infra/errors.rs — Error types for specloop

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpecLoopError {
    // Oracle / upstream errors
    #[error("Provider '{provider}' error: {message}")]
    Provider {
        provider: String,
        message: String,
        retriable: bool,
    },

    #[error("Rate limited by '{provider}', retry after {retry_after_ms}ms")]
    RateLimited {
        provider: String,
        retry_after_ms: u64,
    },

    #[error("No provider configured. Set ANTHROPIC_API_KEY or OPENAI_API_KEY.")]
    NoProvider,

    // Iteration lifecycle
    #[error(
        "Iteration {iteration} has no {artifact}; run `specloop {stage}` for that iteration first"
    )]
    MissingArtifact {
        iteration: u32,
        artifact: &'static str,
        stage: &'static str,
    },

    #[error("Iteration {iteration} already has {artifact} (use --force to overwrite)")]
    ArtifactExists {
        iteration: u32,
        artifact: &'static str,
    },

    #[error("Iteration {0} not found")]
    IterationNotFound(u32),

    #[error("No iterations found; run `specloop extract <document>` first")]
    NoIterations,

    #[error("Codebase not found: {}", .0.display())]
    CodebaseNotFound(PathBuf),

    // Caller errors
    #[error("Bad request: {0}")]
    BadRequest(String),

    // Programming defects
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    // Infra
    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SpecLoopError {
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            SpecLoopError::Provider {
                retriable: true,
                ..
            } | SpecLoopError::RateLimited { .. }
        )
    }

    /// Whether the failure came from the oracle transport rather than from us.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            SpecLoopError::Provider { .. } | SpecLoopError::RateLimited { .. }
        )
    }

    /// Whether the failure means a requested resource does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            SpecLoopError::IterationNotFound(_)
                | SpecLoopError::NoIterations
                | SpecLoopError::MissingArtifact { .. }
                | SpecLoopError::CodebaseNotFound(_)
        )
    }
}

pub type Result<T, E = SpecLoopError> = std::result::Result<T, E>;
