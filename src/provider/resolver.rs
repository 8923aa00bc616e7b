// src/provider/resolver.rs — Oracle resolution from config + environment

use std::sync::Arc;

use super::anthropic::AnthropicProvider;
use super::openai::OpenAIProvider;
use super::registry::{shared_provider, ProviderKey};
use super::retry::{RetryConfig, RetryProvider};
use super::{ModelProvider, ModelRef, Oracle};
use crate::infra::config::ModelsConfig;
use crate::infra::errors::SpecLoopError;

/// Default model per provider, in discovery priority order.
const DEFAULTS: &[(&str, &str, &str)] = &[
    ("anthropic", "ANTHROPIC_API_KEY", "claude-sonnet-4-20250514"),
    ("openai", "OPENAI_API_KEY", "gpt-4.1"),
];

fn env_var_for(provider: &str) -> Option<&'static str> {
    DEFAULTS
        .iter()
        .find(|(id, _, _)| *id == provider)
        .map(|(_, env, _)| *env)
}

/// Pick the model to use: CLI override > config > first provider with a key in env.
pub fn select_model(
    cli_model: Option<&str>,
    config: &ModelsConfig,
) -> Result<ModelRef, SpecLoopError> {
    if let Some(s) = cli_model.or(config.oracle.as_deref()) {
        return ModelRef::parse(s).ok_or_else(|| {
            SpecLoopError::Config(format!("model '{s}' is not in provider/model form"))
        });
    }

    DEFAULTS
        .iter()
        .find(|(_, env, _)| std::env::var(env).is_ok_and(|v| !v.is_empty()))
        .map(|(id, _, model)| ModelRef::new(*id, *model))
        .ok_or(SpecLoopError::NoProvider)
}

/// Build (or reuse) the provider handle for `model_ref` and bind it into an oracle.
pub fn resolve_oracle(
    model_ref: &ModelRef,
    config: &ModelsConfig,
) -> Result<Oracle, SpecLoopError> {
    let key = ProviderKey {
        provider: model_ref.provider.clone(),
        base_url: config.base_url.clone(),
        max_retries: config.max_retries,
    };

    let provider = shared_provider(key, || build_provider(model_ref, config))?;
    Ok(Oracle::new(provider, model_ref.model.clone()).with_temperature(config.temperature))
}

fn build_provider(
    model_ref: &ModelRef,
    config: &ModelsConfig,
) -> Result<Arc<dyn ModelProvider>, SpecLoopError> {
    let env_var = env_var_for(&model_ref.provider).ok_or_else(|| {
        SpecLoopError::Config(format!(
            "unknown provider '{}' (expected anthropic or openai)",
            model_ref.provider
        ))
    })?;
    let key = std::env::var(env_var)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or(SpecLoopError::NoProvider)?;

    let base: Arc<dyn ModelProvider> = match model_ref.provider.as_str() {
        "anthropic" => Arc::new(AnthropicProvider::new(key)),
        _ => match &config.base_url {
            Some(url) => Arc::new(OpenAIProvider::with_base_url(key, url.clone())),
            None => Arc::new(OpenAIProvider::new(key)),
        },
    };

    if config.max_retries == 0 {
        return Ok(base);
    }
    Ok(Arc::new(RetryProvider::new(
        base,
        RetryConfig::with_max_retries(config.max_retries),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_override_wins() {
        let cfg = ModelsConfig {
            oracle: Some("anthropic/claude-opus-4-20250514".into()),
            ..Default::default()
        };
        let r = select_model(Some("openai/gpt-4.1-mini"), &cfg).unwrap();
        assert_eq!(r, ModelRef::new("openai", "gpt-4.1-mini"));
    }

    #[test]
    fn test_config_model_used() {
        let cfg = ModelsConfig {
            oracle: Some("anthropic/claude-opus-4-20250514".into()),
            ..Default::default()
        };
        let r = select_model(None, &cfg).unwrap();
        assert_eq!(r.provider, "anthropic");
    }

    #[test]
    fn test_malformed_model_is_config_error() {
        let err = select_model(Some("gpt-4.1"), &ModelsConfig::default()).unwrap_err();
        assert!(matches!(err, SpecLoopError::Config(_)));
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let err = resolve_oracle(
            &ModelRef::new("resolver-test-unknown", "m"),
            &ModelsConfig::default(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, SpecLoopError::Config(_)));
    }
}
