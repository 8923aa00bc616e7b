// src/provider/registry.rs — Process-wide provider handles, one per configuration key
//
// HTTP clients are expensive to build and hold connection pools, so each distinct
// (provider, base_url, retry budget) combination gets exactly one handle for the
// life of the process. Handles are created lazily on first use and never replaced.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use super::ModelProvider;
use crate::infra::errors::SpecLoopError;

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct ProviderKey {
    pub provider: String,
    pub base_url: Option<String>,
    pub max_retries: u32,
}

type HandleMap = HashMap<ProviderKey, Arc<dyn ModelProvider>>;

static HANDLES: OnceLock<Mutex<HandleMap>> = OnceLock::new();

fn handles() -> &'static Mutex<HandleMap> {
    HANDLES.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Return the handle for `key`, building it with `init` only if none exists yet.
///
/// The lock is held across `init` so two racing callers never both construct a handle.
pub fn shared_provider<F>(
    key: ProviderKey,
    init: F,
) -> Result<Arc<dyn ModelProvider>, SpecLoopError>
where
    F: FnOnce() -> Result<Arc<dyn ModelProvider>, SpecLoopError>,
{
    let mut map = handles()
        .lock()
        .map_err(|_| SpecLoopError::InvariantViolation("provider registry poisoned".into()))?;

    if let Some(existing) = map.get(&key) {
        return Ok(existing.clone());
    }

    let handle = init()?;
    tracing::debug!(
        provider = %key.provider,
        retries = key.max_retries,
        "Provider handle created"
    );
    map.insert(key, handle.clone());
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ChatRequest, ChatResponse};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Null;

    #[async_trait]
    impl ModelProvider for Null {
        fn id(&self) -> &str {
            "null"
        }
        fn name(&self) -> &str {
            "Null"
        }
        async fn chat(&self, _req: ChatRequest) -> Result<ChatResponse, SpecLoopError> {
            Err(SpecLoopError::NoProvider)
        }
    }

    fn null() -> Result<Arc<dyn ModelProvider>, SpecLoopError> {
        Ok(Arc::new(Null))
    }

    fn key(provider: &str, retries: u32) -> ProviderKey {
        ProviderKey {
            provider: provider.into(),
            base_url: None,
            max_retries: retries,
        }
    }

    #[test]
    fn test_same_key_initializes_once() {
        let builds = AtomicUsize::new(0);
        let a = shared_provider(key("registry-test-once", 0), || {
            builds.fetch_add(1, Ordering::SeqCst);
            null()
        })
        .unwrap();
        let b = shared_provider(key("registry-test-once", 0), || {
            builds.fetch_add(1, Ordering::SeqCst);
            null()
        })
        .unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_distinct_keys_get_distinct_handles() {
        let a = shared_provider(key("registry-test-distinct", 0), null).unwrap();
        let b = shared_provider(key("registry-test-distinct", 2), null).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_failed_init_is_not_cached() {
        let k = key("registry-test-fail", 0);
        assert!(shared_provider(k.clone(), || Err(SpecLoopError::NoProvider)).is_err());
        assert!(shared_provider(k, null).is_ok());
    }
}
