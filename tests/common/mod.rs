// tests/common/mod.rs — Closure-driven mock oracle shared by the integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use specloop::infra::errors::SpecLoopError;
use specloop::provider::*;

type Responder = dyn Fn(&ChatRequest) -> Result<String, SpecLoopError> + Send + Sync;

/// A provider that answers each request with whatever the closure returns,
/// without making any network calls.
pub struct ScriptedProvider {
    respond: Box<Responder>,
    calls: AtomicUsize,
    systems: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new(
        respond: impl Fn(&ChatRequest) -> Result<String, SpecLoopError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            respond: Box::new(respond),
            calls: AtomicUsize::new(0),
            systems: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// System prompts seen so far, in call order.
    pub fn systems(&self) -> Vec<String> {
        self.systems.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    fn id(&self) -> &str {
        "scripted"
    }

    fn name(&self) -> &str {
        "Scripted"
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, SpecLoopError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.systems
            .lock()
            .unwrap()
            .push(request.system.clone().unwrap_or_default());
        let content = (self.respond)(&request)?;
        Ok(ChatResponse {
            content,
            usage: TokenUsage {
                input_tokens: 100,
                output_tokens: 50,
            },
            stop_reason: StopReason::EndTurn,
        })
    }
}

pub fn oracle(provider: &Arc<ScriptedProvider>) -> Oracle {
    Oracle::new(provider.clone(), "scripted-1")
}

/// True when the request was sent with `prompt` as its system prompt.
pub fn is(request: &ChatRequest, prompt: &str) -> bool {
    request.system.as_deref() == Some(prompt)
}

/// The user message of a request.
pub fn user_text(request: &ChatRequest) -> &str {
    request
        .messages
        .first()
        .map(|m| m.content.as_str())
        .unwrap_or_default()
}
