// src/pipeline/usage.rs — Per-request usage accounting

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::provider::{OracleReply, TokenUsage};

/// Usage block returned with every pipeline response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub duration_ms: u64,
    pub pipeline_calls: u32,
}

/// Accumulates tokens and oracle calls across the steps of one request.
pub struct UsageMeter {
    started: Instant,
    tokens: TokenUsage,
    calls: u32,
}

impl UsageMeter {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
            tokens: TokenUsage::default(),
            calls: 0,
        }
    }

    pub fn record(&mut self, reply: &OracleReply) {
        self.tokens.add(&reply.usage);
        self.calls += 1;
    }

    pub fn calls(&self) -> u32 {
        self.calls
    }

    pub fn finish(&self) -> Usage {
        Usage {
            input_tokens: self.tokens.input_tokens,
            output_tokens: self.tokens.output_tokens,
            duration_ms: self.started.elapsed().as_millis() as u64,
            pipeline_calls: self.calls,
        }
    }
}
