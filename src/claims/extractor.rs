// src/claims/extractor.rs — Document → validated claims

use std::collections::HashSet;

use serde_json::Value;

use super::prompts::{extraction_message, EXTRACTION_SYSTEM_PROMPT};
use super::salvage::salvage_json_array;
use super::types::{Category, Claim, Severity};
use crate::infra::config::ExtractConfig;
use crate::infra::errors::SpecLoopError;
use crate::provider::{Oracle, TokenUsage};

/// Claims recovered from one extraction call, before an iteration number is attached.
#[derive(Debug, Clone)]
pub struct ExtractedClaims {
    pub claims: Vec<Claim>,
    pub usage: TokenUsage,
}

pub struct ClaimExtractor {
    oracle: Oracle,
    config: ExtractConfig,
}

impl ClaimExtractor {
    pub fn new(oracle: Oracle, config: ExtractConfig) -> Self {
        Self { oracle, config }
    }

    /// Ask the oracle for claims and keep every element that validates.
    ///
    /// Only transport failures are errors; unusable output yields an empty list.
    pub async fn extract(
        &self,
        document: &str,
        document_type: &str,
    ) -> Result<ExtractedClaims, SpecLoopError> {
        let document = truncate_chars(document, self.config.max_document_chars);
        let reply = self
            .oracle
            .generate(
                EXTRACTION_SYSTEM_PROMPT,
                &extraction_message(document, document_type),
                self.config.max_tokens,
            )
            .await?;

        let raw = salvage_json_array(&reply.text);
        let raw_count = raw.len();
        let claims = dedupe_by_id(raw.iter().filter_map(validate_claim));

        tracing::info!(
            document_type,
            returned = raw_count,
            kept = claims.len(),
            "Claims extracted"
        );

        Ok(ExtractedClaims {
            claims,
            usage: reply.usage,
        })
    }
}

/// Cut `text` to at most `max_chars` characters, logging when it happens.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => {
            tracing::warn!(
                max_chars,
                "Document exceeds the extraction limit; truncating"
            );
            &text[..idx]
        }
        None => text,
    }
}

/// Accept string ids, and integer ids rendered as strings.
pub(crate) fn id_field(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) if n.is_u64() || n.is_i64() => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn non_empty_str(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Validate one untrusted claim record. Returns `None` (and logs why) when it doesn't fit.
pub fn validate_claim(value: &Value) -> Option<Claim> {
    let reject = |reason: &str| {
        tracing::debug!(reason, record = %value, "Dropping claim record");
        None
    };

    let Some(id) = id_field(&value["id"]) else {
        return reject("missing id");
    };
    let Some(section) = value["section"].as_str().map(|s| s.trim().to_string()) else {
        return reject("missing section");
    };
    let Some(text) = non_empty_str(&value["text"]) else {
        return reject("missing text");
    };
    let Some(category) = value["category"]
        .as_str()
        .and_then(|s| s.parse::<Category>().ok())
    else {
        return reject("unknown category");
    };
    let Some(severity) = value["severity"]
        .as_str()
        .and_then(|s| s.parse::<Severity>().ok())
    else {
        return reject("unknown severity");
    };
    let Some(testable) = value["testable"].as_bool() else {
        return reject("testable is not a boolean");
    };

    Some(Claim {
        id,
        section,
        category,
        severity,
        text,
        testable,
    })
}

/// Keep the first claim for each id.
fn dedupe_by_id(claims: impl Iterator<Item = Claim>) -> Vec<Claim> {
    let mut seen = HashSet::new();
    claims
        .filter(|c| {
            let fresh = seen.insert(c.id.clone());
            if !fresh {
                tracing::debug!(id = %c.id, "Dropping duplicate claim id");
            }
            fresh
        })
        .collect()
}
