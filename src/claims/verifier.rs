// src/claims/verifier.rs — Claims × codebase → verification report

use std::collections::HashMap;
use std::path::Path;

use futures::stream::{self, StreamExt};
use serde_json::Value;

use super::context::CodebaseContext;
use super::extractor::id_field;
use super::prompts::{verify_message, VERIFY_SYSTEM_PROMPT};
use super::salvage::salvage_records;
use super::types::{
    Claim, ClaimVerification, Evidence, ExtractionResult, Verdict, VerificationReport,
};
use crate::infra::config::VerifyConfig;
use crate::infra::errors::SpecLoopError;
use crate::provider::{Oracle, TokenUsage};

/// Reasoning recorded for claims the oracle never gave a usable verdict for.
pub const UNRESOLVED_REASONING: &str = "No parseable verdict returned by verifier";

/// Confidence assumed when an evidence record omits it.
const DEFAULT_CONFIDENCE: f64 = 0.5;

type BatchResult = Result<(Vec<ClaimVerification>, TokenUsage), SpecLoopError>;

pub struct ClaimVerifier {
    oracle: Oracle,
    config: VerifyConfig,
}

impl ClaimVerifier {
    pub fn new(oracle: Oracle, config: VerifyConfig) -> Self {
        Self { oracle, config }
    }

    /// Collect codebase context and verify every claim of `extraction` against it.
    pub async fn verify(
        &self,
        extraction: &ExtractionResult,
        codebase: &Path,
    ) -> Result<VerificationReport, SpecLoopError> {
        let context = CodebaseContext::collect(codebase, &self.config)?;
        if context.is_empty() {
            tracing::warn!(
                codebase = %codebase.display(),
                "No source files matched; verdicts will rest on claims alone"
            );
        }
        self.verify_with_context(extraction, &context).await
    }

    pub async fn verify_with_context(
        &self,
        extraction: &ExtractionResult,
        context: &CodebaseContext,
    ) -> Result<VerificationReport, SpecLoopError> {
        let claims: Vec<&Claim> = extraction.claims.iter().collect();
        let batch_size = self.config.batch_size.max(1);
        let batches: Vec<Vec<&Claim>> = claims.chunks(batch_size).map(<[_]>::to_vec).collect();

        let mut usage = TokenUsage::default();
        let mut resolved: HashMap<String, ClaimVerification> = HashMap::new();
        self.run_batches(batches, &context.text, &mut resolved, &mut usage)
            .await?;

        // One individual retry for anything the batch pass left unresolved.
        let unresolved: Vec<Vec<&Claim>> = claims
            .iter()
            .filter(|c| !resolved.contains_key(&c.id))
            .map(|c| vec![*c])
            .collect();
        if !unresolved.is_empty() {
            tracing::debug!(
                count = unresolved.len(),
                "Retrying unresolved claims individually"
            );
            self.run_batches(unresolved, &context.text, &mut resolved, &mut usage)
                .await?;
        }

        let rows: Vec<ClaimVerification> = claims
            .iter()
            .map(|c| {
                resolved.remove(&c.id).unwrap_or_else(|| {
                    tracing::warn!(
                        iteration = extraction.iteration,
                        claim = %c.id,
                        "No parseable verdict; recording N/A"
                    );
                    unresolved_row(c)
                })
            })
            .collect();

        let report = VerificationReport::new(
            extraction.iteration,
            context.root.display().to_string(),
            rows,
        );
        report.check_against(extraction)?;

        tracing::info!(
            iteration = report.iteration,
            pass = report.verdicts.pass,
            partial = report.verdicts.partial,
            fail = report.verdicts.fail,
            na = report.verdicts.na,
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            "Verification complete"
        );
        Ok(report)
    }

    /// Send every batch (bounded concurrency) and merge results; first verdict per claim wins.
    async fn run_batches(
        &self,
        batches: Vec<Vec<&Claim>>,
        context: &str,
        resolved: &mut HashMap<String, ClaimVerification>,
        usage: &mut TokenUsage,
    ) -> Result<(), SpecLoopError> {
        let results: Vec<BatchResult> = stream::iter(batches)
            .map(|batch| self.verify_batch(batch, context))
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await;

        for result in results {
            let (rows, batch_usage) = result?;
            usage.add(&batch_usage);
            for row in rows {
                resolved.entry(row.claim_id.clone()).or_insert(row);
            }
        }
        Ok(())
    }

    async fn verify_batch(&self, batch: Vec<&Claim>, context: &str) -> BatchResult {
        let reply = self
            .oracle
            .generate(
                VERIFY_SYSTEM_PROMPT,
                &verify_message(&batch, context),
                self.config.max_tokens,
            )
            .await?;

        let mut rows: Vec<ClaimVerification> = Vec::with_capacity(batch.len());
        for record in salvage_records(&reply.text) {
            if let Some(row) = validate_verification(&record, &batch) {
                if rows.iter().all(|r| r.claim_id != row.claim_id) {
                    rows.push(row);
                }
            }
        }
        Ok((rows, reply.usage))
    }
}

fn unresolved_row(claim: &Claim) -> ClaimVerification {
    ClaimVerification {
        claim_id: claim.id.clone(),
        claim: claim.text.clone(),
        verdict: Verdict::NotApplicable,
        evidence: Vec::new(),
        reasoning: UNRESOLVED_REASONING.to_string(),
    }
}

/// Validate one untrusted verdict record against the claims it was asked about.
pub fn validate_verification(value: &Value, batch: &[&Claim]) -> Option<ClaimVerification> {
    let claim_id = id_field(&value["claimId"])?;
    let Some(claim) = batch.iter().find(|c| c.id == claim_id) else {
        tracing::debug!(claim = %claim_id, "Verdict for a claim outside the batch");
        return None;
    };
    let Some(verdict) = value["verdict"]
        .as_str()
        .and_then(|s| s.parse::<Verdict>().ok())
    else {
        tracing::debug!(claim = %claim_id, record = %value, "Unparseable verdict");
        return None;
    };

    let evidence = value["evidence"]
        .as_array()
        .map(|items| items.iter().filter_map(validate_evidence).collect())
        .unwrap_or_default();

    Some(ClaimVerification {
        claim_id,
        claim: claim.text.clone(),
        verdict,
        evidence,
        reasoning: value["reasoning"].as_str().unwrap_or_default().trim().to_string(),
    })
}

pub fn validate_evidence(value: &Value) -> Option<Evidence> {
    let file = value["file"].as_str().map(str::trim).filter(|f| !f.is_empty())?;
    let line_number = value["lineNumber"]
        .as_u64()
        .and_then(|n| u32::try_from(n).ok())
        .filter(|n| *n > 0);
    let confidence = value["confidence"]
        .as_f64()
        .filter(|c| c.is_finite())
        .unwrap_or(DEFAULT_CONFIDENCE)
        .clamp(0.0, 1.0);

    Some(Evidence {
        file: file.to_string(),
        line_number,
        snippet: value["snippet"].as_str().unwrap_or_default().to_string(),
        confidence,
    })
}
