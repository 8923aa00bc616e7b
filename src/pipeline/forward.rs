// src/pipeline/forward.rs — Forward pipeline: code → claims → verification → remediation

use serde_json::Value;

use super::first_by_id;
use super::types::{
    ForwardClaim, ForwardRemediation, ForwardRequest, ForwardResponse, ForwardSummary,
    ForwardVerification, ForwardVerificationBlock, RemediationAction,
};
use super::usage::UsageMeter;
use crate::claims::extractor::{id_field, non_empty_str};
use crate::claims::salvage::{salvage_json_array, salvage_records};
use crate::claims::verifier::UNRESOLVED_REASONING;
use crate::claims::{Severity, Verdict};
use crate::infra::config::PipelineConfig;
use crate::infra::errors::SpecLoopError;
use crate::provider::Oracle;

pub const FORWARD_CLAIMS_SYSTEM_PROMPT: &str = "\
You review source code and state what it claims to do.

List concrete, checkable behaviors the code is evidently meant to have: what it \
computes, which inputs it accepts or rejects, how it handles errors, what it \
protects. Include behaviors a careful reviewer would expect even if the code \
gets them wrong.

Respond with ONLY a JSON array, no prose:
{
  \"id\": \"F1\",
  \"category\": \"correctness\" | \"security\" | \"performance\" | \"error-handling\" | \"edge-case\" | \"type-safety\",
  \"severity\": \"critical\" | \"high\" | \"medium\" | \"low\",
  \"text\": \"Rejects negative quantities\",
  \"testable\": true
}";

pub const FORWARD_VERIFY_SYSTEM_PROMPT: &str = "\
You check source code against claims about it.

For each claim give a verdict: PASS (the code does it), PARTIAL (only in some \
paths), FAIL (it does not), N/A (cannot be judged from code).

Respond with ONLY a JSON array, one element per claim, no prose:
{
  \"claimId\": \"F1\",
  \"verdict\": \"PASS\" | \"PARTIAL\" | \"FAIL\" | \"N/A\",
  \"evidence\": \"the line or construct that decides it\",
  \"reasoning\": \"one or two sentences\"
}";

pub const FORWARD_REMEDIATE_SYSTEM_PROMPT: &str = "\
You propose fixes for code that falls short of its claims.

For each failed or partial claim propose exactly one fix. Choose the action: \
add (the behavior is missing), modify (it exists but is wrong), remove (the \
code does something harmful that should go).

Respond with ONLY a JSON array, one element per claim, no prose:
{
  \"claimId\": \"F2\",
  \"title\": \"short imperative title\",
  \"description\": \"what is wrong and what to change\",
  \"action\": \"add\" | \"modify\" | \"remove\",
  \"severity\": \"critical\" | \"high\" | \"medium\" | \"low\",
  \"codeGuidance\": \"code sketch or precise instructions\"
}";

pub struct ForwardPipeline {
    oracle: Oracle,
    config: PipelineConfig,
}

impl ForwardPipeline {
    pub fn new(oracle: Oracle, config: PipelineConfig) -> Self {
        Self { oracle, config }
    }

    pub async fn run(
        &self,
        request: ForwardRequest,
        request_id: &str,
    ) -> Result<ForwardResponse, SpecLoopError> {
        self.validate(&request)?;
        let mut meter = UsageMeter::start();
        let language = request.language.as_deref().unwrap_or("unspecified");

        // 1. claims
        let reply = self
            .oracle
            .generate(
                FORWARD_CLAIMS_SYSTEM_PROMPT,
                &claims_message(&request.code, language, request.context.as_deref()),
                self.config.max_tokens,
            )
            .await?;
        meter.record(&reply);
        let claims = first_by_id(
            salvage_json_array(&reply.text)
                .iter()
                .filter_map(validate_forward_claim),
            |c: &ForwardClaim| c.id.clone(),
        );

        // 2. verification
        let mut results = Vec::with_capacity(claims.len());
        if !claims.is_empty() {
            let reply = self
                .oracle
                .generate(
                    FORWARD_VERIFY_SYSTEM_PROMPT,
                    &verify_message(&claims, &request.code, language),
                    self.config.max_tokens,
                )
                .await?;
            meter.record(&reply);
            results = pair_verifications(&claims, &salvage_records(&reply.text));
        }
        let summary = ForwardSummary::from_verifications(&results);

        // 3. remediation, only for FAIL/PARTIAL
        let gated: Vec<(&ForwardClaim, &ForwardVerification)> = claims
            .iter()
            .zip(&results)
            .filter(|(_, v)| v.verdict.is_gap())
            .collect();
        let mut remediation = Vec::new();
        if !gated.is_empty() {
            let reply = self
                .oracle
                .generate(
                    FORWARD_REMEDIATE_SYSTEM_PROMPT,
                    &remediate_message(&gated, &request.code, language),
                    self.config.max_tokens,
                )
                .await?;
            meter.record(&reply);
            remediation = pair_remediations(&gated, &salvage_records(&reply.text));
        }

        tracing::info!(
            request_id,
            claims = claims.len(),
            passed = summary.passed,
            failed = summary.failed,
            partial = summary.partial,
            remediations = remediation.len(),
            calls = meter.calls(),
            "Forward pipeline complete"
        );

        Ok(ForwardResponse {
            request_id: request_id.to_string(),
            claims,
            verification: ForwardVerificationBlock { results, summary },
            remediation,
            usage: meter.finish(),
        })
    }

    fn validate(&self, request: &ForwardRequest) -> Result<(), SpecLoopError> {
        if request.code.trim().is_empty() {
            return Err(SpecLoopError::BadRequest("'code' must not be empty".into()));
        }
        let size = request.code.chars().count()
            + request.context.as_deref().map_or(0, |c| c.chars().count());
        if size > self.config.max_input_chars {
            return Err(SpecLoopError::BadRequest(format!(
                "input is {} characters; the limit is {}",
                size, self.config.max_input_chars
            )));
        }
        Ok(())
    }
}

// ─── messages ───────────────────────────────────────────────────

fn claims_message(code: &str, language: &str, context: Option<&str>) -> String {
    let mut msg = format!("Language: {language}\n\n");
    if let Some(ctx) = context.filter(|c| !c.trim().is_empty()) {
        msg.push_str(&format!("## Context\n\n{ctx}\n\n"));
    }
    msg.push_str(&format!("## Code\n\n{code}"));
    msg
}

fn verify_message(claims: &[ForwardClaim], code: &str, language: &str) -> String {
    let mut msg = String::from("## Claims\n\n");
    for c in claims {
        msg.push_str(&format!("- [{}] ({}) {}\n", c.id, c.category.as_str(), c.text));
    }
    msg.push_str(&format!("\n## Code ({language})\n\n{code}"));
    msg
}

fn remediate_message(
    gated: &[(&ForwardClaim, &ForwardVerification)],
    code: &str,
    language: &str,
) -> String {
    let mut msg = String::from("## Unsatisfied claims\n\n");
    for (c, v) in gated {
        msg.push_str(&format!(
            "- [{}] {} ({}, {}): {}\n",
            c.id, v.verdict, c.category.as_str(), c.severity, c.text
        ));
        if !v.reasoning.is_empty() {
            msg.push_str(&format!("  reasoning: {}\n", v.reasoning));
        }
    }
    msg.push_str(&format!("\n## Code ({language})\n\n{code}"));
    msg
}

// ─── validation ─────────────────────────────────────────────────

pub fn validate_forward_claim(value: &Value) -> Option<ForwardClaim> {
    let claim = ForwardClaim {
        id: id_field(&value["id"])?,
        category: value["category"].as_str()?.parse().ok()?,
        severity: value["severity"].as_str()?.parse().ok()?,
        text: non_empty_str(&value["text"])?,
        testable: value["testable"].as_bool()?,
    };
    Some(claim)
}

/// Accept evidence as a string or a list of strings.
fn evidence_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}

/// One verification per claim, in claim order; first usable record per claim wins.
fn pair_verifications(claims: &[ForwardClaim], records: &[Value]) -> Vec<ForwardVerification> {
    claims
        .iter()
        .map(|claim| {
            records
                .iter()
                .filter(|r| id_field(&r["claimId"]).as_deref() == Some(claim.id.as_str()))
                .find_map(|r| {
                    let verdict: Verdict = r["verdict"].as_str()?.parse().ok()?;
                    Some(ForwardVerification {
                        claim_id: claim.id.clone(),
                        claim: claim.text.clone(),
                        verdict,
                        evidence: evidence_text(&r["evidence"]),
                        reasoning: r["reasoning"].as_str().unwrap_or_default().trim().to_string(),
                    })
                })
                .unwrap_or_else(|| {
                    tracing::warn!(claim = %claim.id, "No parseable verdict; recording N/A");
                    ForwardVerification {
                        claim_id: claim.id.clone(),
                        claim: claim.text.clone(),
                        verdict: Verdict::NotApplicable,
                        evidence: String::new(),
                        reasoning: UNRESOLVED_REASONING.to_string(),
                    }
                })
        })
        .collect()
}

/// Exactly one remediation per gated claim, in claim order.
fn pair_remediations(
    gated: &[(&ForwardClaim, &ForwardVerification)],
    records: &[Value],
) -> Vec<ForwardRemediation> {
    gated
        .iter()
        .map(|(claim, verification)| {
            records
                .iter()
                .find(|r| id_field(&r["claimId"]).as_deref() == Some(claim.id.as_str()))
                .map(|r| remediation_from_record(r, claim, verification))
                .unwrap_or_else(|| {
                    tracing::debug!(
                        claim = %claim.id,
                        "Oracle skipped claim; using fallback remediation"
                    );
                    fallback_remediation(claim, verification)
                })
        })
        .collect()
}

fn remediation_from_record(
    record: &Value,
    claim: &ForwardClaim,
    verification: &ForwardVerification,
) -> ForwardRemediation {
    let fallback = fallback_remediation(claim, verification);
    ForwardRemediation {
        claim_id: claim.id.clone(),
        title: non_empty_str(&record["title"]).unwrap_or(fallback.title),
        description: non_empty_str(&record["description"]).unwrap_or(fallback.description),
        action: record["action"]
            .as_str()
            .and_then(|s| s.parse::<RemediationAction>().ok())
            .unwrap_or(fallback.action),
        severity: record["severity"]
            .as_str()
            .and_then(|s| s.parse::<Severity>().ok())
            .unwrap_or(claim.severity),
        code_guidance: non_empty_str(&record["codeGuidance"]).unwrap_or(fallback.code_guidance),
    }
}

fn fallback_remediation(
    claim: &ForwardClaim,
    verification: &ForwardVerification,
) -> ForwardRemediation {
    ForwardRemediation {
        claim_id: claim.id.clone(),
        title: format!("Resolve: {}", claim.text),
        description: format!(
            "Verification returned {} for this {} claim.",
            verification.verdict,
            claim.category.as_str()
        ),
        action: RemediationAction::Modify,
        severity: claim.severity,
        code_guidance: verification.reasoning.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::ForwardCategory;
    use serde_json::json;

    fn claim(id: &str) -> ForwardClaim {
        ForwardClaim {
            id: id.into(),
            category: ForwardCategory::Correctness,
            severity: Severity::Medium,
            text: format!("claim {id}"),
            testable: true,
        }
    }

    #[test]
    fn test_validate_forward_claim() {
        let v = json!({"id": 1, "category": "edge_case", "severity": "low", "text": "x", "testable": false});
        let c = validate_forward_claim(&v).unwrap();
        assert_eq!(c.id, "1");
        assert_eq!(c.category, ForwardCategory::EdgeCase);

        let bad = json!({"id": "F1", "category": "style", "severity": "low", "text": "x", "testable": true});
        assert!(validate_forward_claim(&bad).is_none());
    }

    #[test]
    fn test_missing_verdict_becomes_na() {
        let claims = vec![claim("F1"), claim("F2")];
        let records = vec![
            json!({"claimId": "F2", "verdict": "fail", "evidence": ["line 3", "line 9"]}),
            json!({"claimId": "F1", "verdict": "sort of"}),
        ];
        let rows = pair_verifications(&claims, &records);
        assert_eq!(rows[0].verdict, Verdict::NotApplicable);
        assert_eq!(rows[0].reasoning, UNRESOLVED_REASONING);
        assert_eq!(rows[1].verdict, Verdict::Fail);
        assert_eq!(rows[1].evidence, "line 3\nline 9");
    }

    #[test]
    fn test_remediation_fallback_and_filtering() {
        let a = claim("F1");
        let b = claim("F2");
        let va = ForwardVerification {
            claim_id: "F1".into(),
            claim: a.text.clone(),
            verdict: Verdict::Fail,
            evidence: String::new(),
            reasoning: "never checks bounds".into(),
        };
        let vb = ForwardVerification {
            claim_id: "F2".into(),
            verdict: Verdict::Partial,
            ..va.clone()
        };
        let records = vec![
            json!({"claimId": "F2", "title": "Add bounds check", "action": "add"}),
            json!({"claimId": "F2", "title": "dup", "action": "remove"}),
            json!({"claimId": "F9", "title": "unknown claim"}),
        ];
        let out = pair_remediations(&[(&a, &va), (&b, &vb)], &records);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].title, "Resolve: claim F1");
        assert_eq!(out[0].action, RemediationAction::Modify);
        assert_eq!(out[0].code_guidance, "never checks bounds");
        assert_eq!(out[1].title, "Add bounds check");
        assert_eq!(out[1].action, RemediationAction::Add);
    }

    #[test]
    fn test_claims_message_includes_context() {
        let msg = claims_message("fn a() {}", "rust", Some("billing service"));
        assert!(msg.contains("Language: rust"));
        assert!(msg.contains("## Context\n\nbilling service"));
        let msg = claims_message("fn a() {}", "rust", Some("  "));
        assert!(!msg.contains("## Context"));
    }
}
