// src/pipeline/reverse.rs — Reverse pipeline: task → specs + constraints → code → verification

use regex::Regex;
use serde_json::Value;

use super::first_by_id;
use super::types::{
    ConstraintCheck, ConstraintType, ReverseConstraint, ReverseRequest, ReverseResponse,
    ReverseSpec, ReverseVerification, ReverseVerificationItem, SpecStatus,
};
use super::usage::UsageMeter;
use crate::claims::extractor::{id_field, non_empty_str};
use crate::claims::salvage::{salvage_json_array, salvage_records, strip_code_fence};
use crate::infra::config::PipelineConfig;
use crate::infra::errors::SpecLoopError;
use crate::provider::Oracle;

/// Notes recorded for spec items the verifier never returned a usable status for.
pub const UNRESOLVED_NOTES: &str = "No parseable status returned by verifier";

const DEFAULT_LANGUAGE: &str = "typescript";

pub const REVERSE_SPEC_SYSTEM_PROMPT: &str = "\
You turn a programming task into a precise specification.

List the requirements an implementation must meet. Each requirement is one \
checkable statement, with a rationale explaining why it follows from the task.

Respond with ONLY a JSON array, no prose:
{\"id\": \"S1\", \"text\": \"requirement\", \"rationale\": \"why the task implies it\"}";

pub const REVERSE_CONSTRAINT_SYSTEM_PROMPT: &str = "\
You derive implementation constraints from a specification.

For each constraint choose a type: must, must-not, or prefer. Name the spec \
item that motivates it in `source`. When the constraint can be checked by \
searching the code, give a regular expression in `pattern`.

Respond with ONLY a JSON array, no prose:
{\"id\": \"K1\", \"type\": \"must\" | \"must-not\" | \"prefer\", \"text\": \"constraint\", \"pattern\": \"optional regex\", \"source\": \"S1\"}";

pub const REVERSE_CODEGEN_SYSTEM_PROMPT: &str = "\
You implement specifications.

Write a complete, self-contained implementation that meets every requirement \
and honors every constraint. Respond with ONLY the code, no explanation.";

pub const REVERSE_VERIFY_SYSTEM_PROMPT: &str = "\
You check code against a specification.

For each requirement decide whether the code satisfies it: satisfied, partial, \
unsatisfied, or unknown (cannot tell from the code).

Respond with ONLY a JSON array, one element per requirement, no prose:
{\"specId\": \"S1\", \"status\": \"satisfied\" | \"partial\" | \"unsatisfied\" | \"unknown\", \"notes\": \"short justification\"}";

pub struct ReversePipeline {
    oracle: Oracle,
    config: PipelineConfig,
}

impl ReversePipeline {
    pub fn new(oracle: Oracle, config: PipelineConfig) -> Self {
        Self { oracle, config }
    }

    pub async fn run(
        &self,
        request: ReverseRequest,
        request_id: &str,
    ) -> Result<ReverseResponse, SpecLoopError> {
        self.validate(&request)?;
        let mut meter = UsageMeter::start();
        let language = request
            .language
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or(DEFAULT_LANGUAGE)
            .to_string();
        let task = request.task.trim();

        // 1. specs
        let reply = self
            .oracle
            .generate(
                REVERSE_SPEC_SYSTEM_PROMPT,
                &format!("Language: {language}\n\n## Task\n\n{task}"),
                self.config.max_tokens,
            )
            .await?;
        meter.record(&reply);
        let specs = first_by_id(
            salvage_json_array(&reply.text)
                .iter()
                .filter_map(validate_reverse_spec),
            |s: &ReverseSpec| s.id.clone(),
        );
        let specs_block = specs_listing(&specs);

        // 2. constraints
        let reply = self
            .oracle
            .generate(
                REVERSE_CONSTRAINT_SYSTEM_PROMPT,
                &format!("## Task\n\n{task}\n\n## Specification\n\n{specs_block}"),
                self.config.max_tokens,
            )
            .await?;
        meter.record(&reply);
        let constraints = first_by_id(
            salvage_json_array(&reply.text)
                .iter()
                .filter_map(validate_reverse_constraint),
            |c: &ReverseConstraint| c.id.clone(),
        );
        for c in &constraints {
            if !specs.iter().any(|s| s.id == c.source) {
                tracing::debug!(
                    constraint = %c.id,
                    source = %c.source,
                    "Constraint cites an unknown spec item"
                );
            }
        }

        // 3. code
        let reply = self
            .oracle
            .generate(
                REVERSE_CODEGEN_SYSTEM_PROMPT,
                &codegen_message(task, &language, &specs_block, &constraints),
                self.config.codegen_max_tokens,
            )
            .await?;
        meter.record(&reply);
        let code = strip_code_fence(&reply.text);

        // 4. verification
        let mut records = Vec::new();
        if !specs.is_empty() {
            let message =
                format!("## Specification\n\n{specs_block}\n\n## Code ({language})\n\n{code}");
            let reply = self
                .oracle
                .generate(REVERSE_VERIFY_SYSTEM_PROMPT, &message, self.config.max_tokens)
                .await?;
            meter.record(&reply);
            records = salvage_records(&reply.text);
        }
        let verification = ReverseVerification::new(pair_items(&specs, &records));

        // 5. mechanical pattern checks
        let constraint_checks = check_constraints(&constraints, &code);

        tracing::info!(
            request_id,
            specs = specs.len(),
            constraints = constraints.len(),
            satisfied = verification.satisfied,
            percentage = verification.percentage,
            calls = meter.calls(),
            "Reverse pipeline complete"
        );

        Ok(ReverseResponse {
            request_id: request_id.to_string(),
            specs,
            constraints,
            code,
            language,
            verification,
            constraint_checks,
            usage: meter.finish(),
        })
    }

    fn validate(&self, request: &ReverseRequest) -> Result<(), SpecLoopError> {
        if request.task.trim().is_empty() {
            return Err(SpecLoopError::BadRequest("'task' must not be empty".into()));
        }
        let size = request.task.chars().count();
        if size > self.config.max_input_chars {
            return Err(SpecLoopError::BadRequest(format!(
                "task is {} characters; the limit is {}",
                size, self.config.max_input_chars
            )));
        }
        Ok(())
    }
}

fn specs_listing(specs: &[ReverseSpec]) -> String {
    specs
        .iter()
        .map(|s| format!("- [{}] {}", s.id, s.text))
        .collect::<Vec<_>>()
        .join("\n")
}

fn codegen_message(
    task: &str,
    language: &str,
    specs_block: &str,
    constraints: &[ReverseConstraint],
) -> String {
    let mut msg = format!(
        "Language: {language}\n\n## Task\n\n{task}\n\n## Specification\n\n{specs_block}\n\n## Constraints\n\n"
    );
    for c in constraints {
        msg.push_str(&format!("- [{}] {}: {}\n", c.id, c.kind, c.text));
    }
    msg
}

pub fn validate_reverse_spec(value: &Value) -> Option<ReverseSpec> {
    Some(ReverseSpec {
        id: id_field(&value["id"])?,
        text: non_empty_str(&value["text"])?,
        rationale: non_empty_str(&value["rationale"])?,
    })
}

pub fn validate_reverse_constraint(value: &Value) -> Option<ReverseConstraint> {
    Some(ReverseConstraint {
        id: id_field(&value["id"])?,
        kind: value["type"].as_str()?.parse().ok()?,
        text: non_empty_str(&value["text"])?,
        pattern: non_empty_str(&value["pattern"]),
        source: id_field(&value["source"])?,
    })
}

/// One item per spec, in spec order; specs without a usable record are `unknown`.
fn pair_items(specs: &[ReverseSpec], records: &[Value]) -> Vec<ReverseVerificationItem> {
    specs
        .iter()
        .map(|spec| {
            records
                .iter()
                .filter(|r| id_field(&r["specId"]).as_deref() == Some(spec.id.as_str()))
                .find_map(|r| {
                    let status: SpecStatus = r["status"].as_str()?.parse().ok()?;
                    Some(ReverseVerificationItem {
                        spec_id: spec.id.clone(),
                        spec: spec.text.clone(),
                        status,
                        notes: r["notes"].as_str().unwrap_or_default().trim().to_string(),
                    })
                })
                .unwrap_or_else(|| ReverseVerificationItem {
                    spec_id: spec.id.clone(),
                    spec: spec.text.clone(),
                    status: SpecStatus::Unknown,
                    notes: UNRESOLVED_NOTES.to_string(),
                })
        })
        .collect()
}

/// Test each constraint's `pattern` against the generated code.
pub fn check_constraints(constraints: &[ReverseConstraint], code: &str) -> Vec<ConstraintCheck> {
    constraints
        .iter()
        .filter_map(|c| {
            let pattern = c.pattern.clone()?;
            let check = match Regex::new(&pattern) {
                Ok(re) => {
                    let matched = re.is_match(code);
                    let passed = match c.kind {
                        ConstraintType::Must => Some(matched),
                        ConstraintType::MustNot => Some(!matched),
                        ConstraintType::Prefer => None,
                    };
                    ConstraintCheck {
                        constraint_id: c.id.clone(),
                        kind: c.kind,
                        pattern,
                        matched: Some(matched),
                        passed,
                        error: None,
                    }
                }
                Err(e) => ConstraintCheck {
                    constraint_id: c.id.clone(),
                    kind: c.kind,
                    pattern,
                    matched: None,
                    passed: None,
                    error: Some(e.to_string()),
                },
            };
            Some(check)
        })
        .collect()
}
