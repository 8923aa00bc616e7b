// src/pipeline/types.rs — Request/response contracts for the forward and reverse pipelines

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::usage::Usage;
use crate::claims::{Severity, Verdict};

// ─── enums ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ForwardCategory {
    Correctness,
    Security,
    Performance,
    ErrorHandling,
    EdgeCase,
    TypeSafety,
}

impl ForwardCategory {
    pub const ALL: [ForwardCategory; 6] = [
        ForwardCategory::Correctness,
        ForwardCategory::Security,
        ForwardCategory::Performance,
        ForwardCategory::ErrorHandling,
        ForwardCategory::EdgeCase,
        ForwardCategory::TypeSafety,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ForwardCategory::Correctness => "correctness",
            ForwardCategory::Security => "security",
            ForwardCategory::Performance => "performance",
            ForwardCategory::ErrorHandling => "error-handling",
            ForwardCategory::EdgeCase => "edge-case",
            ForwardCategory::TypeSafety => "type-safety",
        }
    }
}

impl FromStr for ForwardCategory {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['_', ' '], "-");
        ForwardCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == normalized)
            .ok_or(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemediationAction {
    Add,
    Modify,
    Remove,
}

impl FromStr for RemediationAction {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "add" => Ok(RemediationAction::Add),
            "modify" => Ok(RemediationAction::Modify),
            "remove" => Ok(RemediationAction::Remove),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConstraintType {
    Must,
    MustNot,
    Prefer,
}

impl ConstraintType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConstraintType::Must => "must",
            ConstraintType::MustNot => "must-not",
            ConstraintType::Prefer => "prefer",
        }
    }
}

impl FromStr for ConstraintType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['_', ' '], "-").as_str() {
            "must" => Ok(ConstraintType::Must),
            "must-not" | "mustnot" => Ok(ConstraintType::MustNot),
            "prefer" | "should" => Ok(ConstraintType::Prefer),
            _ => Err(()),
        }
    }
}

impl fmt::Display for ConstraintType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpecStatus {
    Satisfied,
    Partial,
    Unsatisfied,
    Unknown,
}

impl FromStr for SpecStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "satisfied" => Ok(SpecStatus::Satisfied),
            "partial" => Ok(SpecStatus::Partial),
            "unsatisfied" => Ok(SpecStatus::Unsatisfied),
            "unknown" => Ok(SpecStatus::Unknown),
            _ => Err(()),
        }
    }
}

// ─── forward ────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForwardRequest {
    pub code: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub context: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardClaim {
    pub id: String,
    pub category: ForwardCategory,
    pub severity: Severity,
    pub text: String,
    pub testable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardVerification {
    pub claim_id: String,
    pub claim: String,
    pub verdict: Verdict,
    pub evidence: String,
    pub reasoning: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardRemediation {
    pub claim_id: String,
    pub title: String,
    pub description: String,
    pub action: RemediationAction,
    pub severity: Severity,
    pub code_guidance: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardSummary {
    pub passed: usize,
    pub failed: usize,
    pub partial: usize,
    pub total: usize,
}

impl ForwardSummary {
    pub fn from_verifications(rows: &[ForwardVerification]) -> Self {
        let count = |v: Verdict| rows.iter().filter(|r| r.verdict == v).count();
        Self {
            passed: count(Verdict::Pass),
            failed: count(Verdict::Fail),
            partial: count(Verdict::Partial),
            total: rows.len(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForwardVerificationBlock {
    pub results: Vec<ForwardVerification>,
    pub summary: ForwardSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForwardResponse {
    pub request_id: String,
    pub claims: Vec<ForwardClaim>,
    pub verification: ForwardVerificationBlock,
    pub remediation: Vec<ForwardRemediation>,
    pub usage: Usage,
}

// ─── reverse ────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReverseRequest {
    pub task: String,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReverseSpec {
    pub id: String,
    pub text: String,
    pub rationale: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReverseConstraint {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ConstraintType,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// Id of the spec item that motivated this constraint.
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReverseVerificationItem {
    pub spec_id: String,
    pub spec: String,
    pub status: SpecStatus,
    pub notes: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReverseVerification {
    pub items: Vec<ReverseVerificationItem>,
    pub satisfied: usize,
    pub total: usize,
    pub percentage: f64,
}

impl ReverseVerification {
    pub fn new(items: Vec<ReverseVerificationItem>) -> Self {
        let satisfied = items
            .iter()
            .filter(|i| i.status == SpecStatus::Satisfied)
            .count();
        let total = items.len();
        let percentage = if total > 0 {
            satisfied as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        Self {
            items,
            satisfied,
            total,
            percentage,
        }
    }
}

/// Mechanical check of one constraint's `pattern` against generated code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintCheck {
    pub constraint_id: String,
    #[serde(rename = "type")]
    pub kind: ConstraintType,
    pub pattern: String,
    pub matched: Option<bool>,
    /// `None` when the check could not run or never fails (`prefer`).
    pub passed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReverseResponse {
    pub request_id: String,
    pub specs: Vec<ReverseSpec>,
    pub constraints: Vec<ReverseConstraint>,
    pub code: String,
    pub language: String,
    pub verification: ReverseVerification,
    pub constraint_checks: Vec<ConstraintCheck>,
    pub usage: Usage,
}
