// src/claims/types.rs — Claim / verdict data model

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::infra::errors::SpecLoopError;

/// What area of a document a claim speaks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    DataPrivacy,
    Security,
    Functionality,
    Operational,
    Legal,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::DataPrivacy,
        Category::Security,
        Category::Functionality,
        Category::Operational,
        Category::Legal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::DataPrivacy => "data-privacy",
            Category::Security => "security",
            Category::Functionality => "functionality",
            Category::Operational => "operational",
            Category::Legal => "legal",
        }
    }
}

impl FromStr for Category {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['_', ' '], "-");
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == normalized)
            .ok_or(())
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Claim severity. Declaration order is most to least severe, so `Ord` sorts critical first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }
}

impl FromStr for Severity {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Severity::ALL
            .into_iter()
            .find(|v| v.as_str() == normalized)
            .ok_or(())
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of checking one claim against a codebase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    #[serde(rename = "PASS")]
    Pass,
    #[serde(rename = "PARTIAL")]
    Partial,
    #[serde(rename = "FAIL")]
    Fail,
    #[serde(rename = "N/A")]
    NotApplicable,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Pass => "PASS",
            Verdict::Partial => "PARTIAL",
            Verdict::Fail => "FAIL",
            Verdict::NotApplicable => "N/A",
        }
    }

    /// FAIL and PARTIAL are the verdicts that leave work to do.
    pub fn is_gap(&self) -> bool {
        matches!(self, Verdict::Fail | Verdict::Partial)
    }
}

impl FromStr for Verdict {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PASS" => Ok(Verdict::Pass),
            "PARTIAL" => Ok(Verdict::Partial),
            "FAIL" => Ok(Verdict::Fail),
            "N/A" | "NA" | "N-A" | "NOT_APPLICABLE" => Ok(Verdict::NotApplicable),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single testable assertion extracted from a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claim {
    pub id: String,
    pub section: String,
    pub category: Category,
    pub severity: Severity,
    pub text: String,
    pub testable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    pub iteration: u32,
    pub document_type: String,
    pub claims: Vec<Claim>,
    pub total_claims: usize,
    pub testable_claims: usize,
    pub extracted_at: DateTime<Utc>,
}

impl ExtractionResult {
    /// Build a result with both counters derived from `claims`.
    pub fn new(iteration: u32, document_type: impl Into<String>, claims: Vec<Claim>) -> Self {
        let testable_claims = claims.iter().filter(|c| c.testable).count();
        Self {
            iteration,
            document_type: document_type.into(),
            total_claims: claims.len(),
            testable_claims,
            claims,
            extracted_at: Utc::now(),
        }
    }

    pub fn claim(&self, id: &str) -> Option<&Claim> {
        self.claims.iter().find(|c| c.id == id)
    }

    /// Re-check counters and id uniqueness (used on artifacts read back from disk).
    pub fn check_invariants(&self) -> Result<(), SpecLoopError> {
        if self.total_claims != self.claims.len() {
            return Err(SpecLoopError::InvariantViolation(format!(
                "iteration {}: totalClaims={} but {} claims present",
                self.iteration,
                self.total_claims,
                self.claims.len()
            )));
        }
        let testable = self.claims.iter().filter(|c| c.testable).count();
        if self.testable_claims != testable {
            return Err(SpecLoopError::InvariantViolation(format!(
                "iteration {}: testableClaims={} but {} testable claims present",
                self.iteration, self.testable_claims, testable
            )));
        }
        let mut seen = HashSet::new();
        for c in &self.claims {
            if !seen.insert(c.id.as_str()) {
                return Err(SpecLoopError::InvariantViolation(format!(
                    "iteration {}: duplicate claim id '{}'",
                    self.iteration, c.id
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evidence {
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_number: Option<u32>,
    #[serde(default)]
    pub snippet: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimVerification {
    pub claim_id: String,
    /// Claim text copied from the extraction, never from oracle output.
    pub claim: String,
    pub verdict: Verdict,
    #[serde(default)]
    pub evidence: Vec<Evidence>,
    #[serde(default)]
    pub reasoning: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerdictTally {
    pub pass: usize,
    pub partial: usize,
    pub fail: usize,
    pub na: usize,
}

impl VerdictTally {
    pub fn from_verdicts<'a>(verdicts: impl IntoIterator<Item = &'a Verdict>) -> Self {
        let mut tally = Self::default();
        for v in verdicts {
            tally.record(*v);
        }
        tally
    }

    pub fn record(&mut self, verdict: Verdict) {
        match verdict {
            Verdict::Pass => self.pass += 1,
            Verdict::Partial => self.partial += 1,
            Verdict::Fail => self.fail += 1,
            Verdict::NotApplicable => self.na += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.pass + self.partial + self.fail + self.na
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationReport {
    pub iteration: u32,
    pub codebase_path: String,
    pub verdicts: VerdictTally,
    pub verifications: Vec<ClaimVerification>,
    pub generated_at: DateTime<Utc>,
}

impl VerificationReport {
    pub fn new(
        iteration: u32,
        codebase_path: impl Into<String>,
        verifications: Vec<ClaimVerification>,
    ) -> Self {
        Self {
            iteration,
            codebase_path: codebase_path.into(),
            verdicts: VerdictTally::from_verdicts(verifications.iter().map(|v| &v.verdict)),
            verifications,
            generated_at: Utc::now(),
        }
    }

    pub fn verification(&self, claim_id: &str) -> Option<&ClaimVerification> {
        self.verifications.iter().find(|v| v.claim_id == claim_id)
    }

    /// Enforce the pairing invariant: tally matches rows, rows match claims one-to-one.
    pub fn check_against(&self, extraction: &ExtractionResult) -> Result<(), SpecLoopError> {
        let fail = |detail: String| {
            Err(SpecLoopError::InvariantViolation(format!(
                "iteration {}: {}",
                self.iteration, detail
            )))
        };

        if self.iteration != extraction.iteration {
            return fail(format!(
                "verification belongs to iteration {} but extraction to {}",
                self.iteration, extraction.iteration
            ));
        }
        let recount = VerdictTally::from_verdicts(self.verifications.iter().map(|v| &v.verdict));
        if recount != self.verdicts {
            return fail(format!(
                "verdict tally {:?} does not match rows {:?}",
                self.verdicts, recount
            ));
        }
        if self.verifications.len() != extraction.claims.len() {
            return fail(format!(
                "{} verifications for {} claims",
                self.verifications.len(),
                extraction.claims.len()
            ));
        }
        let mut seen = HashSet::new();
        for v in &self.verifications {
            if extraction.claim(&v.claim_id).is_none() {
                return fail(format!("verification for unknown claim '{}'", v.claim_id));
            }
            if !seen.insert(v.claim_id.as_str()) {
                return fail(format!("claim '{}' verified more than once", v.claim_id));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn claim(id: &str, testable: bool) -> Claim {
        Claim {
            id: id.into(),
            section: "1".into(),
            category: Category::Security,
            severity: Severity::High,
            text: format!("claim {id}"),
            testable,
        }
    }

    fn row(id: &str, verdict: Verdict) -> ClaimVerification {
        ClaimVerification {
            claim_id: id.into(),
            claim: format!("claim {id}"),
            verdict,
            evidence: vec![],
            reasoning: String::new(),
        }
    }

    // ─── enum parsing ───────────────────────────────────────────

    #[test]
    fn test_category_parse_variants() {
        assert_eq!("data-privacy".parse(), Ok(Category::DataPrivacy));
        assert_eq!("Data_Privacy".parse(), Ok(Category::DataPrivacy));
        assert_eq!(" LEGAL ".parse(), Ok(Category::Legal));
        assert!("privacy".parse::<Category>().is_err());
    }

    #[test]
    fn test_severity_order_critical_first() {
        let mut v = vec![Severity::Low, Severity::Critical, Severity::Medium, Severity::High];
        v.sort();
        assert_eq!(v, Severity::ALL.to_vec());
        assert!("urgent".parse::<Severity>().is_err());
    }

    #[test]
    fn test_verdict_parse_aliases() {
        assert_eq!("pass".parse(), Ok(Verdict::Pass));
        assert_eq!("N/A".parse(), Ok(Verdict::NotApplicable));
        assert_eq!("na".parse(), Ok(Verdict::NotApplicable));
        assert_eq!("not_applicable".parse(), Ok(Verdict::NotApplicable));
        assert!("maybe".parse::<Verdict>().is_err());
    }

    #[test]
    fn test_verdict_wire_format() {
        let json = serde_json::to_string(&Verdict::NotApplicable).unwrap();
        assert_eq!(json, "\"N/A\"");
        let v: Verdict = serde_json::from_str("\"PARTIAL\"").unwrap();
        assert_eq!(v, Verdict::Partial);
    }

    // ─── ExtractionResult ───────────────────────────────────────

    #[test]
    fn test_extraction_counts_derived() {
        let r = ExtractionResult::new(1, "policy", vec![claim("a", true), claim("b", false)]);
        assert_eq!(r.total_claims, 2);
        assert_eq!(r.testable_claims, 1);
        assert!(r.check_invariants().is_ok());
    }

    #[test]
    fn test_extraction_camel_case_fields() {
        let r = ExtractionResult::new(2, "policy", vec![claim("a", true)]);
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["documentType"], "policy");
        assert_eq!(json["totalClaims"], 1);
        assert_eq!(json["testableClaims"], 1);
        assert_eq!(json["claims"][0]["category"], "security");
        assert!(json.get("extractedAt").is_some());
    }

    #[test]
    fn test_extraction_detects_tampered_counts() {
        let mut r = ExtractionResult::new(1, "policy", vec![claim("a", true)]);
        r.total_claims = 5;
        assert!(r.check_invariants().is_err());
    }

    #[test]
    fn test_extraction_detects_duplicate_ids() {
        let r = ExtractionResult::new(1, "policy", vec![claim("a", true), claim("a", true)]);
        assert!(r.check_invariants().is_err());
    }

    // ─── VerificationReport ─────────────────────────────────────

    #[test]
    fn test_report_tally_derived() {
        let rows = vec![
            row("a", Verdict::Pass),
            row("b", Verdict::Partial),
            row("c", Verdict::Fail),
            row("d", Verdict::NotApplicable),
            row("e", Verdict::Pass),
        ];
        let r = VerificationReport::new(1, "/code", rows);
        assert_eq!(
            r.verdicts,
            VerdictTally {
                pass: 2,
                partial: 1,
                fail: 1,
                na: 1
            }
        );
        assert_eq!(r.verdicts.total(), r.verifications.len());
    }

    #[test]
    fn test_check_against_accepts_any_order() {
        let ex = ExtractionResult::new(1, "doc", vec![claim("a", true), claim("b", false)]);
        let r = VerificationReport::new(
            1,
            "/code",
            vec![row("b", Verdict::NotApplicable), row("a", Verdict::Pass)],
        );
        assert!(r.check_against(&ex).is_ok());
    }

    #[test]
    fn test_check_against_rejects_missing_unknown_duplicate() {
        let ex = ExtractionResult::new(1, "doc", vec![claim("a", true), claim("b", true)]);

        let missing = VerificationReport::new(1, "/c", vec![row("a", Verdict::Pass)]);
        assert!(missing.check_against(&ex).is_err());

        let unknown = VerificationReport::new(
            1,
            "/c",
            vec![row("a", Verdict::Pass), row("z", Verdict::Pass)],
        );
        assert!(unknown.check_against(&ex).is_err());

        let dup = VerificationReport::new(
            1,
            "/c",
            vec![row("a", Verdict::Pass), row("a", Verdict::Fail)],
        );
        assert!(dup.check_against(&ex).is_err());
    }

    #[test]
    fn test_check_against_rejects_iteration_mismatch() {
        let ex = ExtractionResult::new(1, "doc", vec![claim("a", true)]);
        let r = VerificationReport::new(2, "/c", vec![row("a", Verdict::Pass)]);
        assert!(r.check_against(&ex).is_err());
    }

    #[test]
    fn test_check_against_rejects_tampered_tally() {
        let ex = ExtractionResult::new(1, "doc", vec![claim("a", true)]);
        let mut r = VerificationReport::new(1, "/c", vec![row("a", Verdict::Pass)]);
        r.verdicts.fail = 1;
        assert!(r.check_against(&ex).is_err());
    }
}
