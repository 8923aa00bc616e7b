// src/claims/scorer.rs — Compliance scoring

use serde::{Deserialize, Serialize};

use super::types::{ExtractionResult, VerdictTally, VerificationReport};
use crate::infra::errors::SpecLoopError;

/// Share of assessed claims that hold, with partial credit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceScore {
    pub iteration: u32,
    /// 0-100.
    pub score: f64,
    /// Claims with a verdict other than N/A.
    pub assessed: usize,
    pub verdicts: VerdictTally,
}

impl ComplianceScore {
    /// Score a verification against the extraction it was produced from.
    ///
    /// `score = (pass + 0.5·partial) / (total − na) · 100`, and 0 when nothing was assessed.
    pub fn compute(
        extraction: &ExtractionResult,
        report: &VerificationReport,
    ) -> Result<Self, SpecLoopError> {
        report.check_against(extraction)?;

        let t = report.verdicts;
        let assessed = t.total() - t.na;
        let score = if assessed > 0 {
            (t.pass as f64 + 0.5 * t.partial as f64) / assessed as f64 * 100.0
        } else {
            0.0
        };

        Ok(Self {
            iteration: report.iteration,
            score,
            assessed,
            verdicts: t,
        })
    }

    pub fn is_perfect(&self) -> bool {
        self.assessed > 0 && self.verdicts.pass == self.assessed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::types::{Category, Claim, ClaimVerification, Severity, Verdict};

    fn pair(verdicts: &[Verdict]) -> (ExtractionResult, VerificationReport) {
        let claims: Vec<Claim> = (0..verdicts.len())
            .map(|i| Claim {
                id: format!("C{i}"),
                section: "1".into(),
                category: Category::Functionality,
                severity: Severity::Low,
                text: format!("claim {i}"),
                testable: true,
            })
            .collect();
        let rows = claims
            .iter()
            .zip(verdicts)
            .map(|(c, v)| ClaimVerification {
                claim_id: c.id.clone(),
                claim: c.text.clone(),
                verdict: *v,
                evidence: vec![],
                reasoning: String::new(),
            })
            .collect();
        (
            ExtractionResult::new(1, "doc", claims),
            VerificationReport::new(1, "/code", rows),
        )
    }

    fn score(verdicts: &[Verdict]) -> ComplianceScore {
        let (e, r) = pair(verdicts);
        ComplianceScore::compute(&e, &r).unwrap()
    }

    #[test]
    fn test_partial_credit() {
        use Verdict::*;
        let s = score(&[Pass, Partial, Fail, NotApplicable]);
        assert_eq!(s.assessed, 3);
        assert!((s.score - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_all_pass_is_perfect() {
        let s = score(&[Verdict::Pass, Verdict::Pass, Verdict::NotApplicable]);
        assert_eq!(s.score, 100.0);
        assert!(s.is_perfect());
    }

    #[test]
    fn test_all_na_scores_zero() {
        let s = score(&[Verdict::NotApplicable, Verdict::NotApplicable]);
        assert_eq!(s.score, 0.0);
        assert_eq!(s.assessed, 0);
        assert!(!s.is_perfect());
    }

    #[test]
    fn test_empty_scores_zero() {
        let s = score(&[]);
        assert_eq!(s.score, 0.0);
    }

    #[test]
    fn test_score_bounds_over_mixes() {
        use Verdict::*;
        let all = [Pass, Partial, Fail, NotApplicable];
        for a in all {
            for b in all {
                for c in all {
                    let s = score(&[a, b, c]);
                    assert!((0.0..=100.0).contains(&s.score));
                    assert_eq!(s.score == 100.0, s.is_perfect());
                }
            }
        }
    }

    #[test]
    fn test_mismatched_pair_rejected() {
        let (e, _) = pair(&[Verdict::Pass, Verdict::Pass]);
        let (_, r) = pair(&[Verdict::Pass]);
        let err = ComplianceScore::compute(&e, &r).unwrap_err();
        assert!(matches!(err, SpecLoopError::InvariantViolation(_)));
    }
}
