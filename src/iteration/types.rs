// src/iteration/types.rs — Iteration controller data types

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::claims::{ComplianceScore, VerdictTally};

/// Result of the `report` stage.
#[derive(Debug, Clone)]
pub struct ReportOutcome {
    pub iteration: u32,
    pub score: ComplianceScore,
    pub path: PathBuf,
}

/// Why the convergence loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    TargetReached,
    MaxIterations,
    Regressed,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::TargetReached => write!(f, "target reached"),
            StopReason::MaxIterations => write!(f, "max iterations"),
            StopReason::Regressed => write!(f, "score regressed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IterationScore {
    pub iteration: u32,
    pub score: f64,
}

/// Summary of a finished convergence loop.
#[derive(Debug, Clone)]
pub struct LoopOutcome {
    /// One entry per scored iteration, in order.
    pub scores: Vec<IterationScore>,
    pub stop_reason: StopReason,
}

impl LoopOutcome {
    pub fn final_score(&self) -> Option<IterationScore> {
        self.scores.last().copied()
    }

    pub fn best(&self) -> Option<IterationScore> {
        self.scores
            .iter()
            .copied()
            .max_by(|a, b| a.score.total_cmp(&b.score))
    }
}

/// How far an iteration has progressed through the stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Directory allocated, nothing usable inside.
    Empty,
    Extracted,
    Verified,
    Reported,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Empty => "empty",
            Stage::Extracted => "extracted",
            Stage::Verified => "verified",
            Stage::Reported => "reported",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IterationSummary {
    pub iteration: u32,
    pub stage: Stage,
    pub claims: Option<usize>,
    pub testable: Option<usize>,
    pub verdicts: Option<VerdictTally>,
    pub score: Option<f64>,
}

/// Lifecycle events emitted while stages run.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    RoundStart {
        round: u32,
        max_rounds: u32,
    },
    Extracted {
        iteration: u32,
        claims: usize,
        testable: usize,
    },
    Verified {
        iteration: u32,
        verdicts: VerdictTally,
    },
    Scored {
        iteration: u32,
        score: f64,
        previous: Option<f64>,
    },
    Regenerating {
        from: u32,
    },
    Complete {
        iterations: usize,
        final_score: f64,
        reason: StopReason,
    },
}
