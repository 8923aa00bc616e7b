// src/iteration/controller.rs — Stage orchestration over persisted iterations
//
// Each stage reads its prerequisites from the store, does its oracle work, and
// writes its own artifact only after everything succeeded. No stage fabricates
// a missing prerequisite, and no stage touches an earlier iteration's files.

use std::path::{Path, PathBuf};

use super::store::{Artifact, IterationStore};
use super::types::{
    IterationScore, IterationSummary, LoopOutcome, ProgressEvent, ReportOutcome, StopReason,
};
use crate::claims::prompts::{
    regenerate_message, GENERATE_SYSTEM_PROMPT, REGENERATE_SYSTEM_PROMPT,
};
use crate::claims::salvage::strip_code_fence;
use crate::claims::{
    render_gap_report, ClaimExtractor, ClaimVerifier, ComplianceScore, ExtractionResult,
    VerificationReport,
};
use crate::infra::config::{Config, ExtractConfig, LoopConfig};
use crate::infra::errors::SpecLoopError;
use crate::provider::Oracle;

type ProgressFn = Box<dyn Fn(ProgressEvent) + Send + Sync>;

pub struct IterationController {
    project_dir: PathBuf,
    store: IterationStore,
    oracle: Oracle,
    extractor: ClaimExtractor,
    verifier: ClaimVerifier,
    extract_config: ExtractConfig,
    loop_config: LoopConfig,
    on_progress: Option<ProgressFn>,
}

impl IterationController {
    pub fn new(project_dir: impl Into<PathBuf>, oracle: Oracle, config: &Config) -> Self {
        let project_dir = project_dir.into();
        Self {
            store: IterationStore::for_project(&project_dir),
            extractor: ClaimExtractor::new(oracle.clone(), config.extract.clone()),
            verifier: ClaimVerifier::new(oracle.clone(), config.verify.clone()),
            oracle,
            extract_config: config.extract.clone(),
            loop_config: config.convergence.clone(),
            project_dir,
            on_progress: None,
        }
    }

    /// Set a callback for progress events.
    pub fn with_progress(mut self, cb: impl Fn(ProgressEvent) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Box::new(cb));
        self
    }

    pub fn store(&self) -> &IterationStore {
        &self.store
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(ref cb) = self.on_progress {
            cb(event);
        }
    }

    fn project_name(&self) -> String {
        self.project_dir
            .canonicalize()
            .ok()
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .unwrap_or_else(|| "project".to_string())
    }

    // ─── stages ─────────────────────────────────────────────────

    /// Extract claims from `document` into a freshly allocated iteration.
    ///
    /// The oracle call happens before allocation, so a failed extraction leaves no
    /// empty iteration behind.
    pub async fn extract(
        &self,
        document: &str,
        document_type: &str,
    ) -> Result<ExtractionResult, SpecLoopError> {
        if document.trim().is_empty() {
            return Err(SpecLoopError::BadRequest("document is empty".into()));
        }

        let extracted = self.extractor.extract(document, document_type).await?;
        let iteration = self.store.allocate_next()?;
        let result = ExtractionResult::new(iteration, document_type, extracted.claims);

        self.store.populate(iteration, |store| {
            store.write(iteration, Artifact::Document, document, false)?;
            store.write_json(iteration, Artifact::Claims, &result, false)
        })?;

        if result.claims.is_empty() {
            tracing::warn!(iteration, "Extraction produced no claims");
        }
        tracing::info!(
            iteration,
            claims = result.total_claims,
            testable = result.testable_claims,
            "Iteration extracted"
        );
        self.emit(ProgressEvent::Extracted {
            iteration,
            claims: result.total_claims,
            testable: result.testable_claims,
        });
        Ok(result)
    }

    /// Write an initial document from a short prompt, then extract it.
    pub async fn generate(
        &self,
        prompt: &str,
        document_type: &str,
    ) -> Result<ExtractionResult, SpecLoopError> {
        if prompt.trim().is_empty() {
            return Err(SpecLoopError::BadRequest("prompt is empty".into()));
        }
        let reply = self
            .oracle
            .generate(
                GENERATE_SYSTEM_PROMPT,
                &format!("Document type: {document_type}\n\n{prompt}"),
                self.extract_config.max_tokens,
            )
            .await?;
        let document = non_empty_document(&reply.text)?;
        self.extract(&document, document_type).await
    }

    /// Verify an iteration's claims against `codebase` and persist the report.
    pub async fn verify(
        &self,
        iteration: Option<u32>,
        codebase: &Path,
        force: bool,
    ) -> Result<VerificationReport, SpecLoopError> {
        let n = self.store.resolve(iteration)?;
        let extraction = self.store.load_extraction(n)?;
        // Refuse before spending oracle calls.
        self.store.ensure_writable(n, Artifact::Verification, force)?;

        let report = self.verifier.verify(&extraction, codebase).await?;
        self.store
            .write_json(n, Artifact::Verification, &report, force)?;

        self.emit(ProgressEvent::Verified {
            iteration: n,
            verdicts: report.verdicts,
        });
        Ok(report)
    }

    /// Score an iteration and write its gap report.
    pub async fn report(
        &self,
        iteration: Option<u32>,
        project: Option<&str>,
        force: bool,
    ) -> Result<ReportOutcome, SpecLoopError> {
        let n = self.store.resolve(iteration)?;
        let extraction = self.store.load_extraction(n)?;
        let verification = self.store.load_verification(n)?;
        self.store.ensure_writable(n, Artifact::GapReport, force)?;

        let score = ComplianceScore::compute(&extraction, &verification)?;
        let project = project
            .map(str::to_string)
            .unwrap_or_else(|| self.project_name());
        let markdown = render_gap_report(&extraction, &verification, &score, &project)?;
        let path = self.store.write(n, Artifact::GapReport, &markdown, force)?;

        tracing::info!(iteration = n, score = score.score, "Gap report written");
        Ok(ReportOutcome {
            iteration: n,
            score,
            path,
        })
    }

    /// Rewrite an iteration's document from its gap report and extract the result as a new
    /// iteration.
    pub async fn regenerate(
        &self,
        iteration: Option<u32>,
    ) -> Result<ExtractionResult, SpecLoopError> {
        let n = self.store.resolve(iteration)?;
        let document = self.store.read(n, Artifact::Document)?;
        let gap_report = self.store.read(n, Artifact::GapReport)?;
        let document_type = self.store.load_extraction(n)?.document_type;

        self.emit(ProgressEvent::Regenerating { from: n });
        let reply = self
            .oracle
            .generate(
                REGENERATE_SYSTEM_PROMPT,
                &regenerate_message(&document, &gap_report),
                self.extract_config.max_tokens,
            )
            .await?;
        let revised = non_empty_document(&reply.text)?;

        let next = self.extract(&revised, &document_type).await?;
        tracing::info!(from = n, to = next.iteration, "Document regenerated");
        Ok(next)
    }

    /// Run extract → verify → report → regenerate until the score target is met, the
    /// iteration budget runs out, or (optionally) the score drops.
    pub async fn converge(
        &self,
        document: &str,
        document_type: &str,
        codebase: &Path,
        project: Option<&str>,
    ) -> Result<LoopOutcome, SpecLoopError> {
        let max_rounds = self.loop_config.max_iterations.max(1);
        let mut scores: Vec<IterationScore> = Vec::new();

        self.emit(ProgressEvent::RoundStart {
            round: 1,
            max_rounds,
        });
        let mut extraction = self.extract(document, document_type).await?;

        let stop_reason = loop {
            let n = extraction.iteration;
            self.verify(Some(n), codebase, false).await?;
            let outcome = self.report(Some(n), project, false).await?;

            let score = outcome.score.score;
            let previous = scores.last().map(|s| s.score);
            scores.push(IterationScore {
                iteration: n,
                score,
            });
            self.emit(ProgressEvent::Scored {
                iteration: n,
                score,
                previous,
            });

            if let Some(reason) = self.stop_reason(score, previous, scores.len() as u32) {
                break reason;
            }

            self.emit(ProgressEvent::RoundStart {
                round: scores.len() as u32 + 1,
                max_rounds,
            });
            extraction = self.regenerate(Some(n)).await?;
        };

        let final_score = scores.last().map(|s| s.score).unwrap_or(0.0);
        tracing::info!(
            iterations = scores.len(),
            score = final_score,
            reason = %stop_reason,
            "Convergence loop finished"
        );
        self.emit(ProgressEvent::Complete {
            iterations: scores.len(),
            final_score,
            reason: stop_reason,
        });
        Ok(LoopOutcome {
            scores,
            stop_reason,
        })
    }

    fn stop_reason(&self, score: f64, previous: Option<f64>, rounds: u32) -> Option<StopReason> {
        if score >= self.loop_config.target_score {
            return Some(StopReason::TargetReached);
        }
        if self.loop_config.stop_on_regression && previous.is_some_and(|p| score < p) {
            return Some(StopReason::Regressed);
        }
        if rounds >= self.loop_config.max_iterations.max(1) {
            return Some(StopReason::MaxIterations);
        }
        None
    }

    /// Per-iteration summary of everything persisted so far.
    pub fn history(&self) -> Result<Vec<IterationSummary>, SpecLoopError> {
        self.store.history()
    }
}

fn non_empty_document(text: &str) -> Result<String, SpecLoopError> {
    let document = strip_code_fence(text);
    if document.is_empty() {
        return Err(SpecLoopError::Other(anyhow::anyhow!(
            "oracle returned an empty document"
        )));
    }
    Ok(document)
}
