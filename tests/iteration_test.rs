// tests/iteration_test.rs — Integration test: iteration stages and the convergence loop

mod common;

use std::path::Path;
use std::sync::{Arc, Mutex};

use pretty_assertions::assert_eq;
use serde_json::json;

use common::{is, oracle, user_text, ScriptedProvider};
use specloop::claims::prompts::{
    EXTRACTION_SYSTEM_PROMPT, GENERATE_SYSTEM_PROMPT, REGENERATE_SYSTEM_PROMPT,
    VERIFY_SYSTEM_PROMPT,
};
use specloop::claims::Verdict;
use specloop::infra::config::Config;
use specloop::infra::errors::SpecLoopError;
use specloop::iteration::{
    Artifact, IterationController, IterationStore, ProgressEvent, Stage, StopReason,
};

const DOC_V1: &str = "# Retention policy\n\n1. Accounts are deleted after 30 days.\n";
const DOC_V2: &str = "# Retention policy (revised)\n\n1. Accounts are deleted on request.\n";

fn codebase() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("src")).unwrap();
    std::fs::write(
        dir.path().join("src/lib.rs"),
        "pub fn delete_account(id: u64) { db::remove(id) }\n",
    )
    .unwrap();
    dir
}

fn claim(id: &str, text: &str) -> serde_json::Value {
    json!({
        "id": id,
        "section": "1",
        "category": "data-privacy",
        "severity": "high",
        "text": text,
        "testable": true
    })
}

fn verdict(id: &str, verdict: &str) -> serde_json::Value {
    json!({
        "claimId": id,
        "verdict": verdict,
        "evidence": [{"file": "src/lib.rs", "lineNumber": 1, "snippet": "db::remove(id)", "confidence": 0.8}],
        "reasoning": "seen in delete_account"
    })
}

/// v1 scores 50 (1 pass, 1 fail, 1 partial, 1 n/a); the regenerated v2 scores 100.
fn converging_oracle() -> Arc<ScriptedProvider> {
    ScriptedProvider::new(|req| {
        let user = user_text(req);
        let reply = if is(req, EXTRACTION_SYSTEM_PROMPT) {
            if user.contains("revised") {
                json!([
                    claim("C1", "Accounts are deleted on request (revised)"),
                    claim("C2", "Deletion removes the database row (revised)")
                ])
            } else {
                json!([
                    claim("C1", "Accounts are deleted after 30 days"),
                    claim("C2", "Backups are purged"),
                    claim("C3", "Deletion is logged"),
                    claim("C4", "Users are notified by post")
                ])
            }
            .to_string()
        } else if is(req, VERIFY_SYSTEM_PROMPT) {
            if user.contains("revised") {
                json!([verdict("C1", "PASS"), verdict("C2", "PASS")])
            } else {
                json!([
                    verdict("C1", "PASS"),
                    verdict("C2", "FAIL"),
                    verdict("C3", "PARTIAL"),
                    verdict("C4", "N/A")
                ])
            }
            .to_string()
        } else if is(req, REGENERATE_SYSTEM_PROMPT) {
            format!("```markdown\n{DOC_V2}\n```")
        } else if is(req, GENERATE_SYSTEM_PROMPT) {
            DOC_V1.to_string()
        } else {
            String::new()
        };
        Ok(reply)
    })
}

fn controller(project: &Path, provider: &Arc<ScriptedProvider>) -> IterationController {
    IterationController::new(project, oracle(provider), &Config::default())
}

// ─── convergence ────────────────────────────────────────────────

#[tokio::test]
async fn test_loop_converges_after_regeneration() {
    let project = tempfile::tempdir().unwrap();
    let code = codebase();
    let provider = converging_oracle();
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();

    let outcome = controller(project.path(), &provider)
        .with_progress(move |e| sink.lock().unwrap().push(e))
        .converge(DOC_V1, "policy", code.path(), Some("acme"))
        .await
        .unwrap();

    let scores: Vec<(u32, f64)> = outcome
        .scores
        .iter()
        .map(|s| (s.iteration, s.score))
        .collect();
    assert_eq!(scores, vec![(1, 50.0), (2, 100.0)]);
    assert_eq!(outcome.stop_reason, StopReason::TargetReached);

    let store = IterationStore::for_project(project.path());
    assert_eq!(store.list().unwrap(), vec![1, 2]);
    let doc2 = store.read(2, Artifact::Document).unwrap();
    assert!(doc2.contains("(revised)"));
    assert!(!doc2.contains("```"));

    let report1 = store.read(1, Artifact::GapReport).unwrap();
    assert!(report1.contains("acme"));
    assert!(report1.contains("Backups are purged"));

    let history = store.history().unwrap();
    assert!(history.iter().all(|h| h.stage == Stage::Reported));
    assert_eq!(history[1].score, Some(100.0));

    let events = events.lock().unwrap();
    assert!(matches!(
        events.last(),
        Some(ProgressEvent::Complete {
            iterations: 2,
            reason: StopReason::TargetReached,
            ..
        })
    ));
    assert!(events
        .iter()
        .any(|e| matches!(e, ProgressEvent::Regenerating { from: 1 })));
}

#[tokio::test]
async fn test_loop_stops_at_max_iterations() {
    let project = tempfile::tempdir().unwrap();
    let code = codebase();
    // Regeneration hands back the same document, so the score never moves.
    let provider = ScriptedProvider::new(|req| {
        Ok(if is(req, EXTRACTION_SYSTEM_PROMPT) {
            json!([claim("C1", "Accounts are deleted"), claim("C2", "Backups purged")]).to_string()
        } else if is(req, VERIFY_SYSTEM_PROMPT) {
            json!([verdict("C1", "PASS"), verdict("C2", "FAIL")]).to_string()
        } else {
            DOC_V1.to_string()
        })
    });
    let mut config = Config::default();
    config.convergence.max_iterations = 2;

    let outcome = IterationController::new(project.path(), oracle(&provider), &config)
        .converge(DOC_V1, "policy", code.path(), None)
        .await
        .unwrap();
    assert_eq!(outcome.scores.len(), 2);
    assert_eq!(outcome.stop_reason, StopReason::MaxIterations);
    assert_eq!(outcome.final_score().unwrap().score, 50.0);
}

// ─── stage prerequisites ────────────────────────────────────────

#[tokio::test]
async fn test_verify_without_iterations_fails() {
    let project = tempfile::tempdir().unwrap();
    let code = codebase();
    let provider = converging_oracle();
    let err = controller(project.path(), &provider)
        .verify(None, code.path(), false)
        .await
        .unwrap_err();
    assert!(matches!(err, SpecLoopError::NoIterations));
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn test_report_names_missing_verification() {
    let project = tempfile::tempdir().unwrap();
    let provider = converging_oracle();
    let c = controller(project.path(), &provider);
    c.extract(DOC_V1, "policy").await.unwrap();

    let err = c.report(None, None, false).await.unwrap_err();
    match err {
        SpecLoopError::MissingArtifact {
            iteration,
            artifact,
            stage,
        } => {
            assert_eq!(iteration, 1);
            assert_eq!(artifact, "verification.json");
            assert_eq!(stage, "verify");
        }
        other => panic!("expected MissingArtifact, got {other:?}"),
    }
    assert!(!IterationStore::for_project(project.path()).exists(1, Artifact::GapReport));
}

#[tokio::test]
async fn test_regenerate_requires_gap_report() {
    let project = tempfile::tempdir().unwrap();
    let code = codebase();
    let provider = converging_oracle();
    let c = controller(project.path(), &provider);
    c.extract(DOC_V1, "policy").await.unwrap();
    c.verify(Some(1), code.path(), false).await.unwrap();

    let err = c.regenerate(None).await.unwrap_err();
    assert!(matches!(
        err,
        SpecLoopError::MissingArtifact {
            stage: "report",
            ..
        }
    ));
}

#[tokio::test]
async fn test_verify_refuses_overwrite_without_force() {
    let project = tempfile::tempdir().unwrap();
    let code = codebase();
    let provider = converging_oracle();
    let c = controller(project.path(), &provider);
    c.extract(DOC_V1, "policy").await.unwrap();
    let first = c.verify(None, code.path(), false).await.unwrap();
    assert_eq!(first.verdicts.total(), 4);

    let calls = provider.calls();
    let err = c.verify(None, code.path(), false).await.unwrap_err();
    assert!(matches!(err, SpecLoopError::ArtifactExists { iteration: 1, .. }));
    assert_eq!(provider.calls(), calls);

    let again = c.verify(None, code.path(), true).await.unwrap();
    assert_eq!(again.verdicts, first.verdicts);
}

#[tokio::test]
async fn test_verify_missing_codebase() {
    let project = tempfile::tempdir().unwrap();
    let provider = converging_oracle();
    let c = controller(project.path(), &provider);
    c.extract(DOC_V1, "policy").await.unwrap();
    let err = c
        .verify(None, &project.path().join("nope"), false)
        .await
        .unwrap_err();
    assert!(matches!(err, SpecLoopError::CodebaseNotFound(_)));
}

// ─── latest resolution ──────────────────────────────────────────

#[tokio::test]
async fn test_stages_default_to_latest_iteration() {
    let project = tempfile::tempdir().unwrap();
    let code = codebase();
    let provider = converging_oracle();
    let c = controller(project.path(), &provider);
    c.extract(DOC_V1, "policy").await.unwrap();
    c.extract(DOC_V2, "policy").await.unwrap();

    let report = c.verify(None, code.path(), false).await.unwrap();
    assert_eq!(report.iteration, 2);
    assert!(report
        .verifications
        .iter()
        .all(|v| v.verdict == Verdict::Pass));
    assert!(!c.store().exists(1, Artifact::Verification));
}

#[tokio::test]
async fn test_generate_writes_document_then_extracts() {
    let project = tempfile::tempdir().unwrap();
    let provider = converging_oracle();
    let c = controller(project.path(), &provider);
    let extraction = c
        .generate("a data retention policy", "policy")
        .await
        .unwrap();
    assert_eq!(extraction.iteration, 1);
    assert_eq!(extraction.total_claims, 4);
    assert_eq!(
        c.store().read(1, Artifact::Document).unwrap().trim(),
        DOC_V1.trim()
    );
}
