// src/cli/iterate.rs — Iteration stage commands (extract, verify, report, loop, ...)

use std::path::{Path, PathBuf};

use super::progress::terminal_progress;
use crate::infra::config::Config;
use crate::iteration::{IterationController, IterationStore, IterationSummary};
use crate::provider::Oracle;

/// Everything the stage commands share.
pub struct StageContext {
    pub project_dir: PathBuf,
    pub config: Config,
    pub oracle: Oracle,
}

impl StageContext {
    fn controller(&self) -> IterationController {
        IterationController::new(&self.project_dir, self.oracle.clone(), &self.config)
            .with_progress(terminal_progress())
    }

    fn doc_type<'a>(&'a self, doc_type: Option<&'a str>) -> &'a str {
        doc_type.unwrap_or(&self.config.extract.document_type)
    }
}

fn read_document(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("cannot read {}: {e}", path.display()))
}

pub async fn run_extract(
    ctx: &StageContext,
    document: &Path,
    doc_type: Option<&str>,
) -> anyhow::Result<()> {
    let text = read_document(document)?;
    let extraction = ctx.controller().extract(&text, ctx.doc_type(doc_type)).await?;
    println!(
        "iteration {}: {} claim(s), {} testable",
        extraction.iteration, extraction.total_claims, extraction.testable_claims
    );
    Ok(())
}

pub async fn run_generate(
    ctx: &StageContext,
    prompt: &str,
    doc_type: Option<&str>,
) -> anyhow::Result<()> {
    let extraction = ctx
        .controller()
        .generate(prompt, ctx.doc_type(doc_type))
        .await?;
    println!(
        "iteration {}: generated document, {} claim(s)",
        extraction.iteration, extraction.total_claims
    );
    Ok(())
}

pub async fn run_verify(
    ctx: &StageContext,
    iteration: Option<u32>,
    codebase: &Path,
    force: bool,
) -> anyhow::Result<()> {
    let report = ctx.controller().verify(iteration, codebase, force).await?;
    let v = report.verdicts;
    println!(
        "iteration {}: {} pass, {} partial, {} fail, {} n/a",
        report.iteration, v.pass, v.partial, v.fail, v.na
    );
    Ok(())
}

pub async fn run_report(
    ctx: &StageContext,
    iteration: Option<u32>,
    project: Option<&str>,
    force: bool,
) -> anyhow::Result<()> {
    let outcome = ctx.controller().report(iteration, project, force).await?;
    println!(
        "iteration {}: score {:.1} -> {}",
        outcome.iteration,
        outcome.score.score,
        outcome.path.display()
    );
    Ok(())
}

pub async fn run_regenerate(ctx: &StageContext, iteration: Option<u32>) -> anyhow::Result<()> {
    let extraction = ctx.controller().regenerate(iteration).await?;
    println!(
        "iteration {}: regenerated document, {} claim(s)",
        extraction.iteration, extraction.total_claims
    );
    Ok(())
}

pub async fn run_loop(
    ctx: &StageContext,
    document: &Path,
    codebase: &Path,
    doc_type: Option<&str>,
) -> anyhow::Result<()> {
    let text = read_document(document)?;
    let outcome = ctx
        .controller()
        .converge(&text, ctx.doc_type(doc_type), codebase, None)
        .await?;

    for s in &outcome.scores {
        println!("iteration {:>3}  {:>6.1}", s.iteration, s.score);
    }
    if let Some(best) = outcome.best() {
        println!(
            "stopped: {} (best {:.1} at iteration {})",
            outcome.stop_reason, best.score, best.iteration
        );
    }
    Ok(())
}

/// Print the iteration table. Needs no oracle.
pub fn show_status(project_dir: &Path) -> anyhow::Result<()> {
    let store = IterationStore::for_project(project_dir);
    let history = store.history()?;

    println!("specloop v{}", env!("CARGO_PKG_VERSION"));
    println!("  Iterations: {}", store.root().display());
    if history.is_empty() {
        println!();
        println!("  (no iterations yet; run `specloop extract <document>`)");
        return Ok(());
    }

    println!();
    for row in &history {
        println!("  {}", status_line(row));
    }
    Ok(())
}

fn status_line(row: &IterationSummary) -> String {
    let mut line = format!("#{:<4} {:<10}", row.iteration, row.stage.to_string());
    if let (Some(claims), Some(testable)) = (row.claims, row.testable) {
        line.push_str(&format!(" claims={claims} testable={testable}"));
    }
    if let Some(v) = row.verdicts {
        line.push_str(&format!(
            " pass={} partial={} fail={} n/a={}",
            v.pass, v.partial, v.fail, v.na
        ));
    }
    if let Some(score) = row.score {
        line.push_str(&format!(" score={score:.1}"));
    }
    line
}
