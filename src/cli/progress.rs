// src/cli/progress.rs — Terminal progress renderer for stage feedback

use crate::iteration::ProgressEvent;

/// Build a progress callback that writes formatted output to stderr.
///
/// All progress output goes to stderr so stdout remains clean for command output.
/// Returns a closure suitable for `IterationController::with_progress()`.
pub fn terminal_progress() -> impl Fn(ProgressEvent) + Send + Sync + 'static {
    move |event| eprintln!("{}", format_event(&event))
}

pub fn format_event(event: &ProgressEvent) -> String {
    match event {
        ProgressEvent::RoundStart { round, max_rounds } => {
            format!("[round {}/{}] starting...", round, max_rounds)
        }
        ProgressEvent::Extracted {
            iteration,
            claims,
            testable,
        } => format!(
            "[iter {}] extracted {} claim(s), {} testable",
            iteration, claims, testable
        ),
        ProgressEvent::Verified {
            iteration,
            verdicts,
        } => format!(
            "[iter {}] verified: {} pass, {} partial, {} fail, {} n/a",
            iteration, verdicts.pass, verdicts.partial, verdicts.fail, verdicts.na
        ),
        ProgressEvent::Scored {
            iteration,
            score,
            previous,
        } => match previous {
            Some(prev) => format!(
                "[iter {}] score={:.1} ({:+.1})",
                iteration,
                score,
                score - prev
            ),
            None => format!("[iter {}] score={:.1}", iteration, score),
        },
        ProgressEvent::Regenerating { from } => {
            format!("[iter {}] regenerating document from gap report", from)
        }
        ProgressEvent::Complete {
            iterations,
            final_score,
            reason,
        } => format!(
            "[done] score={:.1} iterations={} ({})",
            final_score, iterations, reason
        ),
    }
}
