// src/cli/pipeline.rs — One-shot forward and reverse runs from the terminal

use std::path::Path;

use crate::infra::config::PipelineConfig;
use crate::pipeline::{
    new_request_id, ForwardPipeline, ForwardRequest, ReversePipeline, ReverseRequest,
};
use crate::provider::Oracle;

/// Guess a language name from the file extension.
fn language_for(path: &Path) -> Option<&'static str> {
    let lang = match path.extension()?.to_str()? {
        "rs" => "rust",
        "py" => "python",
        "ts" | "tsx" => "typescript",
        "js" | "jsx" | "mjs" => "javascript",
        "go" => "go",
        "java" => "java",
        "kt" => "kotlin",
        "rb" => "ruby",
        "c" | "h" => "c",
        "cc" | "cpp" | "hpp" => "cpp",
        "cs" => "csharp",
        "swift" => "swift",
        _ => return None,
    };
    Some(lang)
}

/// Run the forward pipeline on a file and print the response as JSON.
pub async fn run_forward(
    oracle: Oracle,
    config: PipelineConfig,
    file: &Path,
    language: Option<String>,
    context: Option<String>,
) -> anyhow::Result<()> {
    let code = std::fs::read_to_string(file)
        .map_err(|e| anyhow::anyhow!("cannot read {}: {e}", file.display()))?;
    let language = language.or_else(|| language_for(file).map(String::from));

    let request_id = new_request_id();
    let response = ForwardPipeline::new(oracle, config)
        .run(
            ForwardRequest {
                code,
                language,
                context,
            },
            &request_id,
        )
        .await?;

    let s = response.verification.summary;
    eprintln!(
        "[forward] {} claim(s): {} passed, {} partial, {} failed; {} remediation(s)",
        response.claims.len(),
        s.passed,
        s.partial,
        s.failed,
        response.remediation.len()
    );
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

/// Run the reverse pipeline on a task and print the response as JSON.
pub async fn run_reverse(
    oracle: Oracle,
    config: PipelineConfig,
    task: String,
    language: Option<String>,
) -> anyhow::Result<()> {
    let request_id = new_request_id();
    let response = ReversePipeline::new(oracle, config)
        .run(ReverseRequest { task, language }, &request_id)
        .await?;

    eprintln!(
        "[reverse] {} spec item(s), {} constraint(s); {}/{} satisfied ({:.0}%)",
        response.specs.len(),
        response.constraints.len(),
        response.verification.satisfied,
        response.verification.total,
        response.verification.percentage
    );
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
