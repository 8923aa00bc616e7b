// src/cli/mod.rs — CLI definition (clap derive)

pub mod iterate;
pub mod pipeline;
pub mod progress;
pub mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "specloop",
    about = "Extract testable claims from a spec, verify them against code, iterate",
    version
)]
pub struct Cli {
    /// Model to use (provider/model format, e.g. anthropic/claude-sonnet-4-20250514)
    #[arg(short, long, global = true)]
    pub model: Option<String>,

    /// Config file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Project whose `.specloop/` directory holds the iterations
    #[arg(long, global = true, default_value = ".")]
    pub project_dir: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Extract claims from a document into a new iteration
    Extract {
        /// Document to extract from
        document: PathBuf,
        /// Kind of document (specification, design doc, RFC, ...)
        #[arg(short = 't', long = "type")]
        doc_type: Option<String>,
    },
    /// Write an initial document from a prompt, then extract it
    Generate {
        #[arg(required = true)]
        prompt: Vec<String>,
        #[arg(short = 't', long = "type")]
        doc_type: Option<String>,
    },
    /// Verify an iteration's claims against a codebase
    Verify {
        /// Iteration number (default: latest)
        #[arg(short, long)]
        iteration: Option<u32>,
        /// Codebase root
        #[arg(short, long, default_value = ".")]
        codebase: PathBuf,
        /// Overwrite an existing verification
        #[arg(long)]
        force: bool,
    },
    /// Render the gap report for an iteration
    Report {
        #[arg(short, long)]
        iteration: Option<u32>,
        /// Project name shown in the report header
        #[arg(short, long)]
        project: Option<String>,
        #[arg(long)]
        force: bool,
    },
    /// Rewrite the document from its gap report and start the next iteration
    Regenerate {
        #[arg(short, long)]
        iteration: Option<u32>,
    },
    /// Run extract → verify → report → regenerate until the score converges
    Loop {
        document: PathBuf,
        #[arg(short, long, default_value = ".")]
        codebase: PathBuf,
        #[arg(short = 't', long = "type")]
        doc_type: Option<String>,
        /// Override loop.max_iterations
        #[arg(long)]
        max_iterations: Option<u32>,
        /// Override loop.target_score (0-100)
        #[arg(long)]
        target: Option<f64>,
    },
    /// Show every iteration with its stage and score
    Status,
    /// Derive claims from code, verify them, and propose remediation
    Forward {
        /// Source file to analyze
        file: PathBuf,
        #[arg(short, long)]
        language: Option<String>,
        /// Extra context for the claims step
        #[arg(long)]
        context: Option<String>,
    },
    /// Derive a spec from a task, generate code for it, and verify the code
    Reverse {
        #[arg(required = true)]
        task: Vec<String>,
        #[arg(short, long)]
        language: Option<String>,
    },
    /// Serve the forward/reverse pipelines over HTTP
    Serve {
        /// Override api.port
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_verify_with_globals() {
        let cli = Cli::try_parse_from([
            "specloop",
            "--project-dir",
            "/tmp/p",
            "verify",
            "-i",
            "3",
            "--codebase",
            "src",
            "--force",
        ])
        .unwrap();
        assert_eq!(cli.project_dir, PathBuf::from("/tmp/p"));
        match cli.command {
            Commands::Verify {
                iteration,
                codebase,
                force,
            } => {
                assert_eq!(iteration, Some(3));
                assert_eq!(codebase, PathBuf::from("src"));
                assert!(force);
            }
            _ => panic!("expected verify"),
        }
    }

    #[test]
    fn test_parse_reverse_joins_words() {
        let cli = Cli::try_parse_from(["specloop", "reverse", "parse", "ISO", "dates"]).unwrap();
        match cli.command {
            Commands::Reverse { task, language } => {
                assert_eq!(task.join(" "), "parse ISO dates");
                assert!(language.is_none());
            }
            _ => panic!("expected reverse"),
        }
    }

    #[test]
    fn test_global_model_after_subcommand() {
        let cli = Cli::try_parse_from(["specloop", "status", "--model", "openai/gpt-4.1"]).unwrap();
        assert_eq!(cli.model.as_deref(), Some("openai/gpt-4.1"));
    }
}
