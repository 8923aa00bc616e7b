// src/main.rs — specloop entry point

use clap::Parser;

use specloop::cli::iterate::{self, StageContext};
use specloop::cli::{pipeline, serve, Cli, Commands};
use specloop::infra::config::Config;
use specloop::infra::logger;
use specloop::provider::resolver;
use specloop::provider::Oracle;

#[tokio::main]
async fn main() {
    // Initialize logging (respects SPECLOOP_LOG / RUST_LOG)
    logger::init_logging("warn");

    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load config (falls back to defaults if no config.toml)
    let mut config = match cli.config {
        Some(ref path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    // Commands that don't need a provider
    if let Commands::Status = cli.command {
        return iterate::show_status(&cli.project_dir);
    }

    if let Commands::Loop {
        max_iterations,
        target,
        ..
    } = &cli.command
    {
        if let Some(n) = max_iterations {
            config.convergence.max_iterations = *n;
        }
        if let Some(t) = target {
            config.convergence.target_score = *t;
        }
        config.validate()?;
    }

    let oracle = resolve(cli.model.as_deref(), &config)?;

    match cli.command {
        Commands::Forward {
            file,
            language,
            context,
        } => pipeline::run_forward(oracle, config.pipeline, &file, language, context).await,
        Commands::Reverse { task, language } => {
            pipeline::run_reverse(oracle, config.pipeline, task.join(" "), language).await
        }
        Commands::Serve { port } => serve::run_serve(oracle, config, port).await,
        command => {
            let ctx = StageContext {
                project_dir: cli.project_dir,
                config,
                oracle,
            };
            run_stage(&ctx, command).await
        }
    }
}

fn resolve(cli_model: Option<&str>, config: &Config) -> anyhow::Result<Oracle> {
    let model_ref = resolver::select_model(cli_model, &config.models)?;
    tracing::debug!(model = %model_ref, "Using oracle");
    Ok(resolver::resolve_oracle(&model_ref, &config.models)?)
}

async fn run_stage(ctx: &StageContext, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Extract { document, doc_type } => {
            iterate::run_extract(ctx, &document, doc_type.as_deref()).await
        }
        Commands::Generate { prompt, doc_type } => {
            iterate::run_generate(ctx, &prompt.join(" "), doc_type.as_deref()).await
        }
        Commands::Verify {
            iteration,
            codebase,
            force,
        } => iterate::run_verify(ctx, iteration, &codebase, force).await,
        Commands::Report {
            iteration,
            project,
            force,
        } => iterate::run_report(ctx, iteration, project.as_deref(), force).await,
        Commands::Regenerate { iteration } => iterate::run_regenerate(ctx, iteration).await,
        Commands::Loop {
            document,
            codebase,
            doc_type,
            ..
        } => iterate::run_loop(ctx, &document, &codebase, doc_type.as_deref()).await,
        Commands::Status
        | Commands::Forward { .. }
        | Commands::Reverse { .. }
        | Commands::Serve { .. } => Ok(()),
    }
}
