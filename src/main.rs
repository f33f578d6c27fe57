use anyhow::{Context, Result};
use clap::Parser;
use std::process;
use std::sync::Arc;
use tracing::{error, info};
use txt2pdf_batch::cli::{clear_screen, CliArgs, Prompt};
use txt2pdf_batch::config::available_units;
use txt2pdf_batch::notify::{NoopNotifier, Notifier, TerminalBell};
use txt2pdf_batch::progress::RunSummary;
use txt2pdf_batch::{Pipeline, RunConfig, RunOutcome, Settings, VERSION};

/// Exit code when the run finished but some files failed
const EXIT_PARTIAL_FAILURE: i32 = 2;

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();

    if let Err(e) = args.setup_logging() {
        eprintln!("{e:#}");
        process::exit(1);
    }

    match run(args).await {
        Ok(code) => process::exit(code),
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {e:#}");
            process::exit(1);
        }
    }
}

async fn run(args: CliArgs) -> Result<i32> {
    if args.clear {
        clear_screen();
    }
    info!("txt2pdf v{}", VERSION);

    let mut settings = match &args.config {
        Some(path) => Settings::load_from_file(path)
            .await
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Settings::default(),
    };
    if let Some(font_dir) = &args.font_dir {
        settings.render.font_dir = font_dir.clone();
    }

    let config = resolve_config(&args).await?;

    let notifier: Arc<dyn Notifier> = if args.bell {
        Arc::new(TerminalBell)
    } else {
        Arc::new(NoopNotifier)
    };

    let outcome = Pipeline::new(config, settings)
        .with_notifier(notifier)
        .with_progress(!args.no_progress)
        .run()
        .await
        .context("Conversion run aborted")?;

    match outcome {
        RunOutcome::NoFiles => {
            println!("No files found to process.");
            Ok(0)
        }
        RunOutcome::Completed(summary) => {
            println!("{summary}");
            if let Some(path) = &args.summary_json {
                write_summary(&summary, path).await?;
            }
            Ok(if summary.has_failures() {
                EXIT_PARTIAL_FAILURE
            } else {
                0
            })
        }
    }
}

/// Prompts read stdin, so they run off the async workers
async fn resolve_config(args: &CliArgs) -> Result<RunConfig> {
    let args = args.clone();
    let max_units = available_units();

    tokio::task::spawn_blocking(move || {
        let stdin = std::io::stdin();
        let stdout = std::io::stdout();
        let mut prompt = Prompt::new(stdin.lock(), stdout.lock());
        args.resolve_run_config(&mut prompt, max_units)
    })
    .await
    .context("Prompt task failed")?
}

async fn write_summary(summary: &RunSummary, path: &std::path::Path) -> Result<()> {
    let json = serde_json::to_string_pretty(summary).context("Failed to serialize summary")?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("Failed to write summary to {}", path.display()))?;
    info!("Summary written to {}", path.display());
    Ok(())
}
