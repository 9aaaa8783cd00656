use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tts_orchestrator::controllers::{Args, CliController};
use tts_orchestrator::domain::tts::{ChunkProcessor, ProcessorSettings};
use tts_orchestrator::error::AppResult;
use tts_orchestrator::infrastructure::config::Config;
use tts_orchestrator::infrastructure::logging::init_logging;
use tts_orchestrator::infrastructure::repositories::build_tts_repository;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "tts-client failed");
            eprintln!("Error: {e}");
            e.into()
        }
    }
}

async fn run(args: Args) -> AppResult<()> {
    let command = args.command()?;

    // Load configuration
    let (config, project_root) = Config::load(args.config.as_deref())?;
    config.ensure_directories()?;

    // Initialize logging
    let _log_guard = init_logging(&config.logging, args.verbose, args.log_file_name());

    tracing::info!(
        project_root = %project_root.display(),
        transport = ?config.tts.transport,
        service_url = %config.tts.service_url(),
        workers = config.tts.workers,
        "Starting tts-client"
    );

    // === DEPENDENCY INJECTION SETUP ===
    let tts_repo = build_tts_repository(&config.tts)?;
    let processor = Arc::new(ChunkProcessor::new(
        tts_repo,
        ProcessorSettings::from_config(&config.tts),
    ));
    let controller = CliController::new(processor, config.paths.output_dir.clone());

    // Ctrl-C aborts in-flight work
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling");
            on_signal.cancel();
        }
    });

    controller.execute(command, cancel).await
}
