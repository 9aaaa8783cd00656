use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tts_orchestrator::controllers::WorkerController;
use tts_orchestrator::domain::jobs::{DispatcherSettings, JobDispatcher};
use tts_orchestrator::infrastructure::config::Config;
use tts_orchestrator::infrastructure::logging::init_logging;
use tts_orchestrator::infrastructure::messaging::{JsonLinesBus, MessageBus};
use tts_orchestrator::infrastructure::repositories::{build_object_store, build_tts_repository};

#[derive(Parser, Debug)]
#[command(name = "tts-worker")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Serve TTS jobs read as JSON lines on stdin, replying on stdout")]
struct Args {
    /// Path to project.toml
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let (config, _) = Config::load(args.config.as_deref())?;
    config.ensure_directories()?;

    let settings = DispatcherSettings::from_config(&config)?;

    let _log_guard = init_logging(&config.logging, args.verbose, "tts-worker.log");

    tracing::info!(
        subject = %config.dispatcher.subject,
        transport = ?config.tts.transport,
        object_store = ?config.object_store.kind,
        "Starting tts-worker"
    );

    let bus: Arc<dyn MessageBus> = Arc::new(JsonLinesBus::stdio());
    let dispatcher = Arc::new(JobDispatcher::new(
        build_object_store(&config.object_store),
        build_tts_repository(&config.tts)?,
        bus.clone(),
        settings,
    ));
    let worker = WorkerController::new(
        bus,
        dispatcher,
        config.dispatcher.subject.clone(),
        config.tts.workers,
    );

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
            on_signal.cancel();
        }
    });

    worker.run(cancel).await?;
    Ok(())
}
