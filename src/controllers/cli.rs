use crate::domain::tts::ChunkProcessorApi;
use crate::error::{AppError, AppResult};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_OUTPUT_FILE: &str = "output.wav";

#[derive(Parser, Debug)]
#[command(name = "tts-client")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Synthesize text to WAV audio through a TTS backend")]
pub struct Args {
    /// Text to synthesize into a single WAV file
    #[arg(long, conflicts_with = "chunks")]
    pub text: Option<String>,

    /// Output file for --text, output directory for --chunks
    #[arg(long, short, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// JSON file holding an array of text chunks
    #[arg(long, value_name = "FILE")]
    pub chunks: Option<PathBuf>,

    /// Path to project.toml (searched upwards from the current directory by default)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short)]
    pub verbose: bool,

    /// Check backend health and exit
    #[arg(long)]
    pub health: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Health,
    Text {
        text: String,
        output: Option<PathBuf>,
    },
    Chunks {
        file: PathBuf,
        output_dir: Option<PathBuf>,
    },
}

impl Args {
    /// Resolve the flags into the single command to run
    pub fn command(&self) -> AppResult<Command> {
        if self.health {
            return Ok(Command::Health);
        }

        match (&self.text, &self.chunks) {
            (Some(text), None) => Ok(Command::Text {
                text: text.clone(),
                output: self.output.clone(),
            }),
            (None, Some(file)) => Ok(Command::Chunks {
                file: file.clone(),
                output_dir: self.output.clone(),
            }),
            (Some(_), Some(_)) => Err(AppError::InvalidInput(
                "--text and --chunks cannot be used together".to_string(),
            )),
            (None, None) => Err(AppError::InvalidInput(
                "either --text or --chunks must be provided".to_string(),
            )),
        }
    }

    pub fn log_file_name(&self) -> &'static str {
        if self.verbose {
            "tts-client-verbose.log"
        } else {
            "tts-client.log"
        }
    }
}

pub struct CliController {
    processor: Arc<dyn ChunkProcessorApi>,
    output_dir: PathBuf,
}

impl CliController {
    /// `output_dir` is used when a command has no explicit output
    pub fn new(processor: Arc<dyn ChunkProcessorApi>, output_dir: PathBuf) -> Self {
        Self {
            processor,
            output_dir,
        }
    }

    pub async fn execute(&self, command: Command, cancel: CancellationToken) -> AppResult<()> {
        match command {
            Command::Health => {
                self.processor.check_health().await?;
                println!("TTS service is healthy");
                Ok(())
            }
            Command::Text { text, output } => {
                let output = output.unwrap_or_else(|| self.output_dir.join(DEFAULT_OUTPUT_FILE));

                let written = self
                    .processor
                    .process_single_chunk(&text, &output, cancel)
                    .await?;

                tracing::info!(
                    output = %output.display(),
                    size_bytes = written,
                    "Speech generated"
                );
                println!("Audio written to {}", output.display());
                Ok(())
            }
            Command::Chunks { file, output_dir } => {
                let output_dir = output_dir.unwrap_or_else(|| self.output_dir.clone());

                self.processor
                    .process_chunks_file(&file, &output_dir, cancel)
                    .await?;

                println!("Audio chunks written to {}", output_dir.display());
                Ok(())
            }
        }
    }
}
