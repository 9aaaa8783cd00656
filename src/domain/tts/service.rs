use super::chunks::{chunk_output_path, read_chunks_file};
use super::dto::SynthesisRequest;
use super::error::{BatchFailure, ChunkFailure, ChunkProcessorError, SynthesisError};
use crate::infrastructure::config::{TtsConfig, MAX_WORKERS};
use crate::infrastructure::repositories::TtsRepository;
use async_trait::async_trait;
use std::collections::BTreeSet;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Pre-flight probe deadline, independent of the per-request timeout.
pub const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

#[cfg(unix)]
const OUTPUT_DIR_MODE: u32 = 0o750;
#[cfg(unix)]
const OUTPUT_FILE_MODE: u32 = 0o600;

#[derive(Debug, Clone)]
pub struct ProcessorSettings {
    /// Maximum number of synthesis calls in flight
    pub workers: usize,
    pub request_timeout: Duration,
    pub health_check_timeout: Duration,
    pub temperature: f64,
    pub language: String,
    pub speaker_ref_path: Option<String>,
}

impl ProcessorSettings {
    pub fn from_config(tts: &TtsConfig) -> Self {
        Self {
            workers: tts.workers,
            request_timeout: tts.request_timeout(),
            health_check_timeout: HEALTH_CHECK_TIMEOUT,
            temperature: tts.temperature,
            language: tts.language.clone(),
            speaker_ref_path: tts.speaker_ref_path.clone(),
        }
    }
}

impl Default for ProcessorSettings {
    fn default() -> Self {
        Self::from_config(&TtsConfig::default())
    }
}

#[derive(Clone)]
pub struct ChunkProcessor {
    tts_repo: Arc<dyn TtsRepository>,
    settings: Arc<ProcessorSettings>,
}

impl ChunkProcessor {
    pub fn new(tts_repo: Arc<dyn TtsRepository>, settings: ProcessorSettings) -> Self {
        Self {
            tts_repo,
            settings: Arc::new(settings),
        }
    }

    pub fn settings(&self) -> &ProcessorSettings {
        &self.settings
    }
}

#[async_trait]
pub trait ChunkProcessorApi: Send + Sync {
    /// Probe the synthesis backend with the pre-flight timeout
    async fn check_health(&self) -> Result<(), ChunkProcessorError>;

    /// Synthesize every chunk into `output_dir/chunk_NNNN.wav`
    ///
    /// This operation:
    /// - Validates input and creates the output directory
    /// - Aborts before any synthesis if the backend is unhealthy
    /// - Runs at most `workers` synthesis calls at a time
    /// - Attempts every chunk once and reports all failures together
    async fn process_batch(
        &self,
        chunks: &[String],
        output_dir: &Path,
        cancel: CancellationToken,
    ) -> Result<(), ChunkProcessorError>;

    /// Read a JSON array of strings and process it as a batch
    async fn process_chunks_file(
        &self,
        chunks_file: &Path,
        output_dir: &Path,
        cancel: CancellationToken,
    ) -> Result<(), ChunkProcessorError>;

    /// Synthesize one text into `output_path`, returning the bytes written
    async fn process_single_chunk(
        &self,
        text: &str,
        output_path: &Path,
        cancel: CancellationToken,
    ) -> Result<usize, ChunkProcessorError>;
}

#[async_trait]
impl ChunkProcessorApi for ChunkProcessor {
    async fn check_health(&self) -> Result<(), ChunkProcessorError> {
        self.tts_repo
            .health_check(self.settings.health_check_timeout)
            .await
            .map_err(ChunkProcessorError::Unhealthy)
    }

    async fn process_batch(
        &self,
        chunks: &[String],
        output_dir: &Path,
        cancel: CancellationToken,
    ) -> Result<(), ChunkProcessorError> {
        if chunks.is_empty() {
            return Err(ChunkProcessorError::Invalid(
                "no chunks to process".to_string(),
            ));
        }
        if output_dir.as_os_str().is_empty() {
            return Err(ChunkProcessorError::Invalid(
                "output directory cannot be empty".to_string(),
            ));
        }

        create_output_dir(output_dir).await?;

        let health = tokio::select! {
            _ = cancel.cancelled() => return Err(ChunkProcessorError::Cancelled),
            result = self.check_health() => result,
        };
        if let Err(e) = health {
            tracing::error!(error = %e, "Aborting batch, synthesis backend is unhealthy");
            return Err(e);
        }

        let total = chunks.len();
        tracing::info!(
            total = total,
            workers = self.settings.workers,
            output_dir = %output_dir.display(),
            "Processing chunks"
        );

        let slots = Arc::new(Semaphore::new(self.settings.workers.clamp(1, MAX_WORKERS)));
        let mut tasks = JoinSet::new();

        for (index, text) in chunks.iter().enumerate() {
            let processor = self.clone();
            let slots = slots.clone();
            let cancel = cancel.clone();
            let text = text.clone();
            let output_path = chunk_output_path(output_dir, index);

            tasks.spawn(async move {
                let _permit = tokio::select! {
                    _ = cancel.cancelled() => return (index, Err(ChunkProcessorError::Cancelled)),
                    permit = slots.acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => return (index, Err(ChunkProcessorError::Cancelled)),
                    },
                };

                let result = processor
                    .process_single_chunk(&text, &output_path, cancel)
                    .await;
                (index, result)
            });
        }

        let mut pending: BTreeSet<usize> = (0..total).collect();
        let mut failures = Vec::new();
        let mut cancelled = false;

        while let Some(joined) = tasks.join_next().await {
            let (index, result) = match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(error = %e, "Chunk task failed to complete");
                    continue;
                }
            };
            pending.remove(&index);

            match result {
                Ok(_) => {}
                Err(ChunkProcessorError::Cancelled) => cancelled = true,
                Err(error) => {
                    tracing::error!(
                        chunk = index + 1,
                        total = total,
                        error = %error,
                        "Failed to process chunk"
                    );
                    failures.push(ChunkFailure {
                        chunk: index + 1,
                        error,
                    });
                }
            }
        }

        failures.extend(pending.into_iter().map(|index| ChunkFailure {
            chunk: index + 1,
            error: ChunkProcessorError::Task("task panicked or was aborted".to_string()),
        }));

        if cancelled {
            tracing::warn!(
                total = total,
                failed = failures.len(),
                "Batch cancelled before all chunks completed"
            );
            return Err(ChunkProcessorError::Cancelled);
        }

        if !failures.is_empty() {
            return Err(BatchFailure::new(total, failures).into());
        }

        tracing::info!(total = total, "All chunks processed");
        Ok(())
    }

    async fn process_chunks_file(
        &self,
        chunks_file: &Path,
        output_dir: &Path,
        cancel: CancellationToken,
    ) -> Result<(), ChunkProcessorError> {
        let chunks = read_chunks_file(chunks_file).await?;

        tracing::info!(
            chunks_file = %chunks_file.display(),
            count = chunks.len(),
            "Loaded chunks"
        );

        self.process_batch(&chunks, output_dir, cancel).await
    }

    async fn process_single_chunk(
        &self,
        text: &str,
        output_path: &Path,
        cancel: CancellationToken,
    ) -> Result<usize, ChunkProcessorError> {
        if text.is_empty() {
            return Err(ChunkProcessorError::Invalid(
                "text cannot be empty".to_string(),
            ));
        }
        if output_path.as_os_str().is_empty() {
            return Err(ChunkProcessorError::Invalid(
                "output path cannot be empty".to_string(),
            ));
        }

        if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            create_output_dir(parent).await?;
        }

        let request = self.build_request(text);
        let timeout = self.settings.request_timeout;

        let audio = tokio::select! {
            _ = cancel.cancelled() => return Err(ChunkProcessorError::Cancelled),
            result = tokio::time::timeout(timeout, self.tts_repo.synthesize(&request)) => {
                result.map_err(|_| SynthesisError::Timeout(timeout))??
            }
        };

        write_audio(output_path, &audio).await?;

        tracing::info!(
            output = %output_path.display(),
            size_bytes = audio.len(),
            "Processed chunk"
        );

        Ok(audio.len())
    }
}

impl ChunkProcessor {
    fn build_request(&self, text: &str) -> SynthesisRequest {
        SynthesisRequest::new(text)
            .with_language(&self.settings.language)
            .with_temperature(self.settings.temperature)
            .with_speaker_ref_path(self.settings.speaker_ref_path.clone())
    }
}

async fn create_output_dir(dir: &Path) -> Result<(), ChunkProcessorError> {
    let mut builder = tokio::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(OUTPUT_DIR_MODE);

    builder
        .create(dir)
        .await
        .map_err(|source| ChunkProcessorError::OutputDirectory {
            path: dir.to_path_buf(),
            source,
        })
}

async fn write_audio(path: &Path, audio: &[u8]) -> Result<(), ChunkProcessorError> {
    let write_err = |source| ChunkProcessorError::Write {
        path: path.to_path_buf(),
        source,
    };

    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(OUTPUT_FILE_MODE);

    let mut file = options.open(path).await.map_err(write_err)?;
    // open() only applies the mode to new files
    #[cfg(unix)]
    file.set_permissions(std::fs::Permissions::from_mode(OUTPUT_FILE_MODE))
        .await
        .map_err(write_err)?;
    file.write_all(audio).await.map_err(write_err)?;
    file.flush().await.map_err(write_err)?;
    Ok(())
}
