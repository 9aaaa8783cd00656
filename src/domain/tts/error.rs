use crate::error::AppError;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Failure of a single call against the synthesis backend.
#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("transport error: {message}: {source}")]
    Transport {
        message: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("TTS service error ({status}): {detail} (code: {})", .error_code.as_deref().unwrap_or("none"))]
    Backend {
        status: String,
        detail: String,
        error_code: Option<String>,
    },

    #[error("TTS service returned non-OK status: {status}, body: {body}")]
    BackendRaw { status: String, body: String },

    #[error("unexpected content type: expected audio/wav, got {0}")]
    UnexpectedContentType(String),

    #[error("received empty audio data")]
    EmptyAudioResult,

    #[error("health check failed with status: {0}")]
    Unhealthy(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("request cancelled")]
    Cancelled,
}

impl SynthesisError {
    pub fn transport(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Transport {
            message: message.into(),
            source: Box::new(source),
        }
    }

    /// Network and deadline failures may succeed on a later attempt; contract
    /// violations and caller mistakes never will. Backend rejections are not
    /// inspected here.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Timeout(_))
    }
}

/// Errors raised by the chunk processor, for one chunk or a whole batch.
#[derive(Debug, thiserror::Error)]
pub enum ChunkProcessorError {
    #[error("invalid input: {0}")]
    Invalid(String),

    #[error("failed to create output directory {}: {source}", .path.display())]
    OutputDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read chunks from {}: {message}", .path.display())]
    ChunksFile { path: PathBuf, message: String },

    #[error("TTS service health check failed: {0}")]
    Unhealthy(#[source] SynthesisError),

    #[error("failed to generate speech: {0}")]
    Synthesis(#[from] SynthesisError),

    #[error("failed to write audio file {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("chunk task did not complete: {0}")]
    Task(String),

    #[error(transparent)]
    Batch(#[from] BatchFailure),

    #[error("processing cancelled")]
    Cancelled,
}

/// A chunk that failed inside a batch, identified by its 1-based position.
#[derive(Debug)]
pub struct ChunkFailure {
    pub chunk: usize,
    pub error: ChunkProcessorError,
}

/// Every failure of a batch run, sorted by chunk position.
#[derive(Debug)]
pub struct BatchFailure {
    pub total: usize,
    pub failures: Vec<ChunkFailure>,
}

impl BatchFailure {
    pub fn new(total: usize, mut failures: Vec<ChunkFailure>) -> Self {
        failures.sort_by_key(|f| f.chunk);
        Self { total, failures }
    }

    pub fn failed_chunks(&self) -> Vec<usize> {
        self.failures.iter().map(|f| f.chunk).collect()
    }
}

impl fmt::Display for BatchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} of {} chunks failed", self.failures.len(), self.total)?;
        for (i, failure) in self.failures.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{}chunk {} failed: {}", sep, failure.chunk, failure.error)?;
        }
        Ok(())
    }
}

impl std::error::Error for BatchFailure {}

impl From<ChunkProcessorError> for AppError {
    fn from(err: ChunkProcessorError) -> Self {
        match err {
            ChunkProcessorError::Invalid(msg) => AppError::InvalidInput(msg),
            ChunkProcessorError::ChunksFile { .. } => AppError::InvalidInput(err.to_string()),
            ChunkProcessorError::Unhealthy(_) => AppError::Unhealthy(err.to_string()),
            ChunkProcessorError::Synthesis(SynthesisError::InvalidInput(msg)) => {
                AppError::InvalidInput(msg)
            }
            ChunkProcessorError::Cancelled => AppError::Cancelled,
            other => AppError::Processing(other.to_string()),
        }
    }
}

impl From<SynthesisError> for AppError {
    fn from(err: SynthesisError) -> Self {
        match err {
            SynthesisError::InvalidInput(msg) => AppError::InvalidInput(msg),
            SynthesisError::Unhealthy(_) => AppError::Unhealthy(err.to_string()),
            SynthesisError::Transport { .. } => AppError::Internal(err.to_string()),
            SynthesisError::Cancelled => AppError::Cancelled,
            other => AppError::Processing(other.to_string()),
        }
    }
}
