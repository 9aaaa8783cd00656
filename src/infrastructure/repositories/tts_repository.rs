use crate::domain::tts::{SynthesisError, SynthesisRequest};
use async_trait::async_trait;
use std::time::Duration;

/// Repository for TTS synthesis operations.
/// Abstracts the underlying synthesis backend (standalone HTTP service or a
/// local executable).
///
/// Implementations are responsible for:
/// - Normalizing the request (defaults, empty text rejection)
/// - Performing exactly one outbound call per `synthesize`
/// - Validating the response shape before handing bytes back
#[async_trait]
pub trait TtsRepository: Send + Sync {
    /// Synthesize one request to WAV audio
    ///
    /// Returns non-empty raw audio bytes
    ///
    /// # Errors
    /// Returns error if the request is invalid, the backend is unreachable,
    /// rejects the request, or answers with something other than audio
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Vec<u8>, SynthesisError>;

    /// Lightweight readiness probe, bounded by `timeout`
    async fn health_check(&self, timeout: Duration) -> Result<(), SynthesisError>;
}
