use super::tts_repository::TtsRepository;
use crate::domain::tts::{BackendErrorPayload, SynthesisError, SynthesisRequest};
use async_trait::async_trait;
use reqwest::{
    header::{ACCEPT, CONTENT_TYPE},
    Client, Response, StatusCode,
};
use serde::Serialize;
use std::time::Duration;

pub const GENERATE_SPEECH_PATH: &str = "/v1/generate/speech";
pub const HEALTH_PATH: &str = "/health";
pub const CONTENT_TYPE_WAV: &str = "audio/wav";

/// JSON body of `POST /v1/generate/speech`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateSpeechBody<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    speaker_ref_path: Option<&'a str>,
    language: &'a str,
    temperature: f64,
}

/// Client for the standalone TTS HTTP service
pub struct HttpTtsRepository {
    client: Client,
    base_url: String,
}

impl HttpTtsRepository {
    /// `base_url` includes scheme and port, e.g. `http://localhost:8000`.
    /// `timeout` bounds every request made by this client.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, SynthesisError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SynthesisError::transport("failed to build HTTP client", e))?;

        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn process_response(&self, response: Response) -> Result<Vec<u8>, SynthesisError> {
        if response.status() != StatusCode::OK {
            return Err(Self::parse_error_response(response).await);
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        if !is_wav_content_type(&content_type) {
            return Err(SynthesisError::UnexpectedContentType(content_type));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| SynthesisError::transport("failed to read audio data", e))?;

        if audio.is_empty() {
            return Err(SynthesisError::EmptyAudioResult);
        }

        Ok(audio.to_vec())
    }

    /// Decode a structured `{detail, errorCode}` error, falling back to the raw
    /// body so the diagnostic text is never lost.
    async fn parse_error_response(response: Response) -> SynthesisError {
        let status = response.status().to_string();

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return SynthesisError::transport("failed to read error response body", e),
        };

        match serde_json::from_str::<BackendErrorPayload>(&body) {
            Ok(payload) => SynthesisError::Backend {
                status,
                detail: payload.detail,
                error_code: payload.error_code,
            },
            Err(_) => SynthesisError::BackendRaw { status, body },
        }
    }
}

#[async_trait]
impl TtsRepository for HttpTtsRepository {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Vec<u8>, SynthesisError> {
        let request = request.clone().normalize()?;
        let start_time = std::time::Instant::now();

        let body = GenerateSpeechBody {
            text: &request.text,
            speaker_ref_path: request.speaker_ref_path.as_deref(),
            language: request.language_or_default(),
            temperature: request.temperature_or_default(),
        };
        let url = format!("{}{}", self.base_url, GENERATE_SPEECH_PATH);

        tracing::debug!(
            url = %url,
            language = body.language,
            temperature = body.temperature,
            text_length = request.text.len(),
            "Calling TTS service"
        );

        let response = self
            .client
            .post(&url)
            .header(ACCEPT, CONTENT_TYPE_WAV)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                SynthesisError::transport(
                    format!("failed to send request to TTS service at {}", self.base_url),
                    e,
                )
            })?;

        let audio = self.process_response(response).await?;

        tracing::debug!(
            provider = "http",
            latency_ms = start_time.elapsed().as_millis(),
            audio_size_bytes = audio.len(),
            "TTS synthesis completed"
        );

        Ok(audio)
    }

    async fn health_check(&self, timeout: Duration) -> Result<(), SynthesisError> {
        let url = format!("{}{}", self.base_url, HEALTH_PATH);

        let response = self
            .client
            .get(&url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                SynthesisError::transport(
                    format!("health check failed for service at {}", self.base_url),
                    e,
                )
            })?;

        if response.status() != StatusCode::OK {
            return Err(SynthesisError::Unhealthy(response.status().to_string()));
        }

        Ok(())
    }
}

/// Compares the media type only, so `audio/wav; codecs=1` is accepted.
fn is_wav_content_type(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(|essence| essence.trim().eq_ignore_ascii_case(CONTENT_TYPE_WAV))
        .unwrap_or(false)
}
