use super::error::SynthesisError;
use serde::{Deserialize, Serialize};

pub const DEFAULT_TEMPERATURE: f64 = 0.75;
pub const DEFAULT_LANGUAGE: &str = "en";
pub const MIN_TEMPERATURE: f64 = 0.0;
pub const MAX_TEMPERATURE: f64 = 2.0;

/// Sampling knobs understood by the local executable transport.
/// Unset fields fall back to the transport's configured defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repetition_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpu_layers: Option<i32>,
}

/// One synthesis call. Built fresh for every unit of work.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SynthesisRequest {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker_ref_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub sampling: SamplingParams,
}

impl SynthesisRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = Some(voice.into());
        self
    }

    pub fn with_speaker_ref_path(mut self, path: Option<String>) -> Self {
        self.speaker_ref_path = path.filter(|p| !p.is_empty());
        self
    }

    pub fn with_sampling(mut self, sampling: SamplingParams) -> Self {
        self.sampling = sampling;
        self
    }

    /// Rejects empty text and out-of-range temperature, fills in the
    /// language and temperature defaults.
    pub fn normalize(mut self) -> Result<Self, SynthesisError> {
        if self.text.is_empty() {
            return Err(SynthesisError::InvalidInput(
                "text cannot be empty".to_string(),
            ));
        }

        let temperature = self.temperature.unwrap_or(DEFAULT_TEMPERATURE);
        if !(MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(&temperature) {
            return Err(SynthesisError::InvalidInput(format!(
                "temperature must be between {} and {}, got {}",
                MIN_TEMPERATURE, MAX_TEMPERATURE, temperature
            )));
        }
        self.temperature = Some(temperature);

        if self.language.as_deref().map_or(true, str::is_empty) {
            self.language = Some(DEFAULT_LANGUAGE.to_string());
        }

        Ok(self)
    }

    pub fn language_or_default(&self) -> &str {
        self.language.as_deref().unwrap_or(DEFAULT_LANGUAGE)
    }

    pub fn temperature_or_default(&self) -> f64 {
        self.temperature.unwrap_or(DEFAULT_TEMPERATURE)
    }
}

/// Structured error body returned by the synthesis service on non-200 responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendErrorPayload {
    pub detail: String,
    #[serde(rename = "errorCode", default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}
