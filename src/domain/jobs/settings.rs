use super::events::TextProcessedEvent;
use crate::domain::tts::{SamplingParams, SynthesisRequest};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum JobSettingsError {
    #[error("model path cannot be empty")]
    ModelPathEmpty,
    #[error("snac model path cannot be empty")]
    SnacModelPathEmpty,
    #[error("voice cannot be empty")]
    VoiceEmpty,
    #[error("unsupported voice: '{0}'")]
    UnsupportedVoice(String),
    #[error("top_p must be between 0.0 and 1.0: got {0}")]
    TopPRange(f64),
    #[error("repetition penalty must be >= 1.0: got {0}")]
    RepetitionPenaltyRange(f64),
    #[error("temperature must be >= 0.0: got {0}")]
    TemperatureRange(f64),
    #[error("n_gpu_layers must be non-negative: got {0}")]
    NglNegative(i32),
}

/// Synthesis settings for one job: event fields plus the worker's model paths.
#[derive(Debug, Clone, PartialEq)]
pub struct JobSettings {
    pub model_path: PathBuf,
    pub snac_model_path: PathBuf,
    pub voice: String,
    pub seed: i64,
    pub ngl: i32,
    pub top_p: f64,
    pub repetition_penalty: f64,
    pub temperature: f64,
}

impl JobSettings {
    pub fn from_event(
        event: &TextProcessedEvent,
        model_path: impl Into<PathBuf>,
        snac_model_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            model_path: model_path.into(),
            snac_model_path: snac_model_path.into(),
            voice: event.voice.clone(),
            seed: event.seed,
            ngl: event.ngl,
            top_p: event.top_p,
            repetition_penalty: event.repetition_penalty,
            temperature: event.temperature,
        }
    }

    pub fn validate(&self, allowed_voices: &[String]) -> Result<(), JobSettingsError> {
        if self.model_path.as_os_str().is_empty() {
            return Err(JobSettingsError::ModelPathEmpty);
        }
        if self.snac_model_path.as_os_str().is_empty() {
            return Err(JobSettingsError::SnacModelPathEmpty);
        }
        if self.voice.is_empty() {
            return Err(JobSettingsError::VoiceEmpty);
        }
        if !allowed_voices.iter().any(|v| v == &self.voice) {
            return Err(JobSettingsError::UnsupportedVoice(self.voice.clone()));
        }
        // NaN fails every range check below
        if !(0.0..=1.0).contains(&self.top_p) {
            return Err(JobSettingsError::TopPRange(self.top_p));
        }
        if !(self.repetition_penalty >= 1.0) {
            return Err(JobSettingsError::RepetitionPenaltyRange(
                self.repetition_penalty,
            ));
        }
        if !(self.temperature >= 0.0) {
            return Err(JobSettingsError::TemperatureRange(self.temperature));
        }
        if self.ngl < 0 {
            return Err(JobSettingsError::NglNegative(self.ngl));
        }
        Ok(())
    }

    pub fn to_request(&self, text: impl Into<String>) -> SynthesisRequest {
        SynthesisRequest::new(text)
            .with_voice(&self.voice)
            .with_temperature(self.temperature)
            .with_sampling(SamplingParams {
                top_p: Some(self.top_p),
                top_k: None,
                repetition_penalty: Some(self.repetition_penalty),
                seed: Some(self.seed),
                gpu_layers: Some(self.ngl),
            })
    }
}
