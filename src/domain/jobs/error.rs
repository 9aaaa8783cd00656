use super::settings::JobSettingsError;
use crate::domain::tts::SynthesisError;
use crate::infrastructure::messaging::BusError;
use crate::infrastructure::repositories::StoreError;
use std::time::Duration;

/// Failure of one dispatched message. Always terminal for that message.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("failed to parse event: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("failed to download text data for key '{key}': {source}")]
    Download {
        key: String,
        #[source]
        source: StoreError,
    },

    #[error("text data for key '{0}' is not valid UTF-8")]
    Encoding(String),

    #[error("invalid synthesis settings: {0}")]
    Settings(#[from] JobSettingsError),

    #[error("failed to process text to speech: {0}")]
    Synthesis(#[from] SynthesisError),

    #[error("failed to upload audio data for key '{key}': {source}")]
    Upload {
        key: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to publish reply event: {0}")]
    Publish(#[from] BusError),

    #[error("message handling timed out after {0:?}")]
    Timeout(Duration),
}
