use super::error::DispatchError;
use super::events::{AudioChunkCreatedEvent, TextProcessedEvent};
use super::settings::JobSettings;
use crate::infrastructure::config::{Config, ConfigError};
use crate::infrastructure::messaging::{BusError, BusMessage, MessageBus};
use crate::infrastructure::repositories::{ObjectStore, TtsRepository};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub const DEFAULT_HANDLE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct DispatcherSettings {
    pub model_path: PathBuf,
    pub snac_model_path: PathBuf,
    pub allowed_voices: Vec<String>,
    /// Used when the inbound message carries no reply subject
    pub reply_subject: String,
    pub handle_timeout: Duration,
}

impl DispatcherSettings {
    /// Jobs carry no model paths, so the worker refuses to start without them
    /// whatever the transport.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let sub = &config.tts.subprocess;
        if sub.model_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "tts.subprocess.model_path is required to run the worker".to_string(),
            ));
        }
        if sub.snac_model_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "tts.subprocess.snac_model_path is required to run the worker".to_string(),
            ));
        }

        Ok(Self {
            model_path: sub.model_path.clone(),
            snac_model_path: sub.snac_model_path.clone(),
            allowed_voices: config.dispatcher.allowed_voices.clone(),
            reply_subject: config.dispatcher.reply_subject.clone(),
            handle_timeout: config.dispatcher.handle_timeout(),
        })
    }
}

pub struct JobDispatcher {
    store: Arc<dyn ObjectStore>,
    tts_repo: Arc<dyn TtsRepository>,
    bus: Arc<dyn MessageBus>,
    settings: DispatcherSettings,
}

impl JobDispatcher {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        tts_repo: Arc<dyn TtsRepository>,
        bus: Arc<dyn MessageBus>,
        settings: DispatcherSettings,
    ) -> Self {
        Self {
            store,
            tts_repo,
            bus,
            settings,
        }
    }
}

#[async_trait]
pub trait JobDispatcherApi: Send + Sync {
    /// Handle one inbound `TextProcessedEvent` message
    ///
    /// This operation:
    /// - Downloads the page text from the object store
    /// - Validates the synthesis settings carried by the event
    /// - Synthesizes and uploads the audio under a fresh `<uuid>.wav` key
    /// - Publishes an `AudioChunkCreatedEvent` reply
    ///
    /// Any failing stage ends handling of the message; no reply is published.
    async fn handle_message(
        &self,
        message: &BusMessage,
    ) -> Result<AudioChunkCreatedEvent, DispatchError>;
}

#[async_trait]
impl JobDispatcherApi for JobDispatcher {
    async fn handle_message(
        &self,
        message: &BusMessage,
    ) -> Result<AudioChunkCreatedEvent, DispatchError> {
        let event: TextProcessedEvent = match serde_json::from_slice(&message.payload) {
            Ok(event) => event,
            Err(e) => {
                tracing::error!(subject = %message.subject, error = %e, "Failed to parse event");
                return Err(e.into());
            }
        };

        let workflow_id = event.header.workflow_id.clone();
        let timeout = self.settings.handle_timeout;

        let result = match tokio::time::timeout(timeout, self.process(message, &event)).await {
            Ok(result) => result,
            Err(_) => Err(DispatchError::Timeout(timeout)),
        };

        match &result {
            Ok(reply) => tracing::info!(
                workflow_id = %workflow_id,
                page_number = reply.page_number,
                total_pages = reply.total_pages,
                audio_key = %reply.audio_key,
                "TTS job completed"
            ),
            Err(e) => tracing::error!(
                workflow_id = %workflow_id,
                page_number = event.page_number,
                error = %e,
                "Failed to process TTS job"
            ),
        }

        result
    }
}

impl JobDispatcher {
    async fn process(
        &self,
        message: &BusMessage,
        event: &TextProcessedEvent,
    ) -> Result<AudioChunkCreatedEvent, DispatchError> {
        let text_data = self
            .store
            .download(&event.text_key)
            .await
            .map_err(|source| DispatchError::Download {
                key: event.text_key.clone(),
                source,
            })?;
        let text = String::from_utf8(text_data)
            .map_err(|_| DispatchError::Encoding(event.text_key.clone()))?;

        let settings = JobSettings::from_event(
            event,
            self.settings.model_path.clone(),
            self.settings.snac_model_path.clone(),
        );
        settings.validate(&self.settings.allowed_voices)?;

        tracing::debug!(
            workflow_id = %event.header.workflow_id,
            text_key = %event.text_key,
            voice = %settings.voice,
            text_length = text.len(),
            "Synthesizing page"
        );

        let audio = self.tts_repo.synthesize(&settings.to_request(text)).await?;

        let audio_key = format!("{}.wav", Uuid::new_v4());
        self.store
            .upload(&audio_key, &audio)
            .await
            .map_err(|source| DispatchError::Upload {
                key: audio_key.clone(),
                source,
            })?;

        let reply = AudioChunkCreatedEvent::for_request(event, audio_key);
        let reply_subject = message
            .reply
            .as_deref()
            .unwrap_or(&self.settings.reply_subject);
        let payload = serde_json::to_vec(&reply).map_err(BusError::from)?;
        self.bus.publish(reply_subject, payload).await?;

        Ok(reply)
    }
}
