use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Correlation metadata carried unchanged from request to reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventHeader {
    pub timestamp: DateTime<Utc>,
    pub workflow_id: String,
    pub event_id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub tenant_id: String,
}

/// Inbound request: a page of text is ready in the object store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextProcessedEvent {
    pub header: EventHeader,
    pub text_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub png_key: Option<String>,
    pub page_number: u32,
    pub total_pages: u32,
    pub voice: String,
    pub seed: i64,
    pub ngl: i32,
    pub top_p: f64,
    pub repetition_penalty: f64,
    pub temperature: f64,
}

/// Reply published once the page audio has been uploaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioChunkCreatedEvent {
    pub header: EventHeader,
    pub audio_key: String,
    pub page_number: u32,
    pub total_pages: u32,
}

impl AudioChunkCreatedEvent {
    pub fn for_request(event: &TextProcessedEvent, audio_key: impl Into<String>) -> Self {
        Self {
            header: event.header.clone(),
            audio_key: audio_key.into(),
            page_number: event.page_number,
            total_pages: event.total_pages,
        }
    }
}
