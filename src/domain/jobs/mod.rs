pub mod error;
pub mod events;
pub mod service;
pub mod settings;

pub use error::DispatchError;
pub use events::{AudioChunkCreatedEvent, EventHeader, TextProcessedEvent};
pub use service::{DispatcherSettings, JobDispatcher, JobDispatcherApi, DEFAULT_HANDLE_TIMEOUT};
pub use settings::{JobSettings, JobSettingsError};
