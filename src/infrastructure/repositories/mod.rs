pub mod http_tts_repository;
pub mod object_store;
pub mod subprocess_tts_repository;
pub mod tts_repository;

pub use http_tts_repository::HttpTtsRepository;
pub use object_store::{FsObjectStore, InMemoryObjectStore, ObjectStore, StoreError};
pub use subprocess_tts_repository::{SubprocessSettings, SubprocessTtsRepository};
pub use tts_repository::TtsRepository;

use crate::domain::tts::SynthesisError;
use crate::infrastructure::config::{ObjectStoreConfig, ObjectStoreKind, Transport, TtsConfig};
use std::sync::Arc;

/// Build the synthesis transport selected by `tts.transport`
pub fn build_tts_repository(tts: &TtsConfig) -> Result<Arc<dyn TtsRepository>, SynthesisError> {
    let repo: Arc<dyn TtsRepository> = match tts.transport {
        Transport::Http => Arc::new(HttpTtsRepository::new(
            tts.service_url(),
            tts.request_timeout(),
        )?),
        Transport::Subprocess => Arc::new(SubprocessTtsRepository::new(
            SubprocessSettings::from_config(tts),
        )),
    };
    Ok(repo)
}

pub fn build_object_store(config: &ObjectStoreConfig) -> Arc<dyn ObjectStore> {
    match config.kind {
        ObjectStoreKind::Memory => Arc::new(InMemoryObjectStore::new()),
        ObjectStoreKind::Filesystem => Arc::new(FsObjectStore::new(config.root.clone())),
    }
}
