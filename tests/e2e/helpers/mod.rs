use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use test_context::AsyncTestContext;
use tts_orchestrator::domain::tts::{ChunkProcessor, ProcessorSettings};
use tts_orchestrator::infrastructure::repositories::HttpTtsRepository;

pub mod assertions;

pub use mock_backend::{MockBackend, SpeechReply, MOCK_AUDIO};

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

pub struct TestContext {
    pub backend: MockBackend,
    pub repo: Arc<HttpTtsRepository>,
    pub scratch: TempDir,
}

impl AsyncTestContext for TestContext {
    fn setup() -> impl std::future::Future<Output = Self> + Send {
        async {
            let backend = MockBackend::start().await;
            let repo = Arc::new(
                HttpTtsRepository::new(backend.base_url.clone(), REQUEST_TIMEOUT)
                    .expect("Failed to build HTTP repository"),
            );
            let scratch = tempfile::tempdir().expect("Failed to create scratch directory");

            Self {
                backend,
                repo,
                scratch,
            }
        }
    }

    fn teardown(mut self) -> impl std::future::Future<Output = ()> + Send {
        async move {
            self.backend.shutdown();
        }
    }
}

impl TestContext {
    pub fn processor(&self, workers: usize) -> ChunkProcessor {
        self.processor_with(ProcessorSettings {
            workers,
            request_timeout: REQUEST_TIMEOUT,
            ..ProcessorSettings::default()
        })
    }

    pub fn processor_with(&self, settings: ProcessorSettings) -> ChunkProcessor {
        ChunkProcessor::new(self.repo.clone(), settings)
    }

    pub fn output_dir(&self) -> std::path::PathBuf {
        self.scratch.path().join("output")
    }
}

pub fn texts(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
