use crate::e2e::helpers;

use chrono::Utc;
use helpers::{TestContext, MOCK_AUDIO};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use test_context::test_context;
use tokio_util::sync::CancellationToken;
use tts_orchestrator::controllers::WorkerController;
use tts_orchestrator::domain::jobs::{
    AudioChunkCreatedEvent, DispatcherSettings, EventHeader, JobDispatcher, TextProcessedEvent,
};
use tts_orchestrator::infrastructure::config::Config;
use tts_orchestrator::infrastructure::messaging::{BusError, InMemoryMessageBus};
use tts_orchestrator::infrastructure::repositories::{InMemoryObjectStore, ObjectStore};

const SUBJECT: &str = "text.processed";

const WORKER_CONFIG: &str = r#"
[tts.subprocess]
model_path = "/models/orpheus.bin"
snac_model_path = "/models/snac.bin"
"#;

struct Worker {
    bus: Arc<InMemoryMessageBus>,
    store: Arc<InMemoryObjectStore>,
    cancel: CancellationToken,
    handle: tokio::task::JoinHandle<()>,
}

impl Worker {
    async fn start(ctx: &TestContext) -> Self {
        let bus = Arc::new(InMemoryMessageBus::new());
        let store = Arc::new(InMemoryObjectStore::new());
        let config = Config::from_toml_str(WORKER_CONFIG).unwrap();
        config.validate().unwrap();
        let dispatcher = Arc::new(JobDispatcher::new(
            store.clone(),
            ctx.repo.clone(),
            bus.clone(),
            DispatcherSettings::from_config(&config).unwrap(),
        ));

        let worker = WorkerController::new(bus.clone(), dispatcher, SUBJECT, 2);
        let cancel = CancellationToken::new();
        let run_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            worker.run(run_cancel).await.unwrap();
        });

        while bus.subscriber_count(SUBJECT).await == 0 {
            tokio::task::yield_now().await;
        }

        Self {
            bus,
            store,
            cancel,
            handle,
        }
    }

    async fn stop(self) {
        self.cancel.cancel();
        self.handle.await.unwrap();
    }
}

fn event(text_key: &str, voice: &str, page_number: u32) -> TextProcessedEvent {
    TextProcessedEvent {
        header: EventHeader {
            timestamp: Utc::now(),
            workflow_id: "workflow-42".to_string(),
            event_id: format!("event-{page_number}"),
            user_id: "user-1".to_string(),
            tenant_id: "tenant-1".to_string(),
        },
        text_key: text_key.to_string(),
        png_key: Some(format!("page-{page_number}.png")),
        page_number,
        total_pages: 2,
        voice: voice.to_string(),
        seed: 1234,
        ngl: 0,
        top_p: 0.95,
        repetition_penalty: 1.1,
        temperature: 0.6,
    }
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_reply_with_uploaded_audio_key(ctx: &TestContext) {
    let worker = Worker::start(ctx).await;
    worker
        .store
        .upload("page-1.txt", b"It was a bright cold day in April.")
        .await
        .unwrap();

    let request = event("page-1.txt", "female1", 1);
    let reply = worker
        .bus
        .request(
            SUBJECT,
            serde_json::to_vec(&request).unwrap(),
            Duration::from_secs(5),
        )
        .await
        .unwrap();

    let reply: AudioChunkCreatedEvent = serde_json::from_slice(&reply.payload).unwrap();
    assert_eq!(reply.header, request.header);
    assert_eq!((reply.page_number, reply.total_pages), (1, 2));
    assert!(reply.audio_key.ends_with(".wav"));
    assert_eq!(worker.store.download(&reply.audio_key).await.unwrap(), MOCK_AUDIO);

    let requests = ctx.backend.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].body["text"], "It was a bright cold day in April.");
    assert_eq!(requests[0].body["temperature"], 0.6);

    worker.stop().await;
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_not_reply_to_invalid_jobs(ctx: &TestContext) {
    let worker = Worker::start(ctx).await;
    worker.store.upload("page-1.txt", b"Some text").await.unwrap();

    let bad_voice = serde_json::to_vec(&event("page-1.txt", "robot", 1)).unwrap();
    let missing_text = serde_json::to_vec(&event("missing.txt", "default", 2)).unwrap();
    let malformed = b"{\"header\": 1}".to_vec();

    for payload in [bad_voice, missing_text, malformed] {
        let err = worker
            .bus
            .request(SUBJECT, payload, Duration::from_millis(300))
            .await
            .unwrap_err();
        assert!(matches!(err, BusError::Timeout(_)));
    }

    assert_eq!(ctx.backend.speech_calls(), 0);
    assert_eq!(worker.store.len().await, 1);

    worker.stop().await;
}

#[test]
fn it_should_refuse_worker_config_without_model_paths() {
    let config = Config::from_toml_str("").unwrap();
    assert!(config.validate().is_ok());

    let err = DispatcherSettings::from_config(&config).unwrap_err();
    assert!(err.to_string().contains("model_path is required"));
}
