use crate::e2e::helpers;

use axum::http::StatusCode;
use helpers::{SpeechReply, TestContext, MOCK_AUDIO};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::time::Duration;
use test_context::test_context;
use tokio_util::sync::CancellationToken;
use tts_orchestrator::domain::tts::{
    ChunkProcessorApi, ChunkProcessorError, ProcessorSettings, SynthesisError, SynthesisRequest,
};
use tts_orchestrator::infrastructure::repositories::TtsRepository;

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_send_defaults_and_accept_header(ctx: &TestContext) {
    let audio = ctx
        .repo
        .synthesize(&SynthesisRequest::new("Hello world"))
        .await
        .unwrap();

    assert_eq!(audio, MOCK_AUDIO);

    let requests = ctx.backend.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].accept.as_deref(), Some("audio/wav"));
    assert_eq!(
        requests[0].body,
        json!({"text": "Hello world", "language": "en", "temperature": 0.75})
    );
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_send_speaker_reference_when_set(ctx: &TestContext) {
    let request = SynthesisRequest::new("Hola")
        .with_language("es")
        .with_temperature(0.5)
        .with_speaker_ref_path(Some("/voices/narrator.wav".to_string()));

    ctx.repo.synthesize(&request).await.unwrap();

    let body = &ctx.backend.requests()[0].body;
    assert_eq!(body["speakerRefPath"], "/voices/narrator.wav");
    assert_eq!(body["language"], "es");
    assert_eq!(body["temperature"], 0.5);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_reject_empty_text_without_calling_backend(ctx: &TestContext) {
    let err = ctx
        .repo
        .synthesize(&SynthesisRequest::new(""))
        .await
        .unwrap_err();
    assert!(matches!(err, SynthesisError::InvalidInput(_)));

    let path = ctx.output_dir().join("empty.wav");
    let err = ctx
        .processor(1)
        .process_single_chunk("", &path, CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ChunkProcessorError::Invalid(_)));

    assert_eq!(ctx.backend.speech_calls(), 0);
    assert!(!path.exists());
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_surface_structured_backend_errors(ctx: &TestContext) {
    ctx.backend.reply_with(SpeechReply::json_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({"detail": "Model failed to load", "errorCode": "MODEL_LOAD_ERROR"}),
    ));

    let err = ctx
        .repo
        .synthesize(&SynthesisRequest::new("Hello"))
        .await
        .unwrap_err();

    match &err {
        SynthesisError::Backend {
            detail, error_code, ..
        } => {
            assert_eq!(detail, "Model failed to load");
            assert_eq!(error_code.as_deref(), Some("MODEL_LOAD_ERROR"));
        }
        other => panic!("expected backend error, got {other:?}"),
    }
    let message = err.to_string();
    assert!(message.contains("Model failed to load"));
    assert!(message.contains("MODEL_LOAD_ERROR"));
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_fall_back_to_raw_error_body(ctx: &TestContext) {
    ctx.backend.reply_with(SpeechReply::Raw {
        status: StatusCode::BAD_GATEWAY,
        content_type: "text/plain",
        body: "upstream exploded".to_string(),
    });

    let err = ctx
        .repo
        .synthesize(&SynthesisRequest::new("Hello"))
        .await
        .unwrap_err();

    assert!(matches!(err, SynthesisError::BackendRaw { .. }));
    assert!(err.to_string().contains("upstream exploded"));
    assert!(err.to_string().contains("502"));
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_reject_non_wav_success(ctx: &TestContext) {
    ctx.backend.reply_with(SpeechReply::Raw {
        status: StatusCode::OK,
        content_type: "audio/mpeg",
        body: "ID3".to_string(),
    });

    let err = ctx
        .repo
        .synthesize(&SynthesisRequest::new("Hello"))
        .await
        .unwrap_err();

    assert!(matches!(err, SynthesisError::UnexpectedContentType(ref ct) if ct == "audio/mpeg"));
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_reject_empty_wav_success(ctx: &TestContext) {
    ctx.backend.reply_with(SpeechReply::Wav(Vec::new()));

    let err = ctx
        .repo
        .synthesize(&SynthesisRequest::new("Hello"))
        .await
        .unwrap_err();

    assert!(matches!(err, SynthesisError::EmptyAudioResult));
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_write_single_chunk_to_output_path(ctx: &TestContext) {
    let path = ctx.output_dir().join("nested").join("speech.wav");

    let written = ctx
        .processor(1)
        .process_single_chunk("Just one sentence.", &path, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(written, MOCK_AUDIO.len());
    assert_eq!(std::fs::read(&path).unwrap(), MOCK_AUDIO);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_time_out_slow_requests(ctx: &TestContext) {
    ctx.backend.set_delay(Duration::from_secs(10));
    let processor = ctx.processor_with(ProcessorSettings {
        request_timeout: Duration::from_millis(100),
        ..ProcessorSettings::default()
    });

    let started = std::time::Instant::now();
    let err = processor
        .process_single_chunk(
            "slow",
            &ctx.output_dir().join("slow.wav"),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ChunkProcessorError::Synthesis(SynthesisError::Timeout(_))
    ));
    assert!(started.elapsed() < Duration::from_secs(5));
}
