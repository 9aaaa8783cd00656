#![cfg(unix)]

use pretty_assertions::assert_eq;
use serial_test::serial;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tts_orchestrator::domain::tts::{SamplingParams, SynthesisError, SynthesisRequest};
use tts_orchestrator::infrastructure::repositories::{
    SubprocessSettings, SubprocessTtsRepository, TtsRepository,
};

/// Fake TTS executable: records its arguments one per line and writes
/// `audio` to the path following `--tts_export`.
fn write_fake_binary(dir: &Path, audio: &str, exit_code: i32) -> PathBuf {
    let script = dir.join("fake-chatllm.sh");
    let args_file = dir.join("args.txt");
    let contents = format!(
        r#"#!/bin/sh
printf '%s\n' "$@" > "{args}"
out=""
while [ $# -gt 0 ]; do
  case "$1" in
    --tts_export) out="$2"; shift 2 ;;
    *) shift ;;
  esac
done
if [ {code} -ne 0 ]; then
  echo "model could not be loaded" >&2
  exit {code}
fi
printf '%s' "{audio}" > "$out"
"#,
        args = args_file.display(),
        code = exit_code,
        audio = audio,
    );

    std::fs::write(&script, contents).unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
    script
}

fn settings(dir: &TempDir, binary: &Path) -> SubprocessSettings {
    let model_path = dir.path().join("orpheus.gguf");
    let snac_model_path = dir.path().join("snac.gguf");
    std::fs::write(&model_path, b"model").unwrap();
    std::fs::write(&snac_model_path, b"snac").unwrap();

    SubprocessSettings {
        binary: binary.display().to_string(),
        model_path,
        snac_model_path,
        voice: "default".to_string(),
        seed: 100,
        ngl: 0,
        top_p: 0.9,
        top_k: None,
        repetition_penalty: 1.1,
    }
}

fn recorded_args(dir: &TempDir) -> Vec<String> {
    std::fs::read_to_string(dir.path().join("args.txt"))
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

#[tokio::test]
#[serial]
async fn it_should_pass_arguments_and_read_exported_audio() {
    let dir = tempfile::tempdir().unwrap();
    let binary = write_fake_binary(dir.path(), "RIFFfake", 0);
    let settings = settings(&dir, &binary);
    let repo = SubprocessTtsRepository::new(settings.clone());

    let request = SynthesisRequest::new("Hello there")
        .with_voice("male1")
        .with_temperature(0.5)
        .with_sampling(SamplingParams {
            seed: Some(7),
            gpu_layers: Some(4),
            ..SamplingParams::default()
        });

    let audio = repo.synthesize(&request).await.unwrap();
    assert_eq!(audio, b"RIFFfake");

    let args = recorded_args(&dir);
    let export_path = PathBuf::from(&args[7]);
    assert_eq!(
        args,
        vec![
            "-m".to_string(),
            settings.model_path.display().to_string(),
            "--snac_model".to_string(),
            settings.snac_model_path.display().to_string(),
            "-p".to_string(),
            "{male1}: Hello there".to_string(),
            "--tts_export".to_string(),
            export_path.display().to_string(),
            "--seed".to_string(),
            "7".to_string(),
            "-ngl".to_string(),
            "4".to_string(),
            "--top_p".to_string(),
            "0.90".to_string(),
            "--repetition_penalty".to_string(),
            "1.10".to_string(),
            "--temp".to_string(),
            "0.50".to_string(),
        ]
    );
    assert!(!export_path.exists(), "temp export file should be removed");
}

#[tokio::test]
#[serial]
async fn it_should_report_process_failure_output() {
    let dir = tempfile::tempdir().unwrap();
    let binary = write_fake_binary(dir.path(), "", 3);
    let repo = SubprocessTtsRepository::new(settings(&dir, &binary));

    let err = repo
        .synthesize(&SynthesisRequest::new("Hello"))
        .await
        .unwrap_err();

    assert!(matches!(err, SynthesisError::BackendRaw { .. }));
    assert!(err.to_string().contains("model could not be loaded"));
}

#[tokio::test]
#[serial]
async fn it_should_reject_empty_export() {
    let dir = tempfile::tempdir().unwrap();
    let binary = write_fake_binary(dir.path(), "", 0);
    let repo = SubprocessTtsRepository::new(settings(&dir, &binary));

    let err = repo
        .synthesize(&SynthesisRequest::new("Hello"))
        .await
        .unwrap_err();

    assert!(matches!(err, SynthesisError::EmptyAudioResult));
}

#[tokio::test]
#[serial]
async fn it_should_be_healthy_when_model_files_exist() {
    let dir = tempfile::tempdir().unwrap();
    let binary = write_fake_binary(dir.path(), "RIFF", 0);
    let settings = settings(&dir, &binary);

    let repo = SubprocessTtsRepository::new(settings.clone());
    repo.health_check(Duration::from_secs(1)).await.unwrap();

    std::fs::remove_file(&settings.snac_model_path).unwrap();
    let err = repo.health_check(Duration::from_secs(1)).await.unwrap_err();
    assert!(matches!(err, SynthesisError::Unhealthy(_)));
}
