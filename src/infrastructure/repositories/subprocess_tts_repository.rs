use super::tts_repository::TtsRepository;
use crate::domain::tts::{SynthesisError, SynthesisRequest};
use crate::infrastructure::config::TtsConfig;
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tempfile::TempPath;
use tokio::process::Command;

/// Defaults for the local executable; request fields override them.
#[derive(Debug, Clone)]
pub struct SubprocessSettings {
    pub binary: String,
    pub model_path: PathBuf,
    pub snac_model_path: PathBuf,
    pub voice: String,
    pub seed: i64,
    pub ngl: i32,
    pub top_p: f64,
    pub top_k: Option<u32>,
    pub repetition_penalty: f64,
}

impl SubprocessSettings {
    pub fn from_config(tts: &TtsConfig) -> Self {
        let sub = &tts.subprocess;
        Self {
            binary: sub.binary.clone(),
            model_path: sub.model_path.clone(),
            snac_model_path: sub.snac_model_path.clone(),
            voice: sub.voice.clone(),
            seed: sub.seed,
            ngl: sub.ngl,
            top_p: sub.top_p,
            top_k: sub.top_k,
            repetition_penalty: sub.repetition_penalty,
        }
    }
}

/// Runs a local TTS executable once per request. The executable writes its
/// WAV output to a temp file that is read back and removed.
pub struct SubprocessTtsRepository {
    settings: SubprocessSettings,
}

impl SubprocessTtsRepository {
    pub fn new(settings: SubprocessSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &SubprocessSettings {
        &self.settings
    }

    fn build_args(&self, request: &SynthesisRequest, export_path: &Path) -> Vec<OsString> {
        let s = &self.settings;
        let voice = request.voice.as_deref().unwrap_or(&s.voice);
        let sampling = &request.sampling;

        let mut args: Vec<OsString> = vec![
            "-m".into(),
            s.model_path.clone().into(),
            "--snac_model".into(),
            s.snac_model_path.clone().into(),
            "-p".into(),
            format!("{{{}}}: {}", voice, request.text).into(),
            "--tts_export".into(),
            export_path.into(),
            "--seed".into(),
            sampling.seed.unwrap_or(s.seed).to_string().into(),
            "-ngl".into(),
            sampling.gpu_layers.unwrap_or(s.ngl).to_string().into(),
            "--top_p".into(),
            format!("{:.2}", sampling.top_p.unwrap_or(s.top_p)).into(),
            "--repetition_penalty".into(),
            format!("{:.2}", sampling.repetition_penalty.unwrap_or(s.repetition_penalty)).into(),
            "--temp".into(),
            format!("{:.2}", request.temperature_or_default()).into(),
        ];

        if let Some(top_k) = sampling.top_k.or(s.top_k) {
            args.push("--top_k".into());
            args.push(top_k.to_string().into());
        }

        args
    }
}

#[async_trait]
impl TtsRepository for SubprocessTtsRepository {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Vec<u8>, SynthesisError> {
        let request = request.clone().normalize()?;
        let start_time = std::time::Instant::now();

        let export = ScopedTempFile::create()?;
        let args = self.build_args(&request, export.path());

        tracing::debug!(
            binary = %self.settings.binary,
            export_path = %export.path().display(),
            text_length = request.text.len(),
            "Invoking TTS executable"
        );

        let output = Command::new(&self.settings.binary)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                SynthesisError::transport(format!("failed to launch {}", self.settings.binary), e)
            })?;

        if !output.status.success() {
            let mut body = String::from_utf8_lossy(&output.stdout).into_owned();
            body.push_str(&String::from_utf8_lossy(&output.stderr));
            return Err(SynthesisError::BackendRaw {
                status: output.status.to_string(),
                body,
            });
        }

        let audio = tokio::fs::read(export.path())
            .await
            .map_err(|e| SynthesisError::transport("failed to read audio data from temp file", e))?;

        if audio.is_empty() {
            return Err(SynthesisError::EmptyAudioResult);
        }

        tracing::debug!(
            provider = "subprocess",
            latency_ms = start_time.elapsed().as_millis(),
            audio_size_bytes = audio.len(),
            "TTS synthesis completed"
        );

        Ok(audio)
    }

    async fn health_check(&self, timeout: Duration) -> Result<(), SynthesisError> {
        let s = &self.settings;
        let mut required = vec![s.model_path.clone(), s.snac_model_path.clone()];
        if s.binary.contains(std::path::MAIN_SEPARATOR) {
            required.push(PathBuf::from(&s.binary));
        }

        let probe = async {
            for path in &required {
                if tokio::fs::metadata(path).await.is_err() {
                    return Err(SynthesisError::Unhealthy(format!(
                        "required file not found: {}",
                        path.display()
                    )));
                }
            }
            Ok(())
        };

        tokio::time::timeout(timeout, probe)
            .await
            .map_err(|_| SynthesisError::Timeout(timeout))?
    }
}

/// Temp file removed on drop; a removal failure is logged, never raised.
struct ScopedTempFile {
    location: PathBuf,
    guard: Option<TempPath>,
}

impl ScopedTempFile {
    fn create() -> Result<Self, SynthesisError> {
        let file = tempfile::Builder::new()
            .prefix("tts-output-")
            .suffix(".wav")
            .tempfile()
            .map_err(|e| SynthesisError::transport("failed to create temp file for tts output", e))?;

        let guard = file.into_temp_path();
        Ok(Self {
            location: guard.to_path_buf(),
            guard: Some(guard),
        })
    }

    fn path(&self) -> &Path {
        &self.location
    }
}

impl Drop for ScopedTempFile {
    fn drop(&mut self) {
        if let Some(guard) = self.guard.take() {
            if let Err(e) = guard.close() {
                tracing::warn!(
                    path = %self.location.display(),
                    error = %e,
                    "Failed to remove temp file"
                );
            }
        }
    }
}
