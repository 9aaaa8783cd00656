use crate::error::AppError;
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const PROJECT_FILE_NAME: &str = "project.toml";

/// Upper bound for `tts.workers`
pub const MAX_WORKERS: usize = 1024;

const VALID_QUALITIES: &[&str] = &["fast", "balanced", "high"];
const VALID_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no project.toml found in {} or any parent directory", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub tts: TtsConfig,
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
    #[serde(default)]
    pub object_store: ObjectStoreConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub output_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    pub log_dir: PathBuf,
    pub file_logging: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            log_dir: PathBuf::from("logs"),
            file_logging: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Http,
    Subprocess,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    pub transport: Transport,
    /// Full base URL; takes precedence over host and port when set.
    pub service_url: Option<String>,
    pub service_host: String,
    pub service_port: u16,
    pub workers: usize,
    pub timeout_seconds: u64,
    pub temperature: f64,
    pub language: String,
    pub quality: String,
    pub speaker_ref_path: Option<String>,
    pub subprocess: SubprocessConfig,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            transport: Transport::Http,
            service_url: None,
            service_host: "localhost".to_string(),
            service_port: 8000,
            workers: 2,
            timeout_seconds: 300,
            temperature: 0.75,
            language: "en".to_string(),
            quality: "balanced".to_string(),
            speaker_ref_path: None,
            subprocess: SubprocessConfig::default(),
        }
    }
}

/// Settings for the local executable transport.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SubprocessConfig {
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

impl Default for SubprocessConfig {
    fn default() -> Self {
        Self {
            binary: "chatllm".to_string(),
            model_path: PathBuf::new(),
            snac_model_path: PathBuf::new(),
            voice: "default".to_string(),
            seed: 0,
            ngl: 0,
            top_p: 0.9,
            top_k: None,
            repetition_penalty: 1.1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    pub subject: String,
    pub reply_subject: String,
    pub handle_timeout_seconds: u64,
    pub allowed_voices: Vec<String>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            subject: "text.processed".to_string(),
            reply_subject: "audio.chunk.created".to_string(),
            handle_timeout_seconds: 30,
            allowed_voices: vec![
                "default".to_string(),
                "male1".to_string(),
                "female1".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ObjectStoreKind {
    Memory,
    Filesystem,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObjectStoreConfig {
    pub kind: ObjectStoreKind,
    pub root: PathBuf,
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        Self {
            kind: ObjectStoreKind::Filesystem,
            root: PathBuf::from("objects"),
        }
    }
}

impl Config {
    /// Load `project.toml` from `path`, or search for it upwards from the
    /// current directory. Returns the config and the project root.
    pub fn load(path: Option<&Path>) -> Result<(Self, PathBuf), ConfigError> {
        dotenvy::dotenv().ok();

        let file = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let cwd = env::current_dir().map_err(|source| ConfigError::Io {
                    path: PathBuf::from("."),
                    source,
                })?;
                find_project_file(&cwd)?
            }
        };

        let contents = std::fs::read_to_string(&file).map_err(|source| ConfigError::Io {
            path: file.clone(),
            source,
        })?;

        let project_root = file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let mut config = Self::from_toml_str(&contents)?;
        config.apply_overrides(|key| env::var(key).ok())?;
        config.resolve_paths(&project_root);
        config.validate()?;

        tracing::debug!(config_file = %file.display(), "Configuration loaded");

        Ok((config, project_root))
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Environment overrides for the settings most often changed per deployment.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("TTS_SERVICE_URL") {
            self.tts.service_url = Some(url);
        }
        if let Some(workers) = lookup("TTS_WORKERS") {
            self.tts.workers = workers
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("TTS_WORKERS is not a number: {workers}")))?;
        }
        if let Some(timeout) = lookup("TTS_TIMEOUT_SECONDS") {
            self.tts.timeout_seconds = timeout.parse().map_err(|_| {
                ConfigError::Invalid(format!("TTS_TIMEOUT_SECONDS is not a number: {timeout}"))
            })?;
        }
        if let Some(format) = lookup("LOG_FORMAT") {
            self.logging.format = match format.to_lowercase().as_str() {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            };
        }
        Ok(())
    }

    pub fn resolve_paths(&mut self, project_root: &Path) {
        resolve(&mut self.paths.output_dir, project_root);
        resolve(&mut self.logging.log_dir, project_root);
        resolve(&mut self.object_store.root, project_root);
        resolve(&mut self.tts.subprocess.model_path, project_root);
        resolve(&mut self.tts.subprocess.snac_model_path, project_root);
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tts.validate()?;
        self.logging.validate()?;
        self.dispatcher.validate()?;

        if self.paths.output_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("paths.output_dir cannot be empty".to_string()));
        }

        Ok(())
    }

    /// Create the output and log directories if they don't exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        let mut dirs = vec![&self.paths.output_dir, &self.logging.log_dir];
        if self.object_store.kind == ObjectStoreKind::Filesystem {
            dirs.push(&self.object_store.root);
        }

        for dir in dirs {
            std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
                path: dir.clone(),
                source,
            })?;
        }

        Ok(())
    }
}

impl TtsConfig {
    pub fn service_url(&self) -> String {
        match &self.service_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("http://{}:{}", self.service_host, self.service_port),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::Invalid("tts.workers must be positive".to_string()));
        }
        if self.workers > MAX_WORKERS {
            return Err(ConfigError::Invalid(format!(
                "tts.workers cannot exceed {MAX_WORKERS}"
            )));
        }
        if self.timeout_seconds == 0 {
            return Err(ConfigError::Invalid(
                "tts.timeout_seconds must be positive".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::Invalid(
                "tts.temperature must be between 0 and 2".to_string(),
            ));
        }
        if !VALID_QUALITIES.contains(&self.quality.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "tts.quality must be one of: {}",
                VALID_QUALITIES.join(", ")
            )));
        }

        match self.transport {
            Transport::Http => {
                if self.service_url.is_none() {
                    if self.service_host.is_empty() {
                        return Err(ConfigError::Invalid(
                            "tts.service_host cannot be empty when using HTTP service".to_string(),
                        ));
                    }
                    if self.service_port == 0 {
                        return Err(ConfigError::Invalid(
                            "tts.service_port must be between 1 and 65535".to_string(),
                        ));
                    }
                }
            }
            Transport::Subprocess => {
                let sub = &self.subprocess;
                if sub.binary.is_empty() {
                    return Err(ConfigError::Invalid(
                        "tts.subprocess.binary cannot be empty".to_string(),
                    ));
                }
                if sub.model_path.as_os_str().is_empty() {
                    return Err(ConfigError::Invalid(
                        "tts.subprocess.model_path cannot be empty".to_string(),
                    ));
                }
                if sub.snac_model_path.as_os_str().is_empty() {
                    return Err(ConfigError::Invalid(
                        "tts.subprocess.snac_model_path cannot be empty".to_string(),
                    ));
                }
            }
        }

        Ok(())
    }
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !VALID_LEVELS.contains(&self.level.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "logging.level must be one of: {}",
                VALID_LEVELS.join(", ")
            )));
        }
        if self.file_logging && self.log_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("logging.log_dir cannot be empty".to_string()));
        }
        Ok(())
    }
}

impl DispatcherConfig {
    pub fn handle_timeout(&self) -> Duration {
        Duration::from_secs(self.handle_timeout_seconds)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.subject.is_empty() {
            return Err(ConfigError::Invalid("dispatcher.subject cannot be empty".to_string()));
        }
        if self.handle_timeout_seconds == 0 {
            return Err(ConfigError::Invalid(
                "dispatcher.handle_timeout_seconds must be positive".to_string(),
            ));
        }
        if self.allowed_voices.is_empty() {
            return Err(ConfigError::Invalid(
                "dispatcher.allowed_voices cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn resolve(path: &mut PathBuf, project_root: &Path) {
    if !path.as_os_str().is_empty() && path.is_relative() {
        *path = project_root.join(&*path);
    }
}

fn find_project_file(start: &Path) -> Result<PathBuf, ConfigError> {
    start
        .ancestors()
        .map(|dir| dir.join(PROJECT_FILE_NAME))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| ConfigError::NotFound(start.to_path_buf()))
}
