pub mod jobs;
pub mod tts;
