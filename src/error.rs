use std::process::ExitCode;

/// Main application error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("TTS service is not healthy: {0}")]
    Unhealthy(String),

    #[error("Processing failed: {0}")]
    Processing(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::InvalidInput(_) => 2,
            Self::Config(_) => 78,
            Self::Unhealthy(_) => 69,
            Self::Cancelled => 130,
            Self::Processing(_) | Self::Internal(_) => 1,
        }
    }
}

impl From<AppError> for ExitCode {
    fn from(err: AppError) -> Self {
        ExitCode::from(err.exit_code())
    }
}

/// Custom result type for the application
pub type AppResult<T> = Result<T, AppError>;
