use thiserror::Error;

// Main Application Error Type

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration Error: {0}")]
    Config(String),
    #[error("Device Error: {0}")]
    Device(#[from] DeviceError),
    #[error("Analysis Error: {0}")]
    Analysis(#[from] AnalysisFailure),
    #[error("UI Error: {0}")]
    Ui(String),
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

// Camera / frame source errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("Camera access denied: {0}")]
    AccessDenied(String),
    #[error("The device produced no frame")]
    NoFrame,
    #[error("Failed to decode frame: {0}")]
    Decode(String),
}

// Completion cue output errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Audio output unavailable: {0}")]
pub struct AudioError(pub String);

/// A failed analysis round trip. The message is shown to the user as-is.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct AnalysisFailure {
    message: String,
}

impl AnalysisFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn no_response() -> Self {
        Self::new("No response from AI")
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<serde_json::Error> for AnalysisFailure {
    fn from(err: serde_json::Error) -> Self {
        AnalysisFailure::new(format!("Malformed analysis response: {}", err))
    }
}
