//! Error types for the FormVox guided-completion engine

use thiserror::Error;

/// Result type alias for voice operations
pub type VoiceResult<T> = Result<T, VoiceError>;

/// Errors that can occur while guiding a user through a form by voice
#[derive(Error, Debug)]
pub enum VoiceError {
    /// The platform has no speech engine of the requested kind. Fatal for the feature.
    #[error("Speech capability unavailable: {0}")]
    UnsupportedCapability(String),

    #[error("Recognition error: {0}")]
    Recognition(String),

    #[error("A recognition session is already active")]
    RecognitionBusy,

    #[error("No transcript within {0} ms")]
    ListenTimeout(u64),

    #[error("Could not interpret \"{transcript}\" for field {field}")]
    UnparseableInput { field: String, transcript: String },

    #[error("No option of field {field} matches \"{transcript}\"")]
    NoMatchFound { field: String, transcript: String },

    #[error("Gave up on field {field} after {attempts} attempts")]
    RetriesExhausted { field: String, attempts: u32 },

    /// The operation was superseded by a cancel or a newer request.
    #[error("Operation cancelled")]
    Cancelled,

    #[error("A guided session is in progress")]
    SessionActive,

    /// The synthesizer reported a playback failure.
    #[error("Synthesis error: {0}")]
    Synthesis(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Form definition error: {0}")]
    Form(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl VoiceError {
    /// Errors that the traversal recovers from by re-prompting the same field.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            VoiceError::UnparseableInput { .. } | VoiceError::NoMatchFound { .. }
        )
    }
}

impl From<config::ConfigError> for VoiceError {
    fn from(err: config::ConfigError) -> Self {
        VoiceError::Config(err.to_string())
    }
}

impl From<toml::de::Error> for VoiceError {
    fn from(err: toml::de::Error) -> Self {
        VoiceError::Form(err.to_string())
    }
}
