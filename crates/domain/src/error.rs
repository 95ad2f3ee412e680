use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl DomainError {
    pub fn validation<T: Into<String>>(message: T) -> Self {
        Self::Validation(message.into())
    }
}

/// Failures produced by the tempo engine for a single request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TempoError {
    #[error("could not find any beats")]
    NoBeatsDetected,
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl TempoError {
    pub fn invalid_input<T: Into<String>>(message: T) -> Self {
        Self::InvalidInput(message.into())
    }
}
