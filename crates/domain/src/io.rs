use serde::{Deserialize, Serialize};

use crate::{error::DomainError, tempo::SampleBuffer, TempoError, TempoResult};

/// Tempo request as it crosses the worker boundary.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TempoRequest {
    pub channel_data: Vec<f32>,
    pub sample_rate: u32,
}

impl TempoRequest {
    pub fn new(channel_data: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            channel_data,
            sample_rate,
        }
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, DomainError> {
        serde_json::from_slice(bytes).map_err(|err| DomainError::Serialization(err.to_string()))
    }

    pub fn into_buffer(self) -> Result<SampleBuffer, TempoError> {
        SampleBuffer::new(self.channel_data, self.sample_rate)
    }
}

impl From<SampleBuffer> for TempoRequest {
    fn from(buffer: SampleBuffer) -> Self {
        let sample_rate = buffer.sample_rate();
        Self::new(buffer.into_samples(), sample_rate)
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NoBeatsDetected,
    InvalidInput,
    /// The audio never reached the engine.
    Decode,
    Internal,
}

impl From<&TempoError> for ErrorKind {
    fn from(error: &TempoError) -> Self {
        match error {
            TempoError::NoBeatsDetected => ErrorKind::NoBeatsDetected,
            TempoError::InvalidInput(_) => ErrorKind::InvalidInput,
        }
    }
}

/// Exactly one of these is produced per request.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TempoResponse {
    Success {
        bpm: u32,
    },
    Error {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        kind: Option<ErrorKind>,
    },
}

impl TempoResponse {
    pub fn internal<T: Into<String>>(message: T) -> Self {
        TempoResponse::Error {
            message: message.into(),
            kind: Some(ErrorKind::Internal),
        }
    }

    pub fn decode_failure<T: Into<String>>(message: T) -> Self {
        TempoResponse::Error {
            message: message.into(),
            kind: Some(ErrorKind::Decode),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TempoResponse::Success { .. })
    }

    pub fn bpm(&self) -> Option<u32> {
        match self {
            TempoResponse::Success { bpm } => Some(*bpm),
            TempoResponse::Error { .. } => None,
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            TempoResponse::Success { .. } => None,
            TempoResponse::Error { kind, .. } => *kind,
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>, DomainError> {
        serde_json::to_vec(self).map_err(|err| DomainError::Serialization(err.to_string()))
    }
}

impl From<TempoResult> for TempoResponse {
    fn from(result: TempoResult) -> Self {
        match result {
            Ok(bpm) => TempoResponse::Success { bpm },
            Err(error) => TempoResponse::Error {
                message: format!("Calculation failed: {error}"),
                kind: Some(ErrorKind::from(&error)),
            },
        }
    }
}
