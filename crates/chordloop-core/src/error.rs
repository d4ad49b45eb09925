//! Error types for chordloop

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChordloopError {
    #[error("Invalid notation time: {0}")]
    InvalidNotation(String),
    #[error("Invalid pitch: {0}")]
    InvalidPitch(String),
    #[error("Invalid value for parameter {name}: {value}")]
    InvalidParam { name: String, value: String },
    #[error("Unknown parameter: {0}")]
    UnknownParam(String),
    #[error("Voice not found: {0}")]
    UnknownVoice(u64),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ChordloopError {
    pub(crate) fn invalid_param(name: &str, value: impl ToString) -> Self {
        Self::InvalidParam {
            name: name.to_string(),
            value: value.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ChordloopError>;
