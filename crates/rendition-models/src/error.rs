//! Model validation errors.

use thiserror::Error;

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Invalid video metadata: {0}")]
    InvalidMetadata(String),

    #[error("Unknown {kind} value: {value}")]
    UnknownVariant { kind: &'static str, value: String },
}

impl ModelError {
    pub fn invalid_metadata(msg: impl Into<String>) -> Self {
        Self::InvalidMetadata(msg.into())
    }

    pub fn unknown_variant(kind: &'static str, value: impl Into<String>) -> Self {
        Self::UnknownVariant {
            kind,
            value: value.into(),
        }
    }
}
