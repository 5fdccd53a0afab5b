//! Application-wide error types.

use thiserror::Error;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Application-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("provider error: {0}")]
    Api(#[from] platforms_api::ApiError),

    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn unknown_provider(name: impl Into<String>) -> Self {
        Self::UnknownProvider(name.into())
    }
}
