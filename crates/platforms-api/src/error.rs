//! Error types shared by all platform integrations.

use std::time::Duration;

use thiserror::Error;

/// Result type for provider operations.
pub type Result<T> = std::result::Result<T, ApiError>;

/// Errors a platform integration can surface to the monitoring core.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(String),

    #[error("unexpected HTTP status {status}")]
    HttpStatus { status: u16 },

    #[error("failed to parse provider response: {0}")]
    Parse(String),

    #[error("provider {provider} is not authorized")]
    Unauthorized { provider: String },

    #[error("channel not found: {channel}")]
    ChannelNotFound { channel: String },

    #[error("query timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("query was cancelled")]
    Cancelled,

    #[error("provider {provider} does not support {operation}")]
    NotSupported {
        provider: String,
        operation: &'static str,
    },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("{0}")]
    Other(String),
}

impl ApiError {
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn unauthorized(provider: impl Into<String>) -> Self {
        Self::Unauthorized {
            provider: provider.into(),
        }
    }

    pub fn not_supported(provider: impl Into<String>, operation: &'static str) -> Self {
        Self::NotSupported {
            provider: provider.into(),
            operation,
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Whether the error indicates the caller must (re-)authorize first.
    pub fn requires_authorization(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }
}
