//! Error types for the gremlin system
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for gremlin operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the gremlin system
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed duration token (user-correctable)
    #[error("Invalid duration: {0}")]
    InvalidDuration(String),

    /// Key-value store read/write/delete failure
    #[error("Store error: {0}")]
    Store(String),

    /// Feed source unreachable or returned something unreadable
    #[error("Feed source error ({source_name}): {message}")]
    SourceFetch {
        /// Source name
        source_name: String,
        /// Error message
        message: String,
    },

    /// Notification sink failure
    #[error("Notification error: {0}")]
    Notify(String),

    /// Duplicate giveaway entry
    #[error("Already joined: {0}")]
    AlreadyJoined(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP transport errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limiting errors
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an invalid duration error
    pub fn invalid_duration(msg: impl Into<String>) -> Self {
        Self::InvalidDuration(msg.into())
    }

    /// Create a store error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create a feed source error
    pub fn source_fetch(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SourceFetch {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Create a notification error
    pub fn notify(msg: impl Into<String>) -> Self {
        Self::Notify(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Whether the error is something the caller can fix by re-issuing the
    /// command differently
    pub fn is_user_correctable(&self) -> bool {
        matches!(
            self,
            Self::InvalidDuration(_) | Self::AlreadyJoined(_) | Self::InvalidInput(_)
        )
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
