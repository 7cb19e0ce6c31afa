//! Huginn error types

use std::time::Duration;

/// Huginn error types
#[derive(Debug, thiserror::Error)]
pub enum HuginnError {
    // Upstream/network errors
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// A payload arrived but could not be understood (malformed listing, etc.).
    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("upstream request timed out after {0:?}")]
    Timeout(Duration),

    #[error("rate limited for source '{source_tag}', retry after {retry_after:?}")]
    RateLimited {
        source_tag: String,
        retry_after: Option<Duration>,
    },

    #[error("authentication failed: {0}")]
    Auth(String),

    // Topic errors
    #[error("invalid topic key: {0}")]
    InvalidTopic(String),

    #[error("topic not found: {0}")]
    TopicNotFound(String),

    #[error("no valid topic found after {attempts} attempts")]
    NoValidTopic { attempts: usize },

    // Delivery errors
    /// The queue for a topic is still empty after a refill attempt.
    #[error("no content available for topic '{topic}'")]
    ContentUnavailable { topic: String },

    // Data errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("persistence error: {0}")]
    Persistence(String),

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl HuginnError {
    /// Whether a caller may reasonably expect the same call to succeed later.
    ///
    /// Used by the topic resolver to decide whether a failed probe result may
    /// be cached: transient failures are never cached.
    pub fn is_transient(&self) -> bool {
        match self {
            HuginnError::Http(_) | HuginnError::Timeout(_) | HuginnError::RateLimited { .. } => {
                true
            }
            HuginnError::Api { status, .. } => *status == 429 || *status >= 500,
            HuginnError::Auth(_) => true,
            _ => false,
        }
    }

    /// The `retry_after` hint carried by a `RateLimited` error, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            HuginnError::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for HuginnError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            // reqwest does not expose the configured duration on the error
            HuginnError::Timeout(Duration::ZERO)
        } else if err.is_decode() {
            HuginnError::Upstream(err.to_string())
        } else {
            HuginnError::Http(err.to_string())
        }
    }
}

/// Result type alias for Huginn operations
pub type Result<T> = std::result::Result<T, HuginnError>;
