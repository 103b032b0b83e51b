//! Error types for the event bus

use thiserror::Error;

/// Result type alias for bus operations
pub type Result<T> = std::result::Result<T, BusError>;

/// Errors that can occur in bus operations
#[derive(Error, Debug)]
pub enum BusError {
    /// Operation referenced a topic that is not registered
    #[error("unknown topic: {0}")]
    InvalidTopic(String),

    /// Event lookup on a missing, purged, or never-stored key
    #[error("event not found: {topic}/{id}")]
    NotFound {
        /// Topic the lookup referenced
        topic: String,
        /// Event id the lookup referenced
        id: String,
    },

    /// Subscription pattern failed to compile
    #[error("invalid pattern {pattern:?}: {source}")]
    InvalidPattern {
        /// The offending pattern string
        pattern: String,
        /// Underlying compile error
        #[source]
        source: regex::Error,
    },

    /// A listener's processing capability failed before reporting
    #[error("listener failure: {0}")]
    Listener(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    /// I/O errors (configuration loading)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BusError {
    /// Create an invalid-topic error
    pub fn invalid_topic(topic: impl Into<String>) -> Self {
        Self::InvalidTopic(topic.into())
    }

    /// Create a not-found error
    pub fn not_found(topic: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            topic: topic.into(),
            id: id.into(),
        }
    }

    /// Create a listener failure error
    pub fn listener(msg: impl Into<String>) -> Self {
        Self::Listener(msg.into())
    }

    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}
