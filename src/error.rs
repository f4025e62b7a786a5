//! Typed failures for every external boundary of the pipeline.
//!
//! Callers choose their fallback path by matching the variant, never by
//! looking at the message text.

use thiserror::Error;

/// Feed retrieval failure for a single source.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("feed request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("feed responded with HTTP {0}")]
    Status(u16),
}

/// Failure of the analysis or translation language service.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("language service request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("language service responded with HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("language service returned an unreadable payload: {0}")]
    Decode(String),

    /// The service answered, but a required field was empty or missing.
    #[error("incomplete result: {0}")]
    Incomplete(String),
}

/// Persistence failure of the topic or cooldown store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document not found: {0}")]
    NotFound(String),

    /// A conditional write lost against a concurrent writer.
    #[error("conditional write rejected for {0}")]
    Conflict(String),

    /// A filtered query needs an index the backend does not have.
    #[error("query on {path} requires an index")]
    MissingIndex { path: String },

    #[error("store request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("store responded with HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("could not decode {context}: {source}")]
    Decode {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Outbound channel send failure.
#[derive(Debug, Error)]
pub enum SendError {
    /// 4xx from the channel API: the request itself was rejected.
    #[error("channel rejected the message ({code}): {description}")]
    Client { code: u16, description: String },

    #[error("channel API failure ({code}): {description}")]
    Server { code: u16, description: String },

    #[error("channel request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("channel response malformed: {0}")]
    Malformed(String),
}

impl SendError {
    pub fn is_client_error(&self) -> bool {
        matches!(self, SendError::Client { .. })
    }
}

/// Missing or invalid deployment settings. Short-circuits a whole run.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}
