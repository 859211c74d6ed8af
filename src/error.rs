//! Error types for the Cervantes client
//!
//! Expected request failures are values, not panics: the HTTP pipeline and the
//! token manager return `Result<T, Error>` so callers can pattern-match on the
//! failure kind instead of relying on exception-style control flow.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for operations that can fail with a client error.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the Cervantes client.
#[derive(Debug, Error)]
pub enum Error {
    /// Transport-level failure (DNS, connection refused, abort).
    #[error("network error: {0}")]
    Network(String),

    /// The request exceeded its configured timeout.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Authentication or authorization failure (401/403).
    #[error("authentication failed (status {status}): {message}")]
    Authentication {
        /// HTTP status code that triggered the failure
        status: u16,
        /// Message from the server, if any
        message: String,
    },

    /// Client-fixable problem: a 400-class response, bad local input, or a
    /// response body that does not match the expected shape. Never retried.
    #[error("validation failed: {message}")]
    Validation {
        /// What failed validation
        message: String,
        /// Underlying cause (e.g. a deserialization error)
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Server-side failure (5xx). Retried while attempts remain.
    #[error("server error (status {status}): {message}")]
    Server {
        /// HTTP status code
        status: u16,
        /// Message from the server, if any
        message: String,
    },

    /// The operation requires an active session and none is held.
    #[error("no active session")]
    NotAuthenticated,

    /// A token refresh failed. Concurrent callers awaiting the same
    /// single-flight refresh all receive the same shared cause.
    #[error("token refresh failed")]
    Refresh(#[source] Arc<Error>),

    /// Durable token storage failed.
    #[error("token storage error: {0}")]
    Storage(String),

    /// Invalid URL provided.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Serialization/deserialization error for a request body.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP client configuration or initialization error.
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Other errors not covered by specific variants. Exists so downstream
    /// code can `?`-convert an `anyhow::Error` into this taxonomy.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Shape of an error body the Cervantes API may return. Only the status code
/// drives classification; the body just contributes the message.
#[derive(Debug, serde::Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl Error {
    /// Classify an HTTP failure response into the error taxonomy.
    ///
    /// 401/403 become [`Error::Authentication`], other 4xx become
    /// [`Error::Validation`], everything else is [`Error::Server`].
    pub fn from_response(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<ApiErrorBody>(body)
            .ok()
            .and_then(|b| b.message.or(b.error))
            .unwrap_or_else(|| body.trim().to_string());

        match status {
            401 | 403 => Error::Authentication { status, message },
            400..=499 => Error::Validation {
                message,
                source: None,
            },
            _ => Error::Server { status, message },
        }
    }

    /// Build a validation error from a local check (no HTTP involved).
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation {
            message: message.into(),
            source: None,
        }
    }

    /// Check if this error is retryable under the default retry predicate.
    ///
    /// Network faults and timeouts retry unconditionally, server errors retry
    /// while attempts remain, authentication and validation failures never do.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Network(_) | Error::Timeout(_) | Error::Server { .. }
        )
    }

    /// The HTTP status code attached to this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Authentication { status, .. } | Error::Server { status, .. } => Some(*status),
            _ => None,
        }
    }
}
