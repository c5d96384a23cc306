//! Error types shared by every stage of the action.
//!
//! Each variant corresponds to one category understood by the
//! [`ErrorHandler`](crate::recovery::ErrorHandler), which decides whether the
//! failure is retried, replayed with a fallback, skipped, regenerated or fatal.

use std::time::Duration;
use thiserror::Error;

/// Errors produced while detecting, generating, validating or publishing threads.
#[derive(Debug, Error)]
pub enum ActionError {
    /// A remote API answered with an error status.
    #[error("{service} API error ({status}): {message}")]
    Api {
        /// Name of the remote service (`openrouter`, `github`, `twitter`).
        service: &'static str,
        /// HTTP status code returned by the service.
        status: u16,
        /// Short, sanitized description of the failure.
        message: String,
        /// Whether repeating the same request may succeed.
        retryable: bool,
    },

    /// The service asked us to slow down.
    #[error("{service} rate limit exceeded")]
    RateLimit {
        service: &'static str,
        /// Delay requested by the server through `Retry-After` or reset headers.
        retry_after: Option<Duration>,
    },

    /// The request never produced an HTTP response.
    #[error("network error calling {service}: {message}")]
    Network {
        service: &'static str,
        message: String,
    },

    /// Credentials were rejected and could not be refreshed.
    #[error("{service} authentication failed: {message}")]
    Authentication {
        service: &'static str,
        message: String,
    },

    /// A generated thread failed validation.
    #[error("thread validation failed: {0}")]
    Validation(String),

    /// The model answered with content we could not use.
    #[error("unusable generated content: {0}")]
    Content(String),

    /// The action is misconfigured.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Reading or writing a local file failed.
    #[error("file error at {path}: {message}")]
    FileSystem { path: String, message: String },

    /// A git command failed.
    #[error("git error: {0}")]
    Git(String),

    /// The post has already been published.
    #[error("post '{0}' has already been posted")]
    Duplicate(String),
}

impl ActionError {
    /// Builds a [`ActionError::FileSystem`] from an I/O error.
    pub fn file(path: impl AsRef<std::path::Path>, err: impl std::fmt::Display) -> Self {
        ActionError::FileSystem {
            path: path.as_ref().display().to_string(),
            message: err.to_string(),
        }
    }

    /// Maps a transport-level `reqwest` failure to a [`ActionError::Network`].
    pub fn network(service: &'static str, err: reqwest::Error) -> Self {
        ActionError::Network {
            service,
            message: err.to_string(),
        }
    }

    /// Maps a non-success HTTP status to the matching error variant.
    ///
    /// 429 becomes a rate limit, 401/403 an authentication failure, 5xx a
    /// retryable API error and any other status a non-retryable API error.
    pub fn from_status(
        service: &'static str,
        status: u16,
        message: String,
        retry_after: Option<Duration>,
    ) -> Self {
        match status {
            429 => ActionError::RateLimit {
                service,
                retry_after,
            },
            401 | 403 => ActionError::Authentication { service, message },
            500..=599 => ActionError::Api {
                service,
                status,
                message,
                retryable: true,
            },
            _ => ActionError::Api {
                service,
                status,
                message,
                retryable: false,
            },
        }
    }

    /// Server-requested delay, if this error carries one.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ActionError::RateLimit { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ActionError {
    fn from(err: serde_json::Error) -> Self {
        ActionError::Content(format!("invalid JSON: {}", err))
    }
}

/// Parses a `Retry-After` header expressed in seconds.
pub(crate) fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}
