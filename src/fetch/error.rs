//! Remote fetch error types.

use thiserror::Error;

/// Result type for fetch operations.
pub type FetchResult<T> = Result<T, FetchError>;

/// Longest response body excerpt kept in an error.
const BODY_EXCERPT: usize = 2048;

/// Errors raised while reading a remote collection.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Every attempt timed out.
    #[error("request to {path} timed out after {attempts} attempt(s)")]
    Timeout {
        /// Collection path.
        path: String,
        /// Attempts made, including the first.
        attempts: u32,
    },

    /// The request could not be sent or the response could not be read.
    #[error("request to {path} failed: {message}")]
    Transport {
        /// Collection path.
        path: String,
        /// Underlying error text.
        message: String,
    },

    /// The remote answered with a non-2xx status.
    #[error("request to {path} returned HTTP {status}: {body}")]
    Status {
        /// Collection path.
        path: String,
        /// HTTP status code.
        status: u16,
        /// Response body excerpt.
        body: String,
    },

    /// The response was not the JSON shape expected.
    #[error("malformed response from {path}: {reason}")]
    Malformed {
        /// Collection path.
        path: String,
        /// What was wrong.
        reason: String,
        /// Response body excerpt.
        body: String,
    },
}

impl FetchError {
    pub fn malformed(path: &str, reason: impl Into<String>, body: &str) -> Self {
        Self::Malformed {
            path: path.to_string(),
            reason: reason.into(),
            body: excerpt(body),
        }
    }

    pub fn status(path: &str, status: u16, body: &str) -> Self {
        Self::Status {
            path: path.to_string(),
            status,
            body: excerpt(body),
        }
    }

    /// Whether another attempt may succeed. Only timeouts are retried.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// The collection path the error concerns.
    pub fn path(&self) -> &str {
        match self {
            Self::Timeout { path, .. }
            | Self::Transport { path, .. }
            | Self::Status { path, .. }
            | Self::Malformed { path, .. } => path,
        }
    }

    /// The offending response body, when there was one.
    pub fn body(&self) -> Option<&str> {
        match self {
            Self::Status { body, .. } | Self::Malformed { body, .. } => Some(body),
            _ => None,
        }
    }
}

fn excerpt(body: &str) -> String {
    if body.len() <= BODY_EXCERPT {
        return body.to_string();
    }
    let mut end = BODY_EXCERPT;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}
