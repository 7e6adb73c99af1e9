//! Error types for resource calls.
//!
//! Every failure path of a request ends in one [`Error`] value. Errors are
//! `Clone` because a single in-flight request may be shared by several callers,
//! and each of them receives the same outcome.

use http::StatusCode;
use serde_json::Value;
use std::sync::Arc;

/// The main error type for resource calls.
///
/// # Examples
///
/// ```no_run
/// use restline::{Client, Error, ListParams};
///
/// # async fn example() -> Result<(), Error> {
/// let client = Client::builder()
///     .base_url("https://api.example.com")?
///     .build()?;
///
/// match client.get_many("posts", ListParams::new()).await {
///     Ok(envelope) => println!("Posts: {}", envelope.data),
///     Err(Error::Http { status, status_text, .. }) => {
///         eprintln!("HTTP error {}: {}", status, status_text);
///     }
///     Err(Error::Cancelled) => eprintln!("Request was cancelled"),
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
    /// A network-level error raised by the reqwest transport (connection
    /// refused, DNS failure, broken body stream).
    #[error("Network error: {0}")]
    Network(Arc<reqwest::Error>),

    /// A custom transport failed before an HTTP exchange completed.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The request took longer than its timeout.
    #[error("Request timed out")]
    Timeout,

    /// The caller's cancellation token fired before the request settled.
    ///
    /// Never retried, and never produced by an HTTP status.
    #[error("Request was cancelled")]
    Cancelled,

    /// The backend answered with a non-2xx status that was not (or no longer)
    /// retried.
    ///
    /// This is what the default error parser produces. `attempts` counts every
    /// dispatch made for the request, including the failing one.
    #[error("HTTP error {}: {}", .status.as_u16(), .status_text)]
    Http {
        /// The HTTP status code
        status: StatusCode,
        /// The reason phrase reported by the transport
        status_text: String,
        /// The raw response body
        raw_response: String,
        /// Number of dispatches made
        attempts: usize,
    },

    /// A value produced by a custom error parser.
    #[error("Request rejected: {0}")]
    Rejected(Value),

    /// An error raised by a custom collaborator (error parser, token provider).
    #[error("{0}")]
    Message(String),

    /// A successful response body was not valid JSON.
    #[error("Failed to deserialize response (status {status}): {serde_error}")]
    DeserializationFailed {
        /// The raw response body that failed to deserialize
        raw_response: String,
        /// The serde error message
        serde_error: String,
        /// The HTTP status code
        status: StatusCode,
    },

    /// The request body could not be serialized for its content type.
    #[error("Failed to serialize request: {0}")]
    SerializationFailed(String),

    /// The cache capability failed.
    #[error("Cache error: {0}")]
    Cache(String),

    /// Invalid configuration was provided, such as a malformed header.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// An invalid URL was provided or built.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Timeout
        } else {
            Error::Network(Arc::new(err))
        }
    }
}

impl Error {
    /// Builds an [`Error::Message`] from anything printable.
    pub fn message(msg: impl Into<String>) -> Self {
        Error::Message(msg.into())
    }

    /// Returns `true` if this error carries a status the retry loop would
    /// retry, given attempts to spare.
    ///
    /// Transport-level failures are never retryable: retries only apply to
    /// completed HTTP exchanges.
    ///
    /// # Examples
    ///
    /// ```
    /// use restline::Error;
    /// use http::StatusCode;
    ///
    /// let err = Error::Http {
    ///     status: StatusCode::BAD_GATEWAY,
    ///     status_text: "Bad Gateway".to_string(),
    ///     raw_response: String::new(),
    ///     attempts: 3,
    /// };
    /// assert!(err.is_retryable());
    ///
    /// assert!(!Error::Timeout.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http { status, .. } => crate::retry::is_retryable_status(*status),
            _ => false,
        }
    }

    /// Returns `true` if the caller cancelled the request.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// Returns the HTTP status code if this error has one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Http { status, .. } => Some(*status),
            Error::DeserializationFailed { status, .. } => Some(*status),
            Error::Network(err) => err.status(),
            _ => None,
        }
    }

    /// Returns the raw response body if this error has one.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Error::Http { raw_response, .. } => Some(raw_response),
            Error::DeserializationFailed { raw_response, .. } => Some(raw_response),
            _ => None,
        }
    }
}

/// A specialized `Result` type for resource calls.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn http_error(status: StatusCode) -> Error {
        Error::Http {
            status,
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            raw_response: "oops".to_string(),
            attempts: 1,
        }
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(http_error(StatusCode::REQUEST_TIMEOUT).is_retryable());
        assert!(http_error(StatusCode::SERVICE_UNAVAILABLE).is_retryable());
        assert!(!http_error(StatusCode::NOT_FOUND).is_retryable());
        assert!(!http_error(StatusCode::NOT_IMPLEMENTED).is_retryable());
        assert!(!Error::Cancelled.is_retryable());
        assert!(!Error::Transport("reset".into()).is_retryable());
    }

    #[test]
    fn test_accessors() {
        let err = http_error(StatusCode::NOT_FOUND);
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
        assert_eq!(err.raw_response(), Some("oops"));
        assert_eq!(err.to_string(), "HTTP error 404: Not Found");

        let err = Error::Rejected(json!({"code": "E_GONE"}));
        assert_eq!(err.status(), None);
        assert!(err.to_string().contains("E_GONE"));

        assert!(Error::Cancelled.is_cancelled());
        assert_eq!(Error::message("bar").to_string(), "bar");
    }
}
