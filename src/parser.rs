//! Pluggable extraction of envelope data, metadata and errors.

use crate::{Error, Result};
use async_trait::async_trait;
use http::{HeaderMap, StatusCode};
use serde_json::Value;

/// Splits a parsed response body into envelope `data` and `meta`.
pub trait ResponseParser: Send + Sync {
    /// Extracts the resource payload.
    fn data(&self, body: &Value) -> Value;

    /// Extracts out-of-band metadata such as pagination totals.
    fn meta(&self, body: &Value) -> Option<Value>;
}

/// Reads `{ "data": ..., "meta": ... }` bodies, and treats any other body as
/// the payload itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultResponseParser;

impl ResponseParser for DefaultResponseParser {
    fn data(&self, body: &Value) -> Value {
        match body.get("data") {
            Some(data) if is_truthy(data) => data.clone(),
            _ => body.clone(),
        }
    }

    fn meta(&self, body: &Value) -> Option<Value> {
        match body.get("data") {
            Some(data) if is_truthy(data) => body.get("meta").cloned(),
            _ => None,
        }
    }
}

/// A response the backend rejected, handed to the [`ErrorParser`].
#[derive(Debug, Clone)]
pub struct FailedResponse {
    /// The HTTP status code.
    pub status: StatusCode,
    /// The reason phrase.
    pub status_text: String,
    /// Response headers.
    pub headers: HeaderMap,
    /// The raw response body.
    pub body: String,
    /// Number of dispatches made, the failing one included.
    pub attempts: usize,
}

impl FailedResponse {
    /// The body parsed as JSON, if it is JSON.
    pub fn json(&self) -> Option<Value> {
        serde_json::from_str(&self.body).ok()
    }
}

/// Turns a rejected response into the error reported to the caller.
///
/// `Ok(value)` makes the request fail with [`Error::Rejected`] carrying that
/// value; `Err(e)` makes it fail with `e` itself. Plain closures of type
/// `Fn(&FailedResponse) -> Result<Value>` implement this trait; implement it
/// directly for parsers that need to await.
///
/// # Examples
///
/// ```
/// use restline::{Client, Error, FailedResponse};
/// use serde_json::{json, Value};
///
/// # fn example() -> Result<(), Error> {
/// let client = Client::builder()
///     .base_url("https://api.example.com")?
///     .error_parser(|failed: &FailedResponse| -> restline::Result<Value> {
///         Ok(failed.json().unwrap_or_else(|| json!({ "status": failed.status.as_u16() })))
///     })
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait ErrorParser: Send + Sync {
    /// Parses the failed response.
    async fn parse(&self, failed: &FailedResponse) -> Result<Value>;
}

#[async_trait]
impl<F> ErrorParser for F
where
    F: Fn(&FailedResponse) -> Result<Value> + Send + Sync,
{
    async fn parse(&self, failed: &FailedResponse) -> Result<Value> {
        self(failed)
    }
}

/// Fails with [`Error::Http`] built from the status line and body.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultErrorParser;

#[async_trait]
impl ErrorParser for DefaultErrorParser {
    async fn parse(&self, failed: &FailedResponse) -> Result<Value> {
        Err(Error::Http {
            status: failed.status,
            status_text: failed.status_text.clone(),
            raw_response: failed.body.clone(),
            attempts: failed.attempts,
        })
    }
}

/// Converts the parser's outcome into the error the request fails with.
pub(crate) async fn rejection(parser: &dyn ErrorParser, failed: &FailedResponse) -> Error {
    match parser.parse(failed).await {
        Ok(value) => Error::Rejected(value),
        Err(err) => err,
    }
}

/// JavaScript-style truthiness, used by the backend's filter conventions.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
