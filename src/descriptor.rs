//! Request descriptors and body encoding.

use crate::{Error, Result};
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Content type used when the resolver is left at its default.
pub const DEFAULT_CONTENT_TYPE: &str = "application/json; charset=UTF-8";

/// Picks the `Content-Type` for a request given its body.
///
/// Returning `None` leaves the header off.
pub type ContentTypeResolver = Arc<dyn Fn(Option<&Body>) -> Option<String> + Send + Sync>;

/// The default resolver: every request is labelled as UTF-8 JSON.
pub fn default_content_type() -> ContentTypeResolver {
    Arc::new(|_body: Option<&Body>| Some(DEFAULT_CONTENT_TYPE.to_string()))
}

/// A request body before it is put on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// A structured body, serialized as JSON when the content type allows it.
    Json(Value),
    /// A body that is already encoded and is sent as-is.
    Text(String),
}

impl Body {
    /// Builds a JSON body from any serializable value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SerializationFailed`] if `value` cannot be represented
    /// as JSON.
    pub fn json<T: Serialize>(value: &T) -> Result<Self> {
        serde_json::to_value(value)
            .map(Body::Json)
            .map_err(|e| Error::SerializationFailed(e.to_string()))
    }

    /// Encodes the body for a request labelled with `content_type`.
    ///
    /// Structured bodies are stringified when the content type is absent,
    /// JSON, or text. Any other content type cannot carry them.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SerializationFailed`] for a structured body with a
    /// content type that is neither JSON nor text.
    pub fn encode(&self, content_type: Option<&str>) -> Result<String> {
        match self {
            Body::Text(text) => Ok(text.clone()),
            Body::Json(value) => {
                let stringify = match content_type {
                    None => true,
                    Some(ct) => {
                        let ct = ct.trim_start().to_ascii_lowercase();
                        ct.starts_with("application/json") || ct.starts_with("text/")
                    }
                };
                if !stringify {
                    return Err(Error::SerializationFailed(format!(
                        "cannot encode a JSON body as {}",
                        content_type.unwrap_or_default()
                    )));
                }
                serde_json::to_string(value).map_err(|e| Error::SerializationFailed(e.to_string()))
            }
        }
    }
}

impl From<Value> for Body {
    fn from(value: Value) -> Self {
        Body::Json(value)
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Text(text)
    }
}

/// Everything needed to perform one HTTP request.
///
/// Descriptors are built fresh for each call and handed to
/// [`Client::execute`](crate::Client::execute), which fills in the
/// `Authorization` and `Content-Type` headers and the timeout before
/// fingerprinting.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    /// The HTTP method.
    pub method: Method,

    /// The absolute request URL, query string included.
    pub url: Url,

    /// The request body, if any.
    pub body: Option<Body>,

    /// Request headers.
    pub headers: HeaderMap,

    /// Per-request timeout. `None` means the client's configured timeout.
    pub timeout: Option<Duration>,

    /// Token that abandons this caller's wait when cancelled.
    ///
    /// Not part of the request's identity.
    pub cancel: Option<CancellationToken>,

    /// When set, a successful response body is not parsed and the request
    /// resolves to `null`.
    pub discard_body: bool,
}

impl RequestDescriptor {
    /// Creates a descriptor with the given method and URL.
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            body: None,
            headers: HeaderMap::new(),
            timeout: None,
            cancel: None,
            discard_body: false,
        }
    }

    /// Adds a header to the request.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| Error::ConfigurationError(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| Error::ConfigurationError(format!("Invalid header value: {}", e)))?;
        self.headers.append(name, value);
        Ok(self)
    }

    /// Sets the request body.
    pub fn with_body(mut self, body: impl Into<Body>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Attaches a cancellation token.
    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Resolves to `null` on success without reading the body.
    pub fn discarding_body(mut self) -> Self {
        self.discard_body = true;
        self
    }

    /// The resolved content type, if the header is present and readable.
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }

    /// Encodes the body for the wire according to the resolved content type.
    pub fn encoded_body(&self) -> Result<Option<String>> {
        self.body
            .as_ref()
            .map(|body| body.encode(self.content_type()))
            .transpose()
    }
}
