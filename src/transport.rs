//! The transport seam: how a resolved request reaches the network.
//!
//! [`HttpTransport`] is the reqwest-backed default. Tests and embedders can
//! plug in any other [`Transport`].

use crate::{Error, Result};
use async_trait::async_trait;
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// A request ready to be sent.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    /// The HTTP method.
    pub method: Method,
    /// The absolute URL.
    pub url: Url,
    /// Fully resolved headers.
    pub headers: HeaderMap,
    /// The encoded body.
    pub body: Option<String>,
    /// How long the exchange may take.
    pub timeout: Duration,
    /// Fires when nobody is waiting for the result any more.
    pub cancel: CancellationToken,
}

/// A completed HTTP exchange, with the body already read.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    /// The HTTP status code.
    pub status: StatusCode,
    /// The reason phrase.
    pub status_text: String,
    /// Response headers.
    pub headers: HeaderMap,
    /// The raw response body.
    pub body: String,
}

impl TransportResponse {
    /// Creates a response with the canonical reason phrase for `status`.
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Returns `true` for 2xx statuses.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Parses the body as JSON. An empty body reads as `null`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeserializationFailed`] when the body is not JSON.
    pub fn json(&self) -> Result<Value> {
        if self.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&self.body).map_err(|e| Error::DeserializationFailed {
            raw_response: self.body.clone(),
            serde_error: e.to_string(),
            status: self.status,
        })
    }
}

/// Sends resolved requests.
///
/// Implementations report a completed exchange as `Ok`, whatever its status,
/// and reserve `Err` for failures where no response arrived (network errors,
/// timeouts, cancellation).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Performs one HTTP exchange.
    async fn send(&self, request: &TransportRequest) -> Result<TransportResponse>;
}

/// The default transport, built on `reqwest`.
///
/// Adds `Accept: application/json` unless the request sets its own, and keeps
/// a cookie store so that credentials follow the session when
/// `include_credentials` is on.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http_client: reqwest::Client,
}

impl HttpTransport {
    /// Creates a transport around a fresh `reqwest::Client`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigurationError`] if the client cannot be built.
    pub fn new(include_credentials: bool) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .cookie_store(include_credentials)
            .build()
            .map_err(|e| Error::ConfigurationError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { http_client })
    }

    /// Wraps an existing `reqwest::Client`.
    pub fn from_client(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }

    async fn perform(&self, request: &TransportRequest) -> Result<TransportResponse> {
        let mut builder = self
            .http_client
            .request(request.method.clone(), request.url.clone())
            .timeout(request.timeout);

        let mut headers = request.headers.clone();
        if !headers.contains_key(http::header::ACCEPT) {
            headers.insert(http::header::ACCEPT, HeaderValue::from_static("application/json"));
        }
        builder = builder.headers(headers);

        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await?;

        Ok(TransportResponse {
            status,
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &TransportRequest) -> Result<TransportResponse> {
        tokio::select! {
            biased;
            _ = request.cancel.cancelled() => Err(Error::Cancelled),
            result = self.perform(request) => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_response_json() {
        let response = TransportResponse::new(StatusCode::OK, r#"{"id":1}"#);
        assert!(response.is_success());
        assert_eq!(response.status_text, "OK");
        assert_eq!(response.json().unwrap(), json!({"id": 1}));
    }

    #[test]
    fn test_empty_body_is_null() {
        let response = TransportResponse::new(StatusCode::NO_CONTENT, "  ");
        assert_eq!(response.json().unwrap(), Value::Null);
    }

    #[test]
    fn test_invalid_json() {
        let response = TransportResponse::new(StatusCode::OK, "OK");
        match response.json() {
            Err(Error::DeserializationFailed { raw_response, status, .. }) => {
                assert_eq!(raw_response, "OK");
                assert_eq!(status, StatusCode::OK);
            }
            other => panic!("Expected DeserializationFailed, got {:?}", other),
        }
    }
}
