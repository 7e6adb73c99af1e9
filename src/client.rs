//! The request orchestrator.
//!
//! [`Client::execute`] takes a [`RequestDescriptor`] through token and
//! content-type resolution, fingerprinting, the cache, in-flight
//! deduplication, dispatch and retries. Use [`ClientBuilder`] to configure
//! and create clients.

use crate::{
    auth::{NoToken, TokenProvider},
    cache::Cache,
    config::{self, ClientConfig},
    descriptor::{default_content_type, Body, ContentTypeResolver},
    key,
    parser::{self, DefaultErrorParser, DefaultResponseParser, ErrorParser, FailedResponse, ResponseParser},
    registry::{InFlightRegistry, Settlement},
    retry::RetryPolicy,
    transport::{HttpTransport, Transport, TransportRequest},
    Envelope, Error, RequestDescriptor, RequestFingerprint, Result,
};
use futures::FutureExt;
use http::{header, HeaderValue};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use url::Url;

/// A data provider for one REST backend.
///
/// Cloning a client is cheap; clones share the in-flight registry and the
/// cache. Separately built clients share nothing unless they were given the
/// same cache.
///
/// # Examples
///
/// ```no_run
/// use restline::{Client, Filters, ListParams, MemoryCache};
/// use serde_json::json;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), restline::Error> {
/// let client = Client::builder()
///     .base_url("https://jsonplaceholder.typicode.com")?
///     .timeout(Duration::from_secs(10))
///     .retries(4)
///     .cache(Arc::new(MemoryCache::new()))
///     .build()?;
///
/// let comments = client
///     .get_many("comments", ListParams::new().filters(Filters::new().with("postId", 1)))
///     .await?;
/// println!("Comments: {}", comments.data);
///
/// let created = client
///     .create_one("posts", json!({ "title": "foo", "body": "bar", "userId": 1 }))
///     .await?;
/// println!("Created: {}", created.data);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    pub(crate) inner: Arc<ClientInner>,
    pub(crate) cancel: Option<CancellationToken>,
}

pub(crate) struct ClientInner {
    pub(crate) base_url: Url,
    pub(crate) config: ClientConfig,
    retry_policy: RetryPolicy,
    transport: Arc<dyn Transport>,
    token_provider: Arc<dyn TokenProvider>,
    content_type: ContentTypeResolver,
    response_parser: Arc<dyn ResponseParser>,
    error_parser: Arc<dyn ErrorParser>,
    cache: Option<Arc<dyn Cache>>,
    registry: Arc<InFlightRegistry>,
}

impl Client {
    /// Creates a new `ClientBuilder` for configuring a client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Returns a handle whose resource operations carry `token`.
    ///
    /// The handle shares this client's registry and cache. Cancelling the
    /// token only abandons the calls made through the handle; a request that
    /// other callers joined keeps running for them.
    pub fn with_cancel(&self, token: CancellationToken) -> Client {
        Client {
            inner: Arc::clone(&self.inner),
            cancel: Some(token),
        }
    }

    /// The settings this client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Number of distinct requests currently in flight.
    pub fn in_flight(&self) -> usize {
        self.inner.registry.len()
    }

    /// Performs a request and normalizes its response.
    ///
    /// # Errors
    ///
    /// - [`Error::Cancelled`] if the descriptor's token fires first
    /// - transport failures ([`Error::Network`], [`Error::Timeout`],
    ///   [`Error::Transport`]), never retried
    /// - whatever the error parser makes of a rejected response, once the
    ///   retry budget is spent or the status is not retryable
    pub async fn execute(&self, descriptor: RequestDescriptor) -> Result<Envelope> {
        let cancel = descriptor.cancel.clone();
        if cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
            return Err(Error::Cancelled);
        }

        let descriptor = self.resolve(descriptor).await?;
        let fingerprint = key::derive(&descriptor)?;

        let body = match cancel {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        tracing::debug!(
                            method = %descriptor.method,
                            url = %descriptor.url,
                            "Request cancelled by caller"
                        );
                        return Err(Error::Cancelled);
                    }
                    body = self.fetch(descriptor.clone(), fingerprint) => body?,
                }
            }
            None => self.fetch(descriptor, fingerprint).await?,
        };

        Ok(self.envelope(&body))
    }

    /// Fills in the `Authorization` and `Content-Type` headers and the
    /// timeout. Headers the caller set explicitly win.
    async fn resolve(&self, mut descriptor: RequestDescriptor) -> Result<RequestDescriptor> {
        if !descriptor.headers.contains_key(header::AUTHORIZATION) {
            if let Some(token) = self.inner.token_provider.token().await? {
                let value = HeaderValue::try_from(format!("Bearer {}", token))
                    .map_err(|e| Error::ConfigurationError(format!("Invalid bearer token: {}", e)))?;
                descriptor.headers.insert(header::AUTHORIZATION, value);
            }
        }

        if !descriptor.headers.contains_key(header::CONTENT_TYPE) {
            if let Some(content_type) = (self.inner.content_type)(descriptor.body.as_ref()) {
                let value = HeaderValue::try_from(content_type)
                    .map_err(|e| Error::ConfigurationError(format!("Invalid content type: {}", e)))?;
                descriptor.headers.insert(header::CONTENT_TYPE, value);
            }
        }

        if descriptor.timeout.is_none() {
            descriptor.timeout = Some(self.inner.config.timeout());
        }

        Ok(descriptor)
    }

    /// Answers from the cache, or joins or starts the dispatch chain.
    async fn fetch(&self, descriptor: RequestDescriptor, fingerprint: RequestFingerprint) -> Result<Value> {
        if let Some(cache) = self.cacheable(&descriptor) {
            if cache.has(&fingerprint).await? {
                if let Some(body) = cache.get(&fingerprint).await? {
                    tracing::debug!(
                        method = %descriptor.method,
                        url = %descriptor.url,
                        fingerprint = %fingerprint,
                        "Serving response from cache"
                    );
                    return Ok(body);
                }
            }
        }

        let inner = Arc::clone(&self.inner);
        let operation = self.inner.registry.join_or_start(fingerprint, move |settlement| {
            dispatch(inner, descriptor, settlement).boxed()
        });
        operation.await
    }

    fn cacheable(&self, descriptor: &RequestDescriptor) -> Option<&Arc<dyn Cache>> {
        self.inner
            .cache
            .as_ref()
            .filter(|_| self.inner.config.is_cacheable(&descriptor.method))
    }

    fn envelope(&self, body: &Value) -> Envelope {
        Envelope {
            data: self.inner.response_parser.data(body),
            meta: self.inner.response_parser.meta(body),
        }
    }

    /// Builds `{base}/{segments}?{query}`. Each segment is percent-encoded
    /// on its own; `query` must already be encoded.
    pub(crate) fn url<'a>(&self, segments: impl IntoIterator<Item = &'a str>, query: &str) -> Result<Url> {
        let base = &self.inner.base_url;
        let mut url = base.clone();
        url.path_segments_mut()
            .map_err(|_| Error::ConfigurationError(format!("Base URL cannot take a path: {}", base)))?
            .pop_if_empty()
            .extend(segments);
        url.set_query(Some(query).filter(|q| !q.is_empty()));
        Ok(url)
    }
}

/// One logical request: dispatches until success, a final failure, or a
/// transport error. Owns the settlement, so the registry entry goes away with
/// it.
async fn dispatch(
    inner: Arc<ClientInner>,
    descriptor: RequestDescriptor,
    settlement: Settlement,
) -> Result<Value> {
    let policy = inner.retry_policy;
    let request = TransportRequest {
        method: descriptor.method.clone(),
        url: descriptor.url.clone(),
        headers: descriptor.headers.clone(),
        body: descriptor.encoded_body()?,
        timeout: descriptor.timeout.unwrap_or_else(|| inner.config.timeout()),
        cancel: settlement.cancel_token(),
    };

    let start_time = Instant::now();
    let mut state = policy.start();

    loop {
        let attempt = state.attempt(&policy);
        tracing::debug!(
            method = %request.method,
            url = %request.url,
            attempt = attempt,
            "Executing HTTP request"
        );

        let response = send(inner.transport.as_ref(), &request).await?;

        tracing::info!(
            status = response.status.as_u16(),
            latency_ms = start_time.elapsed().as_millis(),
            attempts = attempt,
            "Received HTTP response"
        );

        if response.is_success() {
            let body = if descriptor.discard_body {
                Value::Null
            } else {
                response.json()?
            };
            if let Some(cache) = inner.cache.as_ref().filter(|_| inner.config.is_cacheable(&request.method)) {
                cache.set(settlement.key(), body.clone()).await?;
            }
            return Ok(body);
        }

        if policy.should_retry(response.status, state.attempts_remaining) {
            tracing::warn!(
                status = response.status.as_u16(),
                attempt = attempt,
                delay_ms = state.backoff.as_millis(),
                "Retryable failure - retrying request after delay"
            );
            tokio::time::sleep(state.backoff).await;
            state.advance(&policy);
            continue;
        }

        if response.status.is_client_error() {
            tracing::error!(
                status = response.status.as_u16(),
                response = %response.body,
                "Client error (4xx)"
            );
        } else {
            tracing::warn!(
                status = response.status.as_u16(),
                attempts = attempt,
                response = %response.body,
                "Request failed"
            );
        }

        let failed = FailedResponse {
            status: response.status,
            status_text: response.status_text,
            headers: response.headers,
            body: response.body,
            attempts: attempt,
        };
        return Err(parser::rejection(inner.error_parser.as_ref(), &failed).await);
    }
}

/// Sends one attempt, bounded by the request timeout whatever the transport.
async fn send(transport: &dyn Transport, request: &TransportRequest) -> Result<crate::TransportResponse> {
    match tokio::time::timeout(request.timeout, transport.send(request)).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout),
    }
}

/// Builder for configuring and creating a [`Client`].
///
/// # Examples
///
/// ```no_run
/// use restline::{ClientBuilder, ClientConfig};
///
/// # fn example() -> Result<(), restline::Error> {
/// let config: ClientConfig = serde_json::from_str(r#"{ "retries": 5, "backoff_ms": 500 }"#)
///     .map_err(|e| restline::Error::ConfigurationError(e.to_string()))?;
///
/// let client = ClientBuilder::new()
///     .base_url("https://api.example.com")?
///     .config(config)
///     .token_provider(|| Some("s3cr3t".to_string()))
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    base_url: Option<Url>,
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
    token_provider: Arc<dyn TokenProvider>,
    content_type: ContentTypeResolver,
    response_parser: Arc<dyn ResponseParser>,
    error_parser: Arc<dyn ErrorParser>,
    cache: Option<Arc<dyn Cache>>,
}

impl ClientBuilder {
    /// Creates a new `ClientBuilder` with default settings.
    pub fn new() -> Self {
        Self {
            base_url: None,
            config: ClientConfig::default(),
            transport: None,
            token_provider: Arc::new(NoToken),
            content_type: default_content_type(),
            response_parser: Arc::new(DefaultResponseParser),
            error_parser: Arc::new(DefaultErrorParser),
            cache: None,
        }
    }

    /// Sets the backend's base URL. Resources live at `{base}/{resource}`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn base_url(mut self, url: impl AsRef<str>) -> Result<Self> {
        self.base_url = Some(Url::parse(url.as_ref())?);
        Ok(self)
    }

    /// Replaces all plain settings at once.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout_ms = config::millis(timeout);
        self
    }

    /// Sets the maximum number of dispatches per request.
    pub fn retries(mut self, retries: usize) -> Self {
        self.config.retries = retries;
        self
    }

    /// Sets the delay before the first retry.
    pub fn backoff(mut self, backoff: Duration) -> Self {
        self.config.backoff_ms = config::millis(backoff);
        self
    }

    /// Sends updates with `PUT` instead of `PATCH`.
    pub fn idempotent_updates(mut self, enabled: bool) -> Self {
        self.config.idempotent_updates = enabled;
        self
    }

    /// Sets the transport. Defaults to [`HttpTransport`].
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Sets the bearer token source.
    pub fn token_provider(mut self, provider: impl TokenProvider + 'static) -> Self {
        self.token_provider = Arc::new(provider);
        self
    }

    /// Sets the content-type resolver.
    pub fn content_type<F>(mut self, resolver: F) -> Self
    where
        F: Fn(Option<&Body>) -> Option<String> + Send + Sync + 'static,
    {
        self.content_type = Arc::new(resolver);
        self
    }

    /// Sets the parser that splits bodies into `data` and `meta`.
    pub fn response_parser(mut self, parser: impl ResponseParser + 'static) -> Self {
        self.response_parser = Arc::new(parser);
        self
    }

    /// Sets the parser for rejected responses.
    pub fn error_parser(mut self, parser: impl ErrorParser + 'static) -> Self {
        self.error_parser = Arc::new(parser);
        self
    }

    /// Enables caching of successful responses in `cache`.
    pub fn cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Builds the configured `Client`.
    ///
    /// # Errors
    ///
    /// Returns an error if no base URL was provided or if the default
    /// transport cannot be created.
    pub fn build(self) -> Result<Client> {
        let base_url = self
            .base_url
            .ok_or_else(|| Error::ConfigurationError("Base URL is required".to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::ConfigurationError(format!(
                "Base URL cannot take a path: {}",
                base_url
            )));
        }

        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(self.config.include_credentials)?),
        };

        Ok(Client {
            inner: Arc::new(ClientInner {
                base_url,
                retry_policy: self.config.retry_policy(),
                config: self.config,
                transport,
                token_provider: self.token_provider,
                content_type: self.content_type,
                response_parser: self.response_parser,
                error_parser: self.error_parser,
                cache: self.cache,
                registry: Arc::new(InFlightRegistry::new()),
            }),
            cancel: None,
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
