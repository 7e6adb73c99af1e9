//! Client configuration.

use crate::retry::{RetryPolicy, DEFAULT_BASE_BACKOFF, DEFAULT_MAX_ATTEMPTS};
use http::Method;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Whole milliseconds in `duration`, saturating at `u64::MAX`.
pub(crate) fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Plain settings of a [`Client`](crate::Client), resolved once when the
/// client is built.
///
/// Every field has a default, so a partial document deserializes:
///
/// ```
/// use restline::ClientConfig;
///
/// let config: ClientConfig = serde_json::from_str(r#"{ "retries": 5 }"#).unwrap();
/// assert_eq!(config.retries, 5);
/// assert_eq!(config.timeout_ms, 5000);
/// assert_eq!(config.backoff_ms, 300);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Request timeout in milliseconds. Defaults to 5000.
    pub timeout_ms: u64,

    /// Maximum dispatches per request, the first one included. Defaults to 3.
    pub retries: usize,

    /// Delay before the first retry, in milliseconds. Doubles on each further
    /// retry. Defaults to 300.
    pub backoff_ms: u64,

    /// Send updates with `PUT` instead of `PATCH`. Defaults to `false`.
    pub idempotent_updates: bool,

    /// Keep cookies across requests made by the default transport. Defaults
    /// to `true`.
    pub include_credentials: bool,

    /// Methods whose successful responses are read from and written to the
    /// cache. Defaults to `GET` and `HEAD`.
    pub cacheable_methods: Vec<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout_ms: millis(DEFAULT_TIMEOUT),
            retries: DEFAULT_MAX_ATTEMPTS,
            backoff_ms: millis(DEFAULT_BASE_BACKOFF),
            idempotent_updates: false,
            include_credentials: true,
            cacheable_methods: vec![Method::GET.to_string(), Method::HEAD.to_string()],
        }
    }
}

impl ClientConfig {
    /// The request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// The retry policy these settings describe.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retries.max(1), Duration::from_millis(self.backoff_ms))
    }

    /// The method used by update operations.
    pub fn update_method(&self) -> Method {
        if self.idempotent_updates {
            Method::PUT
        } else {
            Method::PATCH
        }
    }

    /// Returns `true` if responses to `method` may be cached.
    pub fn is_cacheable(&self, method: &Method) -> bool {
        self.cacheable_methods
            .iter()
            .any(|m| m.eq_ignore_ascii_case(method.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(config.retry_policy(), RetryPolicy::default());
        assert_eq!(config.update_method(), Method::PATCH);
        assert!(config.is_cacheable(&Method::GET));
        assert!(!config.is_cacheable(&Method::POST));
    }

    #[test]
    fn test_overrides() {
        let config: ClientConfig = serde_json::from_str(
            r#"{ "idempotent_updates": true, "retries": 0, "cacheable_methods": ["get", "delete"] }"#,
        )
        .unwrap();
        assert_eq!(config.update_method(), Method::PUT);
        // At least one dispatch always happens.
        assert_eq!(config.retry_policy().max_attempts, 1);
        assert!(config.is_cacheable(&Method::DELETE));
        assert!(!config.is_cacheable(&Method::HEAD));
    }

    #[test]
    fn test_millis_saturates() {
        assert_eq!(millis(Duration::from_millis(1500)), 1500);
        assert_eq!(millis(Duration::MAX), u64::MAX);
    }
}
