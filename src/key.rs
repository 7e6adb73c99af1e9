//! Request fingerprints for caching and in-flight deduplication.

use crate::{RequestDescriptor, Result};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use std::fmt;

/// Deterministic identity of a resolved request.
///
/// Two descriptors that would put the same request on the wire share a
/// fingerprint, whatever order their headers were inserted in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestFingerprint(String);

impl RequestFingerprint {
    /// The fingerprint as a hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RequestFingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Derives the fingerprint of a descriptor.
///
/// The fingerprint covers the method, URL, headers, the body in its encoded
/// form, the timeout and the discard flag. The cancellation token never takes
/// part.
///
/// # Errors
///
/// Fails only if the body cannot be encoded for its content type.
pub fn derive(descriptor: &RequestDescriptor) -> Result<RequestFingerprint> {
    let mut names: Vec<_> = descriptor.headers.keys().collect();
    names.sort_by(|a, b| a.as_str().cmp(b.as_str()));

    let mut headers = Map::new();
    for name in names {
        let values: Vec<Value> = descriptor
            .headers
            .get_all(name)
            .iter()
            .map(|v| Value::String(String::from_utf8_lossy(v.as_bytes()).into_owned()))
            .collect();
        headers.insert(name.as_str().to_string(), Value::Array(values));
    }

    let canonical = json!({
        "method": descriptor.method.as_str(),
        "url": descriptor.url.as_str(),
        "headers": headers,
        "body": descriptor.encoded_body()?,
        "timeout_ms": descriptor.timeout.map(crate::config::millis),
        "discard_body": descriptor.discard_body,
    });

    let mut hasher = Sha256::new();
    hasher.update(canonical.to_string().as_bytes());
    Ok(RequestFingerprint(hex::encode(hasher.finalize())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;
    use url::Url;

    fn descriptor(method: Method, url: &str) -> RequestDescriptor {
        RequestDescriptor::new(method, Url::parse(url).unwrap()).with_timeout(Duration::from_secs(5))
    }

    #[test]
    fn test_header_order_does_not_matter() {
        let a = descriptor(Method::GET, "https://example.com/posts")
            .with_header("Authorization", "Bearer t")
            .unwrap()
            .with_header("Content-Type", "application/json")
            .unwrap()
            .with_header("X-Tenant", "acme")
            .unwrap();
        let b = descriptor(Method::GET, "https://example.com/posts")
            .with_header("X-Tenant", "acme")
            .unwrap()
            .with_header("content-type", "application/json")
            .unwrap()
            .with_header("Authorization", "Bearer t")
            .unwrap();

        assert_eq!(derive(&a).unwrap(), derive(&b).unwrap());
    }

    #[test]
    fn test_body_field_order_does_not_matter() {
        let a = descriptor(Method::POST, "https://example.com/posts")
            .with_body(serde_json::from_str::<Value>(r#"{"title":"foo","userId":1}"#).unwrap());
        let b = descriptor(Method::POST, "https://example.com/posts")
            .with_body(serde_json::from_str::<Value>(r#"{"userId":1,"title":"foo"}"#).unwrap());

        assert_eq!(derive(&a).unwrap(), derive(&b).unwrap());
    }

    #[test]
    fn test_every_field_takes_part() {
        let base = descriptor(Method::GET, "https://example.com/posts");
        let key = derive(&base).unwrap();

        let variants = vec![
            descriptor(Method::DELETE, "https://example.com/posts"),
            descriptor(Method::GET, "https://example.com/posts?id=1"),
            base.clone().with_header("X-Tenant", "acme").unwrap(),
            base.clone().with_body(serde_json::json!({"a": 1})),
            base.clone().with_timeout(Duration::from_secs(6)),
            base.clone().discarding_body(),
        ];
        for variant in variants {
            assert_ne!(derive(&variant).unwrap(), key, "{:?}", variant);
        }
    }

    #[test]
    fn test_repeated_header_values_keep_their_order() {
        let a = descriptor(Method::GET, "https://example.com/posts")
            .with_header("Accept", "application/json")
            .unwrap()
            .with_header("Accept", "text/plain")
            .unwrap();
        let b = descriptor(Method::GET, "https://example.com/posts")
            .with_header("Accept", "text/plain")
            .unwrap()
            .with_header("Accept", "application/json")
            .unwrap();

        assert_ne!(derive(&a).unwrap(), derive(&b).unwrap());
    }

    #[test]
    fn test_cancellation_token_is_ignored() {
        let plain = descriptor(Method::GET, "https://example.com/posts");
        let with_token = plain.clone().with_cancel(CancellationToken::new());
        let cancelled = CancellationToken::new();
        cancelled.cancel();
        let with_fired_token = plain.clone().with_cancel(cancelled);

        let key = derive(&plain).unwrap();
        assert_eq!(derive(&with_token).unwrap(), key);
        assert_eq!(derive(&with_fired_token).unwrap(), key);
        assert_eq!(key.as_str().len(), 64);
    }
}
