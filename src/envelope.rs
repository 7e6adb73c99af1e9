//! The `{data, meta}` shape every resource call resolves to.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A normalized response.
///
/// `data` is the resource payload; `meta` carries out-of-band information such
/// as pagination totals, when the response parser finds any.
///
/// # Examples
///
/// ```no_run
/// use restline::{Client, ListParams};
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct Post {
///     id: u64,
///     title: String,
/// }
///
/// # async fn example() -> Result<(), restline::Error> {
/// let client = Client::builder()
///     .base_url("https://jsonplaceholder.typicode.com")?
///     .build()?;
///
/// let posts = client.get_many("posts", ListParams::new().limit(3)).await?;
/// let posts = posts.deserialize::<Vec<Post>>()?;
/// for post in posts.iter() {
///     println!("{}: {}", post.id, post.title);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T = Value> {
    /// The resource payload.
    pub data: T,

    /// Out-of-band metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl<T> Envelope<T> {
    /// Creates an envelope without metadata.
    pub fn new(data: T) -> Self {
        Self { data, meta: None }
    }

    /// Maps the payload, keeping the metadata.
    ///
    /// # Examples
    ///
    /// ```
    /// # use restline::Envelope;
    /// let envelope = Envelope::new(42);
    /// let envelope = envelope.map(|n| n.to_string());
    /// assert_eq!(envelope.data, "42");
    /// ```
    pub fn map<U, F>(self, f: F) -> Envelope<U>
    where
        F: FnOnce(T) -> U,
    {
        Envelope {
            data: f(self.data),
            meta: self.meta,
        }
    }
}

impl Envelope<Value> {
    /// Deserializes the payload into a concrete type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeserializationFailed`] if the payload does not match
    /// `T`.
    pub fn deserialize<T: DeserializeOwned>(self) -> Result<Envelope<T>> {
        let raw = self.data.to_string();
        let data = serde_json::from_value(self.data).map_err(|e| Error::DeserializationFailed {
            raw_response: raw,
            serde_error: e.to_string(),
            status: http::StatusCode::OK,
        })?;
        Ok(Envelope {
            data,
            meta: self.meta,
        })
    }
}

impl<T> AsRef<T> for Envelope<T> {
    fn as_ref(&self) -> &T {
        &self.data
    }
}

impl<T> std::ops::Deref for Envelope<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Post {
        id: u32,
    }

    #[test]
    fn test_deserialize_keeps_meta() {
        let envelope = Envelope {
            data: json!([{"id": 1}, {"id": 2}]),
            meta: Some(json!({"total": 2})),
        };
        let typed = envelope.deserialize::<Vec<Post>>().unwrap();
        assert_eq!(typed.data, vec![Post { id: 1 }, Post { id: 2 }]);
        assert_eq!(typed.meta, Some(json!({"total": 2})));
        assert_eq!(typed.len(), 2);
    }

    #[test]
    fn test_deserialize_mismatch() {
        let envelope = Envelope::new(json!({"id": "one"}));
        assert!(matches!(
            envelope.deserialize::<Post>(),
            Err(Error::DeserializationFailed { .. })
        ));
    }

    #[test]
    fn test_serialized_shape() {
        let envelope = Envelope::new(json!(1));
        assert_eq!(serde_json::to_value(&envelope).unwrap(), json!({"data": 1}));
    }
}
