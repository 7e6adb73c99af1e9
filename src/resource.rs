//! Resource operations.
//!
//! Each operation builds one [`RequestDescriptor`] following json-server
//! URL conventions and hands it to [`Client::execute`].

use crate::{
    query::{self, Filters, ListParams},
    Client, Envelope, RequestDescriptor, Result,
};
use http::Method;
use serde_json::Value;

/// Renders an id as a path segment or query value.
fn id_segment(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Drops the `id` member of an object payload; the id travels in the URL.
fn without_id(mut data: Value) -> Value {
    if let Value::Object(members) = &mut data {
        members.remove("id");
    }
    data
}

/// Path segments for a resource, optionally followed by one record id.
/// Slashes in `resource` separate segments; the id is always one segment.
fn segments<'a>(resource: &'a str, id: Option<&'a str>) -> impl Iterator<Item = &'a str> {
    resource.split('/').filter(|s| !s.is_empty()).chain(id)
}

fn ids_query(ids: &[Value]) -> String {
    let filters = Filters::new().with(
        "id",
        query::FilterValue::List(ids.iter().map(id_segment).collect()),
    );
    query::render(&filters, &[], None, 0, None)
}

impl Client {
    fn descriptor<'a>(
        &self,
        method: Method,
        path: impl Iterator<Item = &'a str>,
        query: &str,
    ) -> Result<RequestDescriptor> {
        let descriptor = RequestDescriptor::new(method, self.url(path, query)?);
        Ok(match &self.cancel {
            Some(token) => descriptor.with_cancel(token.clone()),
            None => descriptor,
        })
    }

    /// Fetches a collection: `GET {base}/{resource}?{query}`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use restline::{Client, Filters, ListParams, SortOrder};
    ///
    /// # async fn example() -> Result<(), restline::Error> {
    /// let client = Client::builder()
    ///     .base_url("https://jsonplaceholder.typicode.com")?
    ///     .build()?;
    ///
    /// let posts = client
    ///     .get_many(
    ///         "posts",
    ///         ListParams::new()
    ///             .filters(Filters::new().with("userId", 1))
    ///             .sort(["id"])
    ///             .order(SortOrder::Desc)
    ///             .limit(3),
    ///     )
    ///     .await?;
    /// println!("{}", posts.data);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn get_many(&self, resource: &str, params: ListParams) -> Result<Envelope> {
        let mut descriptor =
            self.descriptor(Method::GET, segments(resource, None), &params.query_string())?;
        if let Some(token) = params.cancel {
            descriptor = descriptor.with_cancel(token);
        }
        self.execute(descriptor).await
    }

    /// Fetches one record: `GET {base}/{resource}/{id}`.
    pub async fn get_one(&self, resource: &str, id: impl Into<Value>) -> Result<Envelope> {
        let id = id.into();
        let segment = id_segment(&id);
        let path = segments(resource, Some(segment.as_str()));
        let descriptor = self.descriptor(Method::GET, path, "")?;
        self.execute(descriptor).await
    }

    /// Creates a record: `POST {base}/{resource}`.
    ///
    /// An `id` member in `data` is not sent; the backend assigns ids.
    pub async fn create_one(&self, resource: &str, data: Value) -> Result<Envelope> {
        let descriptor = self
            .descriptor(Method::POST, segments(resource, None), "")?
            .with_body(without_id(data));
        self.execute(descriptor).await
    }

    /// Updates one record: `PATCH {base}/{resource}/{id}`, or `PUT` when
    /// idempotent updates are configured.
    pub async fn update_one(&self, resource: &str, id: impl Into<Value>, data: Value) -> Result<Envelope> {
        let id = id.into();
        let segment = id_segment(&id);
        let path = segments(resource, Some(segment.as_str()));
        let descriptor = self
            .descriptor(self.config().update_method(), path, "")?
            .with_body(without_id(data));
        self.execute(descriptor).await
    }

    /// Applies the same update to several records:
    /// `PATCH {base}/{resource}?id=a&id=b`, or `PUT` when idempotent updates
    /// are configured.
    pub async fn update_many(&self, resource: &str, ids: &[Value], data: Value) -> Result<Envelope> {
        let descriptor = self
            .descriptor(
                self.config().update_method(),
                segments(resource, None),
                &ids_query(ids),
            )?
            .with_body(without_id(data));
        self.execute(descriptor).await
    }

    /// Deletes one record: `DELETE {base}/{resource}/{id}`.
    ///
    /// Resolves to the deleted id; the response body is not read.
    pub async fn delete_one(&self, resource: &str, id: impl Into<Value>) -> Result<Envelope> {
        let id = id.into();
        let segment = id_segment(&id);
        let path = segments(resource, Some(segment.as_str()));
        let descriptor = self.descriptor(Method::DELETE, path, "")?.discarding_body();
        self.execute(descriptor).await?;
        Ok(Envelope::new(id))
    }

    /// Deletes several records: `DELETE {base}/{resource}?id=a&id=b`.
    ///
    /// Resolves to the deleted ids; the response body is not read.
    pub async fn delete_many(&self, resource: &str, ids: &[Value]) -> Result<Envelope> {
        let descriptor = self
            .descriptor(Method::DELETE, segments(resource, None), &ids_query(ids))?
            .discarding_body();
        self.execute(descriptor).await?;
        Ok(Envelope::new(Value::Array(ids.to_vec())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_id_segments() {
        assert_eq!(id_segment(&json!(1)), "1");
        assert_eq!(id_segment(&json!("abc")), "abc");
    }

    #[test]
    fn test_without_id() {
        assert_eq!(
            without_id(json!({"id": 1, "title": "foo"})),
            json!({"title": "foo"})
        );
        assert_eq!(without_id(json!([1, 2])), json!([1, 2]));
    }

    #[test]
    fn test_ids_query() {
        assert_eq!(ids_query(&[json!(1), json!("b")]), "id=1&id=b");
        assert_eq!(ids_query(&[json!("a&id=b")]), "id=a%26id%3Db");
    }

    #[test]
    fn test_segments() {
        let path: Vec<_> = segments("users/7/posts", Some("a/b")).collect();
        assert_eq!(path, vec!["users", "7", "posts", "a/b"]);
        assert_eq!(segments("/posts/", None).collect::<Vec<_>>(), vec!["posts"]);
    }
}
