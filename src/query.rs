//! Collection queries in the json-server dialect.
//!
//! Filters become `key=value` pairs; sorting and paging use the reserved
//! `_sort`, `_order`, `_start` and `_limit` keys.

use crate::parser::is_truthy;
use serde_json::Value;
use std::fmt;
use tokio_util::sync::CancellationToken;
use url::form_urlencoded;

/// The value side of one filter.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    /// One pair.
    Scalar(String),
    /// One pair per element.
    List(Vec<String>),
    /// One pair per flag that is set.
    Flags(Vec<(String, bool)>),
}

impl FilterValue {
    fn values(&self) -> Vec<&str> {
        match self {
            FilterValue::Scalar(value) => vec![value.as_str()],
            FilterValue::List(values) => values.iter().map(String::as_str).collect(),
            FilterValue::Flags(flags) => flags
                .iter()
                .filter(|(_, set)| *set)
                .map(|(name, _)| name.as_str())
                .collect(),
        }
    }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl From<Value> for FilterValue {
    /// Arrays become lists, objects become flags (by truthiness of each
    /// member), anything else is a scalar.
    fn from(value: Value) -> Self {
        match value {
            Value::Array(items) => FilterValue::List(items.iter().map(scalar).collect()),
            Value::Object(members) => FilterValue::Flags(
                members
                    .iter()
                    .map(|(name, set)| (name.clone(), is_truthy(set)))
                    .collect(),
            ),
            other => FilterValue::Scalar(scalar(&other)),
        }
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::Scalar(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        FilterValue::Scalar(value)
    }
}

macro_rules! scalar_filter {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for FilterValue {
                fn from(value: $ty) -> Self {
                    FilterValue::Scalar(value.to_string())
                }
            }
        )*
    };
}

scalar_filter!(bool, i32, i64, u32, u64, usize, f64);

/// Filters in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filters(Vec<(String, FilterValue)>);

impl Filters {
    /// Creates an empty filter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a filter.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.0.push((key.into(), value.into()));
        self
    }

    /// Builds filters from a JSON object, sorted by key.
    pub fn from_json(object: &serde_json::Map<String, Value>) -> Self {
        let mut filters: Vec<_> = object
            .iter()
            .map(|(key, value)| (key.clone(), FilterValue::from(value.clone())))
            .collect();
        filters.sort_by(|a, b| a.0.cmp(&b.0));
        Self(filters)
    }

    /// Returns `true` if there are no filters.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Ascending.
    Asc,
    /// Descending.
    Desc,
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortOrder::Asc => f.write_str("asc"),
            SortOrder::Desc => f.write_str("desc"),
        }
    }
}

/// Parameters of a collection fetch.
///
/// # Examples
///
/// ```
/// use restline::{Filters, ListParams, SortOrder};
///
/// let params = ListParams::new()
///     .filters(Filters::new().with("postId", 1))
///     .sort(["views", "id"])
///     .order(SortOrder::Desc)
///     .offset(10)
///     .limit(5);
///
/// assert_eq!(
///     params.query_string(),
///     "postId=1&_sort=views,id&_order=desc&_start=10&_limit=5"
/// );
/// ```
#[derive(Debug, Clone, Default)]
pub struct ListParams {
    /// Field filters.
    pub filters: Filters,
    /// Sort fields, most significant first.
    pub sort: Vec<String>,
    /// Sort direction.
    pub order: Option<SortOrder>,
    /// Index of the first record; `0` is left out.
    pub offset: u64,
    /// Maximum number of records; `None` and `0` are left out.
    pub limit: Option<u64>,
    /// Abandons the call when cancelled.
    pub cancel: Option<CancellationToken>,
}

impl ListParams {
    /// Empty parameters: the whole collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the filters.
    pub fn filters(mut self, filters: Filters) -> Self {
        self.filters = filters;
        self
    }

    /// Sets the sort fields.
    pub fn sort<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sort = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the sort direction.
    pub fn order(mut self, order: SortOrder) -> Self {
        self.order = Some(order);
        self
    }

    /// Sets the offset.
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    /// Sets the page size.
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Attaches a cancellation token.
    pub fn cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Renders the query string for these parameters.
    pub fn query_string(&self) -> String {
        render(
            &self.filters,
            &self.sort,
            self.order,
            self.offset,
            self.limit,
        )
    }
}

fn encode(raw: &str) -> String {
    form_urlencoded::byte_serialize(raw.as_bytes()).collect()
}

/// Renders a query string.
///
/// Pairs appear in filter insertion order, followed by `_sort`, `_order`,
/// `_start` and `_limit`. Keys and values are form-encoded, so every value
/// stays a single pair. Sort fields are encoded one by one and joined with
/// literal commas.
pub fn render(
    filters: &Filters,
    sort: &[String],
    order: Option<SortOrder>,
    offset: u64,
    limit: Option<u64>,
) -> String {
    let mut params = Vec::new();
    for (key, value) in &filters.0 {
        for value in value.values() {
            params.push(format!("{}={}", encode(key), encode(value)));
        }
    }
    if !sort.is_empty() {
        let fields: Vec<String> = sort.iter().map(|field| encode(field)).collect();
        params.push(format!("_sort={}", fields.join(",")));
    }
    if let Some(order) = order {
        params.push(format!("_order={}", order));
    }
    if offset != 0 {
        params.push(format!("_start={}", offset));
    }
    if let Some(limit) = limit.filter(|l| *l != 0) {
        params.push(format!("_limit={}", limit));
    }
    params.join("&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn pairs(query: &str) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            *counts.entry(pair.to_string()).or_insert(0) += 1;
        }
        counts
    }

    fn multiset(items: &[&str]) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for item in items {
            *counts.entry(item.to_string()).or_insert(0) += 1;
        }
        counts
    }

    #[test]
    fn test_empty_params() {
        assert_eq!(ListParams::new().query_string(), "");
    }

    #[test]
    fn test_list_filter_expands() {
        let params = ListParams::new().filters(Filters::new().with("a", json!([1, 2])));
        assert_eq!(pairs(&params.query_string()), multiset(&["a=1", "a=2"]));
    }

    #[test]
    fn test_flag_filter_keeps_set_flags() {
        let params =
            ListParams::new().filters(Filters::new().with("a", json!({"x": true, "y": false})));
        assert_eq!(pairs(&params.query_string()), multiset(&["a=x"]));
    }

    #[test]
    fn test_scalar_filters() {
        let params = ListParams::new().filters(
            Filters::new()
                .with("postId", 1)
                .with("author", "ann")
                .with("draft", false),
        );
        assert_eq!(
            pairs(&params.query_string()),
            multiset(&["postId=1", "author=ann", "draft=false"])
        );
    }

    #[test]
    fn test_sort_fields_join_with_commas() {
        let params = ListParams::new().sort(["a", "b"]);
        assert_eq!(params.query_string(), "_sort=a,b");

        let params = ListParams::new().sort(["id"]).order(SortOrder::Asc);
        assert_eq!(pairs(&params.query_string()), multiset(&["_sort=id", "_order=asc"]));
    }

    #[test]
    fn test_zero_paging_is_left_out() {
        let params = ListParams::new().offset(0).limit(0);
        assert_eq!(params.query_string(), "");

        let params = ListParams::new().offset(10).limit(3);
        assert_eq!(pairs(&params.query_string()), multiset(&["_start=10", "_limit=3"]));
    }

    #[test]
    fn test_filters_from_json_object() {
        let object = json!({"tag": ["rust", "http"], "userId": 7});
        let filters = Filters::from_json(object.as_object().unwrap());
        let query = render(&filters, &[], None, 0, None);
        assert_eq!(pairs(&query), multiset(&["tag=rust", "tag=http", "userId=7"]));
    }

    #[test]
    fn test_filters_from_json_are_sorted_by_key() {
        let object: Value = serde_json::from_str(r#"{"zeta": 1, "alpha": 2}"#).unwrap();
        let filters = Filters::from_json(object.as_object().unwrap());
        assert_eq!(render(&filters, &[], None, 0, None), "alpha=2&zeta=1");
    }

    #[test]
    fn test_reserved_characters_are_escaped() {
        let params = ListParams::new()
            .filters(
                Filters::new()
                    .with("lang", "C#")
                    .with("q", "a&b=c")
                    .with("full name", "ann lee"),
            )
            .sort(["id", "a,b"])
            .limit(5);

        let query = params.query_string();
        assert_eq!(
            query,
            "lang=C%23&q=a%26b%3Dc&full+name=ann+lee&_sort=id,a%2Cb&_limit=5"
        );

        let decoded: Vec<(String, String)> = form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect();
        assert_eq!(
            decoded,
            vec![
                ("lang".to_string(), "C#".to_string()),
                ("q".to_string(), "a&b=c".to_string()),
                ("full name".to_string(), "ann lee".to_string()),
                ("_sort".to_string(), "id,a,b".to_string()),
                ("_limit".to_string(), "5".to_string()),
            ]
        );
    }
}
