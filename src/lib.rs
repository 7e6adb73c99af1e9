//! # Restline - a REST resource data provider
//!
//! Restline turns CRUD-style calls into HTTP requests against a REST backend
//! that follows json-server conventions, and normalizes every response into a
//! `{data, meta}` [`Envelope`]. Underneath, each request is fingerprinted,
//! answered from an optional cache, shared with identical requests already in
//! flight, and retried with exponential backoff on transient failures.
//!
//! ## Quick Start
//!
//! ```no_run
//! use restline::{Client, Filters, ListParams, SortOrder};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), restline::Error> {
//!     let client = Client::builder()
//!         .base_url("https://jsonplaceholder.typicode.com")?
//!         .build()?;
//!
//!     // GET /posts?userId=1&_sort=id&_order=desc&_limit=5
//!     let posts = client
//!         .get_many(
//!             "posts",
//!             ListParams::new()
//!                 .filters(Filters::new().with("userId", 1))
//!                 .sort(["id"])
//!                 .order(SortOrder::Desc)
//!                 .limit(5),
//!         )
//!         .await?;
//!     println!("Posts: {}", posts.data);
//!
//!     // PATCH /posts/1
//!     let updated = client.update_one("posts", 1, json!({ "title": "foo" })).await?;
//!     println!("Updated: {}", updated.data);
//!
//!     // DELETE /posts/1, resolves to the id
//!     let deleted = client.delete_one("posts", 1).await?;
//!     assert_eq!(deleted.data, json!(1));
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Request coalescing** - Overlapping identical requests share one network call
//! - **Pluggable cache** - Successful responses can be served from any [`Cache`]
//! - **Retries** - Timeout, overload and gateway statuses are retried with doubling backoff
//! - **Cancellation** - Callers abandon their wait through a `CancellationToken`
//! - **Pluggable collaborators** - Transport, bearer token, content type, and
//!   response and error parsing can all be replaced
//! - **Structured logging** - Every dispatch, retry and cache hit is reported through `tracing`
//!
//! ## Error Handling
//!
//! ```no_run
//! use restline::{Client, Error};
//!
//! # async fn example() -> Result<(), Error> {
//! # let client = Client::builder().base_url("https://api.example.com")?.build()?;
//! match client.get_one("posts", 1).await {
//!     Ok(post) => println!("Post: {}", post.data),
//!     Err(Error::Http { status, raw_response, attempts, .. }) => {
//!         eprintln!("HTTP error {} after {} attempts: {}", status, attempts, raw_response);
//!     }
//!     Err(Error::Cancelled) => eprintln!("Cancelled"),
//!     Err(e) => eprintln!("Other error: {}", e),
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod cache;
mod client;
pub mod config;
pub mod descriptor;
mod envelope;
mod error;
pub mod key;
pub mod parser;
pub mod query;
pub mod registry;
mod resource;
pub mod retry;
pub mod transport;

pub use auth::TokenProvider;
pub use cache::{Cache, MemoryCache};
pub use client::{Client, ClientBuilder};
pub use config::ClientConfig;
pub use descriptor::{Body, RequestDescriptor};
pub use envelope::Envelope;
pub use error::{Error, Result};
pub use key::RequestFingerprint;
pub use parser::{ErrorParser, FailedResponse, ResponseParser};
pub use query::{FilterValue, Filters, ListParams, SortOrder};
pub use retry::RetryPolicy;
pub use transport::{HttpTransport, Transport, TransportRequest, TransportResponse};

pub use tokio_util::sync::CancellationToken;
