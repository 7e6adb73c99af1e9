//! Resource operations against a json-server style backend.
//!
//! This example shows how to:
//! - Fetch a filtered, sorted page of a collection
//! - Fetch, create, update and delete single records
//! - Let overlapping identical requests share one network call
//! - Serve repeated reads from a cache
//!
//! Run with: `cargo run --example resource_calls`

use restline::{Client, Error, Filters, ListParams, MemoryCache, SortOrder};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct Post {
    #[serde(rename = "userId")]
    user_id: u32,
    id: u32,
    title: String,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter("restline=debug,resource_calls=info")
        .init();

    let cache = Arc::new(MemoryCache::new());
    let client = Client::builder()
        .base_url("https://jsonplaceholder.typicode.com")?
        .cache(cache.clone())
        .build()?;

    println!("=== getMany ===");
    let params = ListParams::new()
        .filters(Filters::new().with("userId", 1))
        .sort(["id"])
        .order(SortOrder::Desc)
        .limit(3);
    let posts = client
        .get_many("posts", params)
        .await?
        .deserialize::<Vec<Post>>()?;
    for post in posts.iter() {
        println!("#{} {}", post.id, post.title);
    }
    println!();

    println!("=== Coalesced reads ===");
    let (a, b) = tokio::join!(client.get_one("posts", 2), client.get_one("posts", 2));
    println!("Both answered: {} / {}", a?.data["id"], b?.data["id"]);
    println!("Cached responses: {}", cache.len());
    println!();

    println!("=== Writes ===");
    let created = client
        .create_one("posts", json!({ "title": "foo", "body": "bar", "userId": 1 }))
        .await?;
    println!("Created: {}", created.data);

    let updated = client.update_one("posts", 1, json!({ "title": "baz" })).await?;
    println!("Updated: {}", updated.data);

    let deleted = client.delete_one("posts", 1).await?;
    println!("Deleted id: {}", deleted.data);
    println!();

    println!("=== Error handling ===");
    match client.get_one("posts", "missing").await {
        Ok(post) => println!("Unexpected: {}", post.data),
        Err(Error::Http { status, attempts, .. }) => {
            println!("HTTP {} after {} attempt(s)", status, attempts);
        }
        Err(e) => println!("Other error: {}", e),
    }

    Ok(())
}
