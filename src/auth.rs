//! Bearer token acquisition.

use crate::Result;
use async_trait::async_trait;

/// Supplies the bearer token for outgoing requests.
///
/// Called once per request, before fingerprinting. `Ok(None)` sends no
/// `Authorization` header. Plain closures returning `Option<String>` implement
/// this trait.
///
/// # Examples
///
/// ```
/// use restline::{Client, TokenProvider};
/// use async_trait::async_trait;
///
/// struct Vault;
///
/// #[async_trait]
/// impl TokenProvider for Vault {
///     async fn token(&self) -> restline::Result<Option<String>> {
///         Ok(Some("s3cr3t".to_string()))
///     }
/// }
///
/// # fn example() -> Result<(), restline::Error> {
/// let client = Client::builder()
///     .base_url("https://api.example.com")?
///     .token_provider(Vault)
///     .build()?;
///
/// let other = Client::builder()
///     .base_url("https://api.example.com")?
///     .token_provider(|| std::env::var("API_TOKEN").ok())
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Returns the current token, if any.
    async fn token(&self) -> Result<Option<String>>;
}

#[async_trait]
impl<F> TokenProvider for F
where
    F: Fn() -> Option<String> + Send + Sync,
{
    async fn token(&self) -> Result<Option<String>> {
        Ok(self())
    }
}

/// Never supplies a token.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoToken;

#[async_trait]
impl TokenProvider for NoToken {
    async fn token(&self) -> Result<Option<String>> {
        Ok(None)
    }
}
