//! Durable token storage trait.

use async_trait::async_trait;

use crate::tokens::{AccessToken, TokenPair};
use crate::Result;

/// Storage for the current session's credential pair.
///
/// A store holds at most one pair. The access token and the refresh token
/// are stored under separate keys so a refresh can overwrite the access
/// token alone.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Load the stored pair, or `None` if no access token is stored.
    async fn load(&self) -> Result<Option<TokenPair>>;

    /// Replace both keys.
    async fn save(&self, pair: &TokenPair) -> Result<()>;

    /// Overwrite the access token, leaving the refresh token untouched.
    ///
    /// Only replaces an existing session: returns `false` and stores nothing
    /// when the store is empty, so a refresh that settles after a logout
    /// cannot bring the session back.
    async fn set_access_token(&self, token: &AccessToken) -> Result<bool>;

    /// Delete both keys.
    async fn clear(&self) -> Result<()>;

    /// Load only the access token.
    async fn access_token(&self) -> Result<Option<AccessToken>> {
        Ok(self.load().await?.map(|pair| pair.access_token))
    }
}
