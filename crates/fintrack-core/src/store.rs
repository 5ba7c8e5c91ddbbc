//! In-memory token store.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::Result;
use crate::tokens::{AccessToken, RefreshToken, TokenPair};
use crate::traits::TokenStore;

/// A [`TokenStore`] that keeps the pair in process memory.
///
/// Useful for short-lived clients and for tests. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    inner: RwLock<Slots>,
}

#[derive(Debug, Default)]
struct Slots {
    access_token: Option<AccessToken>,
    refresh_token: Option<RefreshToken>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store already holding a pair.
    pub fn with_tokens(access_token: AccessToken, refresh_token: Option<RefreshToken>) -> Self {
        Self {
            inner: RwLock::new(Slots {
                access_token: Some(access_token),
                refresh_token,
            }),
        }
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn load(&self) -> Result<Option<TokenPair>> {
        let slots = self.inner.read().await;
        Ok(slots
            .access_token
            .clone()
            .map(|access| TokenPair::new(access, slots.refresh_token.clone())))
    }

    async fn save(&self, pair: &TokenPair) -> Result<()> {
        let mut slots = self.inner.write().await;
        slots.access_token = Some(pair.access_token.clone());
        slots.refresh_token = pair.refresh_token.clone();
        Ok(())
    }

    async fn set_access_token(&self, token: &AccessToken) -> Result<bool> {
        let mut slots = self.inner.write().await;
        if slots.access_token.is_none() {
            return Ok(false);
        }
        slots.access_token = Some(token.clone());
        Ok(true)
    }

    async fn clear(&self) -> Result<()> {
        let mut slots = self.inner.write().await;
        slots.access_token = None;
        slots.refresh_token = None;
        Ok(())
    }
}
