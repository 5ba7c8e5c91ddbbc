//! Transport trait.

use async_trait::async_trait;

use crate::Result;
use crate::types::{ApiRequest, ApiResponse};

/// Sends a single request to the backend.
///
/// Implementations return `Ok` for every response the server produced,
/// whatever its status; status classification belongs to the caller.
/// `Err` is reserved for failures where no response exists (connection
/// refused, timeout, invalid request).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send the request exactly as given.
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse>;
}
