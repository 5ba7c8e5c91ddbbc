//! fintrack-file - File-backed session storage.
//!
//! Provides [`FileTokenStore`], a [`fintrack_core::TokenStore`] that keeps
//! the access and refresh tokens in a JSON file so a session survives
//! restarts of the process.

mod store;

pub use store::FileTokenStore;
