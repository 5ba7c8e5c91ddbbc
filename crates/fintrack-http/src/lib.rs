//! fintrack-http - Authenticated HTTP request pipeline.
//!
//! [`ApiClient`] decorates every request with the stored bearer token,
//! refreshes an expired session at most once at a time, queues requests that
//! fail while the refresh is in flight and replays them once it settles.
//! Session lifecycle changes are broadcast as [`SessionEvent`]s.

mod client;
mod config;
pub mod coordinator;
pub mod decorator;
mod endpoints;
mod notifier;
mod transport;

pub use client::ApiClient;
pub use config::{ClientConfig, DEFAULT_LOGIN_PATH, DEFAULT_REFRESH_PATH, DEFAULT_REQUEST_TIMEOUT};
pub use coordinator::{PendingRequest, RefreshCoordinator, RefreshOutcome, RefreshSlot};
pub use notifier::{SessionEvent, SessionNotifier};
pub use transport::HttpTransport;
