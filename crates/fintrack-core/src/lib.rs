//! fintrack-core - Core types and traits for the fintrack API client.
//!
//! The authenticated request pipeline itself lives in `fintrack-http`; this
//! crate holds what every layer shares: the request/response descriptors,
//! the token types, the error taxonomy and the [`Transport`] and
//! [`TokenStore`] seams.

pub mod credentials;
pub mod error;
pub mod store;
pub mod tokens;
pub mod traits;
pub mod types;

pub use credentials::Credentials;
pub use error::Error;
pub use store::MemoryTokenStore;
pub use tokens::{AccessToken, RefreshToken, TokenPair};
pub use traits::{TokenStore, Transport};
pub use types::{ApiRequest, ApiResponse, ApiUrl};

/// Re-exported so callers can build requests without a direct `http` dependency.
pub use http::{Method, StatusCode, header};

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;
