//! Core traits for the seams of the request pipeline.

mod token_store;
mod transport;

pub use token_store::TokenStore;
pub use transport::Transport;
