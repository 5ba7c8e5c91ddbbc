//! Error types for the fintrack client.
//!
//! This module provides a unified error type with explicit variants for
//! transport, authentication, protocol, storage and input validation errors.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// The unified error type for fintrack operations.
///
/// This error type covers all possible failure modes in the client,
/// with explicit variants to allow callers to handle specific cases.
#[derive(Debug, Error)]
pub enum Error {
    /// Network transport errors (connection, timeout).
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Authentication errors (expired session, failed refresh).
    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Protocol errors (non-success status, unexpected responses).
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Input validation errors (invalid base URL or path).
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InvalidInputError),

    /// A response body could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Token storage errors.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl Error {
    /// Returns the protocol error if this error came from a non-success response.
    pub fn as_protocol(&self) -> Option<&ProtocolError> {
        match self {
            Error::Protocol(err) => Some(err),
            _ => None,
        }
    }

    /// Returns true if this error ended the session.
    pub fn is_session_ended(&self) -> bool {
        matches!(self, Error::Auth(AuthError::RefreshFailed(_)))
    }
}

/// Transport-level errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network connection failed.
    #[error("connection failed: {message}")]
    Connection { message: String },

    /// Request timed out.
    #[error("request timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Generic HTTP error.
    #[error("HTTP error: {message}")]
    Http { message: String },
}

/// Authentication-related errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Login was rejected.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// No session exists to refresh.
    #[error("not authenticated")]
    NotAuthenticated,

    /// The session refresh failed and the session has ended.
    ///
    /// Every request waiting on the same refresh receives the same shared cause.
    #[error("session refresh failed: {0}")]
    RefreshFailed(#[source] Arc<Error>),

    /// The refresh endpoint answered with an unexpected body.
    #[error("malformed refresh response: {reason}")]
    MalformedRefreshResponse { reason: String },

    /// The task driving the refresh was dropped before it finished.
    #[error("session refresh was abandoned")]
    RefreshAbandoned,

    /// A refresh is already in flight.
    #[error("session refresh already in progress")]
    RefreshInProgress,
}

impl AuthError {
    /// Returns the shared refresh failure cause, if any.
    pub fn refresh_cause(&self) -> Option<&Arc<Error>> {
        match self {
            AuthError::RefreshFailed(cause) => Some(cause),
            _ => None,
        }
    }
}

/// Protocol-level errors from non-success responses.
#[derive(Debug, Clone)]
pub struct ProtocolError {
    /// HTTP status code.
    pub status: u16,
    /// Error code from the body (if present).
    pub error: Option<String>,
    /// Error message from the server.
    pub message: Option<String>,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {}", self.status)?;
        if let Some(ref error) = self.error {
            write!(f, " [{}]", error)?;
        }
        if let Some(ref message) = self.message {
            write!(f, ": {}", message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ProtocolError {}

impl ProtocolError {
    /// Create a new protocol error.
    pub fn new(status: u16, error: Option<String>, message: Option<String>) -> Self {
        Self {
            status,
            error,
            message,
        }
    }

    /// Check if this is an authentication failure (401 or 403).
    pub fn is_auth_error(&self) -> bool {
        self.status == 401 || self.status == 403
    }

    /// Check if this is a server failure (5xx).
    pub fn is_server_error(&self) -> bool {
        self.status >= 500
    }
}

/// Input validation errors.
#[derive(Debug, Error)]
pub enum InvalidInputError {
    /// Invalid API base URL.
    #[error("invalid API URL '{value}': {reason}")]
    ApiUrl { value: String, reason: String },

    /// Invalid request path.
    #[error("invalid path '{value}': {reason}")]
    Path { value: String, reason: String },

    /// Generic invalid input.
    #[error("invalid input: {message}")]
    Other { message: String },
}

/// Token storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing the backing file failed.
    #[error("I/O error on {}: {message}", path.display())]
    Io { path: PathBuf, message: String },

    /// The backing file exists but does not hold a valid token map.
    #[error("corrupt token file {}: {message}", path.display())]
    Corrupt { path: PathBuf, message: String },
}
