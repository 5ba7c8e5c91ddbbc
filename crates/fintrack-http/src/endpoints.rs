//! Wire types for the authentication endpoints.

use serde::{Deserialize, Serialize};

use fintrack_core::error::AuthError;

/// Request body for the refresh endpoint.
///
/// The backend accepts either a refresh token or an expired access token here.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest<'a> {
    pub expired_token: &'a str,
}

/// Response from the refresh endpoint.
///
/// Fields are optional so a malformed body is reported as such rather than
/// as a decode error.
#[derive(Debug, Deserialize)]
pub struct RefreshResponse {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub token: Option<String>,
}

impl RefreshResponse {
    /// Extract the new access token, rejecting any shape other than
    /// `{ "success": true, "token": "<non-empty>" }`.
    pub fn into_token(self) -> Result<String, AuthError> {
        if self.success != Some(true) {
            return Err(AuthError::MalformedRefreshResponse {
                reason: "success flag missing or false".to_string(),
            });
        }
        match self.token {
            Some(token) if !token.is_empty() => Ok(token),
            _ => Err(AuthError::MalformedRefreshResponse {
                reason: "token missing".to_string(),
            }),
        }
    }
}

/// Request body for the login endpoint.
#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// Response from the login endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}
