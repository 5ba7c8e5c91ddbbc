//! Replayable request and buffered response types.

use bytes::Bytes;
use http::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use http::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::ApiUrl;
use crate::error::{Error, InvalidInputError, ProtocolError};

/// An outgoing API request.
///
/// Requests are plain data so they can be captured while a session refresh is
/// in flight and replayed afterwards. The retry marker records whether this
/// request has already been replayed once after an authentication failure.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    headers: HeaderMap,
    body: Option<serde_json::Value>,
    retried: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: None,
            retried: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attach a JSON body.
    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Serialize a value as the JSON body.
    pub fn with_json<B: Serialize + ?Sized>(self, body: &B) -> Result<Self, Error> {
        Ok(self.with_body(serde_json::to_value(body)?))
    }

    /// Add or replace a header.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> Option<&serde_json::Value> {
        self.body.as_ref()
    }

    /// Returns true if this request is a replay after an authentication failure.
    pub fn is_retried(&self) -> bool {
        self.retried
    }

    /// Mark this request as replayed.
    pub fn into_retry(mut self) -> Self {
        self.retried = true;
        self
    }

    /// Returns the bearer token carried by this request, if any.
    pub fn bearer_token(&self) -> Option<&str> {
        self.headers
            .get(AUTHORIZATION)?
            .to_str()
            .ok()?
            .strip_prefix("Bearer ")
    }

    /// Resolve the request path against a base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is empty or is itself an absolute URL.
    pub fn url(&self, base: &ApiUrl) -> Result<String, Error> {
        if self.path.trim_matches('/').is_empty() {
            return Err(InvalidInputError::Path {
                value: self.path.clone(),
                reason: "must not be empty".to_string(),
            }
            .into());
        }
        if self.path.contains("://") {
            return Err(InvalidInputError::Path {
                value: self.path.clone(),
                reason: "must be relative to the API base URL".to_string(),
            }
            .into());
        }
        Ok(base.endpoint(&self.path))
    }
}

/// A fully buffered API response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

/// Error body format used by the backend.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl ApiResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Returns true for 401 and 403.
    pub fn is_auth_failure(&self) -> bool {
        self.status == StatusCode::UNAUTHORIZED || self.status == StatusCode::FORBIDDEN
    }

    /// Decode the body as JSON.
    ///
    /// An empty body decodes as JSON `null`, so `()` and `Option<T>` targets
    /// work for endpoints that answer without content.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        if self.body.is_empty() {
            return Ok(serde_json::from_value(serde_json::Value::Null)?);
        }
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Build the protocol error describing this response.
    pub fn protocol_error(&self) -> ProtocolError {
        match serde_json::from_slice::<ErrorBody>(&self.body) {
            Ok(body) => ProtocolError::new(self.status.as_u16(), body.error, body.message),
            Err(_) => ProtocolError::new(self.status.as_u16(), None, None),
        }
    }
}
