//! reqwest-backed transport.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, instrument, trace};

use fintrack_core::error::{Error, TransportError};
use fintrack_core::{ApiRequest, ApiResponse, ApiUrl, Result, Transport};

use crate::config::ClientConfig;

/// HTTP transport for API requests.
///
/// Every call carries the configured timeout on its own; a refresh that times
/// out fails the same way as any other refresh error.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: ApiUrl,
    timeout: Duration,
}

impl HttpTransport {
    /// Build a transport from client configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be initialized
    /// (for example when no TLS backend is available).
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent())
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| TransportError::Http {
                message: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url().clone(),
            timeout: config.request_timeout(),
        })
    }

    /// Returns the base URL this transport resolves paths against.
    pub fn base_url(&self) -> &ApiUrl {
        &self.base_url
    }

    fn map_error(&self, err: reqwest::Error) -> Error {
        let transport = if err.is_timeout() {
            TransportError::Timeout {
                duration_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            }
        } else if err.is_connect() {
            TransportError::Connection {
                message: err.to_string(),
            }
        } else {
            TransportError::Http {
                message: err.to_string(),
            }
        };
        Error::Transport(transport)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(skip(self, request), fields(method = %request.method(), path = request.path()))]
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let url = request.url(&self.base_url)?;
        debug!(retried = request.is_retried(), "HTTP request");

        let mut builder = self
            .client
            .request(request.method().clone(), &url)
            .headers(request.headers().clone());
        if let Some(body) = request.body() {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| self.map_error(e))?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(|e| self.map_error(e))?;

        trace!(status = %status, bytes = body.len(), "HTTP response");
        Ok(ApiResponse::new(status, headers, body))
    }
}
