//! Client configuration.

use std::time::Duration;

use fintrack_core::ApiUrl;

/// Default per-call timeout, applied independently to originals, refreshes and replays.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default refresh endpoint path.
pub const DEFAULT_REFRESH_PATH: &str = "/auth/refresh-token";

/// Default login endpoint path.
pub const DEFAULT_LOGIN_PATH: &str = "/auth/login";

/// Configuration for an [`ApiClient`](crate::ApiClient).
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use fintrack_core::ApiUrl;
/// use fintrack_http::ClientConfig;
///
/// let config = ClientConfig::new(ApiUrl::new("https://api.example.com").unwrap())
///     .with_request_timeout(Duration::from_secs(10));
/// assert_eq!(config.request_timeout(), Duration::from_secs(10));
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    base_url: ApiUrl,
    request_timeout: Duration,
    refresh_path: String,
    login_path: String,
    user_agent: String,
}

impl ClientConfig {
    pub fn new(base_url: ApiUrl) -> Self {
        Self {
            base_url,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            refresh_path: DEFAULT_REFRESH_PATH.to_string(),
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            user_agent: concat!("fintrack/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_refresh_path(mut self, path: impl Into<String>) -> Self {
        self.refresh_path = path.into();
        self
    }

    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn base_url(&self) -> &ApiUrl {
        &self.base_url
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn refresh_path(&self) -> &str {
        &self.refresh_path
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }
}
