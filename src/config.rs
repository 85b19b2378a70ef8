//! Client configuration.
//!
//! [`ClientConfig`] is plain data: it can be built in code with the `with_*`
//! helpers or deserialized from whatever configuration source the embedding
//! application uses. Missing fields fall back to defaults.

use std::fmt;
use std::time::Duration;

use serde::Deserialize;

use crate::auth::Credentials;
use crate::transport::constants::{CONNECT_TIMEOUT_SECS, DEFAULT_BASE_URL, READ_TIMEOUT_SECS};
use crate::user_agent::UserAgent;

/// Settings for one [`ApiClient`](crate::transport::ApiClient) instance.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Web service root; resource paths are joined onto it.
    pub base_url: String,
    /// Application identity for the User-Agent header.
    pub user_agent: UserAgent,
    /// TCP connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Whole-request timeout in seconds.
    pub read_timeout_secs: u64,
    /// When set, applied to the process-wide throttle at client construction.
    pub throttle_interval_ms: Option<u64>,
    /// Username and password for digest challenges.
    pub credentials: Option<Credentials>,
    /// Pre-issued bearer token; takes priority over digest authentication.
    pub bearer_token: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: UserAgent::default(),
            connect_timeout_secs: CONNECT_TIMEOUT_SECS,
            read_timeout_secs: READ_TIMEOUT_SECS,
            throttle_interval_ms: None,
            credentials: None,
            bearer_token: None,
        }
    }
}

impl ClientConfig {
    /// Points the client at another service root.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the application identity.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: UserAgent) -> Self {
        self.user_agent = user_agent;
        self
    }

    /// Sets digest credentials.
    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Sets a bearer token.
    #[must_use]
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Sets connect and read timeouts.
    #[must_use]
    pub fn with_timeouts(mut self, connect_timeout_secs: u64, read_timeout_secs: u64) -> Self {
        self.connect_timeout_secs = connect_timeout_secs;
        self.read_timeout_secs = read_timeout_secs;
        self
    }

    /// Sets the interval applied to the process-wide throttle.
    #[must_use]
    pub fn with_throttle_interval(mut self, interval: Duration) -> Self {
        self.throttle_interval_ms = Some(u64::try_from(interval.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// The configured throttle interval, if any.
    #[must_use]
    pub fn throttle_interval(&self) -> Option<Duration> {
        self.throttle_interval_ms.map(Duration::from_millis)
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("user_agent", &self.user_agent)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("read_timeout_secs", &self.read_timeout_secs)
            .field("throttle_interval_ms", &self.throttle_interval_ms)
            .field("credentials", &self.credentials)
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}
