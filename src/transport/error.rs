//! Error types for the transport layer.
//!
//! Every failure of a logical call is reported as a single [`ApiError`]. Non-2xx
//! responses carry a fully classified [`ResponseError`].

use std::time::Duration;

use thiserror::Error;

/// A non-success HTTP response, classified for callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("HTTP {status} {reason}{}", .message.as_ref().map(|m| format!(": {m}")).unwrap_or_default())]
pub struct ResponseError {
    /// The HTTP status code.
    pub status: u16,
    /// Canonical reason phrase for the status (empty when unknown).
    pub reason: String,
    /// Message reported by the server, if the body carried one.
    pub message: Option<String>,
    /// Server-mandated wait, parsed from a `Retry-After` header.
    pub retry_after: Option<Duration>,
}

impl ResponseError {
    /// Whether the server rejected the request's credentials.
    #[must_use]
    pub fn is_authentication(&self) -> bool {
        self.status == 401
    }

    /// Whether the requested resource does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }

    /// Whether the server is shedding load (429, or 503 as used by rate-limited services).
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self.status, 429 | 503)
    }

    /// Whether the failure is a 5xx.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }
}

/// Errors that can occur while talking to the web service.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error requesting {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout requesting {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// The server answered with a non-success status.
    #[error("{url} failed: {source}")]
    Response {
        /// The URL that failed.
        url: String,
        /// Classified response details.
        #[source]
        source: ResponseError,
    },

    /// A success response whose body could not be decoded into a page.
    #[error("unexpected response from {url}: {reason}")]
    Decode {
        /// The URL whose response was malformed.
        url: String,
        /// What went wrong while decoding.
        reason: String,
    },

    /// The resource path could not be joined onto the base URL.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The offending URL or path.
        url: String,
    },

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client construction failed: {reason}")]
    ClientBuild {
        /// Why construction failed.
        reason: String,
    },

    /// The caller cancelled the request before it completed.
    #[error("request to {url} was cancelled")]
    Cancelled {
        /// The URL whose request was cancelled.
        url: String,
    },
}

impl ApiError {
    /// Creates a network error from a reqwest error, mapping timeouts to [`ApiError::Timeout`].
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            return Self::Timeout { url: url.into() };
        }
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Wraps a classified response error.
    pub fn response(url: impl Into<String>, source: ResponseError) -> Self {
        Self::Response {
            url: url.into(),
            source,
        }
    }

    /// Creates a decode error.
    pub fn decode(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Decode {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates a cancellation error.
    pub fn cancelled(url: impl Into<String>) -> Self {
        Self::Cancelled { url: url.into() }
    }

    /// Returns the classified response, if the server answered with an error status.
    #[must_use]
    pub fn as_response(&self) -> Option<&ResponseError> {
        match self {
            Self::Response { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Returns the HTTP status, if the server answered with an error status.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        self.as_response().map(|response| response.status)
    }

    /// Whether the call ended because the caller cancelled it.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

// No `From<reqwest::Error>`: every variant needs the request URL, which the
// source error does not always carry.
