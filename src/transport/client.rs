//! Request execution: credentials, throttling, sending and the single auth retry.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::auth::CredentialNegotiator;
use crate::config::ClientConfig;

use super::classify::classify_with_headers;
use super::error::ApiError;
use super::request::{ApiRequest, ApiResponse};
use super::throttle::RequestThrottle;

/// Client for a rate-limited web service.
///
/// Cheap to clone; clones share the HTTP connection pool and the cached
/// digest credential. Separate `ApiClient::new` calls never share digest state,
/// but all of them share the process-wide [`RequestThrottle`] unless one is
/// injected with [`ApiClient::with_throttle`].
///
/// # Example
///
/// ```no_run
/// use wsgate_core::{ApiClient, ApiRequest, ClientConfig, UserAgent};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ClientConfig::default().with_user_agent(UserAgent::new("tagger", "1.0"));
/// let client = ApiClient::new(config)?;
/// let response = client
///     .execute(&ApiRequest::get("artist").query("query", "nirvana").query("fmt", "json"))
///     .await?;
/// println!("{}", response.text());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

#[derive(Debug)]
struct ClientInner {
    http: Client,
    base_url: Url,
    negotiator: CredentialNegotiator,
    throttle: Arc<RequestThrottle>,
}

impl ApiClient {
    /// Creates a client that shares the process-wide throttle.
    ///
    /// A configured throttle interval is applied to the process-wide throttle.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidUrl`] for a malformed base URL and
    /// [`ApiError::ClientBuild`] when the HTTP client cannot be constructed.
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        Self::with_throttle(config, RequestThrottle::global())
    }

    /// Creates a client that uses the given throttle instead of the process-wide one.
    ///
    /// # Errors
    ///
    /// Same as [`ApiClient::new`].
    #[instrument(skip_all, fields(base_url = %config.base_url))]
    pub fn with_throttle(
        config: ClientConfig,
        throttle: Arc<RequestThrottle>,
    ) -> Result<Self, ApiError> {
        let base_url = parse_base_url(&config.base_url)?;

        if config.user_agent.has_control_characters() {
            return Err(ApiError::ClientBuild {
                reason: "user agent contains control characters".to_string(),
            });
        }

        let http = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.read_timeout_secs))
            .user_agent(config.user_agent.header_value())
            .gzip(true)
            .build()
            .map_err(|error| ApiError::ClientBuild {
                reason: error.to_string(),
            })?;

        if let Some(interval) = config.throttle_interval() {
            throttle.set_minimum_interval(interval);
        }

        debug!("created API client");
        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                base_url,
                negotiator: CredentialNegotiator::new(config.credentials, config.bearer_token),
                throttle,
            }),
        })
    }

    /// The throttle every request of this client passes through.
    #[must_use]
    pub fn throttle(&self) -> &Arc<RequestThrottle> {
        &self.inner.throttle
    }

    /// The credential negotiator holding this client's digest state.
    #[must_use]
    pub fn negotiator(&self) -> &CredentialNegotiator {
        &self.inner.negotiator
    }

    /// Resolves a request's path and query against the base URL.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidUrl`] when the path cannot be joined.
    pub fn url_for(&self, request: &ApiRequest) -> Result<Url, ApiError> {
        let mut url = self
            .inner
            .base_url
            .join(request.path().trim_start_matches('/'))
            .map_err(|_| ApiError::invalid_url(request.path()))?;
        if !request.query_pairs().is_empty() {
            url.query_pairs_mut().extend_pairs(request.query_pairs());
        }
        Ok(url)
    }

    /// Performs one logical request.
    ///
    /// Every attempt passes through the throttle. A 401 carrying a usable
    /// digest challenge that differs from the credential just used is retried
    /// exactly once with the renegotiated credential; any other failure is
    /// classified and returned.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Response`] for non-2xx answers and
    /// [`ApiError::Network`] / [`ApiError::Timeout`] for transport failures.
    #[instrument(skip(self, request), fields(method = %request.method(), path = request.path()))]
    pub async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        let url = self.url_for(request)?;
        let uri = request_uri(&url);
        let negotiator = &self.inner.negotiator;
        let mut already_retried = false;

        loop {
            let credential = negotiator.current();
            let authorization = negotiator.header_for(&credential, request.method().as_str(), &uri);

            let permit = self.inner.throttle.acquire().await;
            debug!(
                waited_ms = permit.waited().as_millis(),
                authenticated = authorization.is_some(),
                retry = already_retried,
                "sending request"
            );

            let mut builder = self.inner.http.request(request.method().clone(), url.clone());
            if let Some(value) = authorization {
                builder = builder.header(AUTHORIZATION, value);
            }
            if let Some(body) = request.request_body() {
                builder = builder
                    .header(CONTENT_TYPE, body.content_type())
                    .body(body.bytes().to_vec());
            }

            let response = builder
                .send()
                .await
                .map_err(|error| ApiError::network(url.as_str(), error))?;
            let status = response.status();
            let headers = response.headers().clone();
            let body = response
                .text()
                .await
                .map_err(|error| ApiError::network(url.as_str(), error))?;

            if status.is_success() {
                debug!(status = status.as_u16(), bytes = body.len(), "request succeeded");
                return Ok(ApiResponse::new(status.as_u16(), headers, body));
            }

            if status == StatusCode::UNAUTHORIZED
                && !already_retried
                && negotiator.renegotiate(&credential, &headers)
            {
                debug!("retrying once with renegotiated digest credential");
                already_retried = true;
                continue;
            }

            let error = classify_with_headers(status.as_u16(), &headers, &body);
            warn!(
                status = error.status,
                message = error.message.as_deref().unwrap_or_default(),
                "request failed"
            );
            return Err(ApiError::response(url.as_str(), error));
        }
    }

    /// Like [`execute`](Self::execute), but gives up when `token` is cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Cancelled`] on cancellation, otherwise the errors of
    /// [`execute`](Self::execute).
    pub async fn execute_cancellable(
        &self,
        request: &ApiRequest,
        token: &CancellationToken,
    ) -> Result<ApiResponse, ApiError> {
        tokio::select! {
            biased;
            () = token.cancelled() => {
                let url = self
                    .url_for(request)
                    .map_or_else(|_| request.path().to_string(), String::from);
                debug!(url = %url, "request cancelled by caller");
                Err(ApiError::cancelled(url))
            }
            result = self.execute(request) => result,
        }
    }
}

fn parse_base_url(base_url: &str) -> Result<Url, ApiError> {
    let mut normalized = base_url.trim().to_string();
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    let url = Url::parse(&normalized).map_err(|_| ApiError::invalid_url(base_url))?;
    if url.cannot_be_a_base() {
        return Err(ApiError::invalid_url(base_url));
    }
    Ok(url)
}

/// The request-URI as it appears on the request line (path plus query).
fn request_uri(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{query}", url.path()),
        None => url.path().to_string(),
    }
}
