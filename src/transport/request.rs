//! Request and response values exchanged with the executor.

use reqwest::Method;
use reqwest::header::{CONTENT_TYPE, HeaderMap};
use serde::de::DeserializeOwned;

/// One logical request: method, resource path, query and optional body.
///
/// Paths are relative to the client's base URL.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<RequestBody>,
}

/// Submission payload for write requests.
#[derive(Debug, Clone)]
pub struct RequestBody {
    content_type: String,
    bytes: Vec<u8>,
}

impl RequestBody {
    /// MIME type sent as `Content-Type`.
    #[must_use]
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Raw payload.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl ApiRequest {
    /// Creates a request with an arbitrary method.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    /// Creates a `GET` request.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// Appends a query parameter.
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Appends several query parameters.
    #[must_use]
    pub fn queries<K, V>(mut self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.query
            .extend(pairs.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Attaches a body.
    #[must_use]
    pub fn body(mut self, content_type: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.body = Some(RequestBody {
            content_type: content_type.into(),
            bytes: bytes.into(),
        });
        self
    }

    /// HTTP method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Resource path relative to the base URL.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Query parameters in insertion order.
    #[must_use]
    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    /// Request body, if any.
    #[must_use]
    pub fn request_body(&self) -> Option<&RequestBody> {
        self.body.as_ref()
    }
}

/// A successful (2xx) response with its body read into memory.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: u16,
    headers: HeaderMap,
    body: String,
}

impl ApiResponse {
    pub(crate) fn new(status: u16, headers: HeaderMap, body: String) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// HTTP status code.
    #[must_use]
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Response headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The `Content-Type` header, if present and readable.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
    }

    /// Body text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.body
    }

    /// Consumes the response, returning the body text.
    #[must_use]
    pub fn into_text(self) -> String {
        self.body
    }

    /// Deserializes the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error when the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}
