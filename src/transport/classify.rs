//! Classification of failed responses into [`ResponseError`]s.
//!
//! The classifier never fails: a body it cannot interpret is reported
//! verbatim as the server message.
//!
//! # Example
//!
//! ```
//! use wsgate_core::transport::classify_response;
//!
//! let error = classify_response(
//!     401,
//!     "Unauthorized",
//!     r#"{"error":"invalid","help":"bad token"}"#,
//!     Some("application/json"),
//! );
//! assert_eq!(error.message.as_deref(), Some("invalid (bad token)"));
//! ```

use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, HeaderMap, RETRY_AFTER};
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use super::constants::MAX_RETRY_AFTER;
use super::error::ResponseError;

/// Error payload shapes the service returns.
///
/// Either `{error, help}` or the OAuth-style `{error, error_description}`.
#[derive(Debug, Deserialize)]
struct ErrorPayload {
    error: Option<String>,
    help: Option<String>,
    error_description: Option<String>,
}

/// Builds a [`ResponseError`] from the parts of a failed response.
///
/// Structured (JSON) bodies with both a machine and a human field become
/// `"{error} ({description})"`; any other non-empty body is used verbatim; an
/// empty body yields no message.
#[must_use]
#[instrument(skip(body), fields(body_len = body.len()))]
pub fn classify_response(
    status: u16,
    reason: &str,
    body: &str,
    content_type: Option<&str>,
) -> ResponseError {
    ResponseError {
        status,
        reason: reason.to_string(),
        message: extract_message(body, content_type),
        retry_after: None,
    }
}

/// Classifies a failed response using its headers for content type and `Retry-After`.
#[must_use]
pub(crate) fn classify_with_headers(status: u16, headers: &HeaderMap, body: &str) -> ResponseError {
    let reason = reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
        .unwrap_or_default();
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok());

    let mut error = classify_response(status, reason, body, content_type);
    error.retry_after = headers
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_retry_after);
    error
}

fn extract_message(body: &str, content_type: Option<&str>) -> Option<String> {
    if body.trim().is_empty() {
        return None;
    }

    if content_type.is_some_and(is_json_content_type) {
        match serde_json::from_str::<ErrorPayload>(body) {
            Ok(ErrorPayload {
                error: Some(error),
                help,
                error_description,
            }) => {
                if let Some(description) = help.or(error_description) {
                    return Some(format!("{error} ({description})"));
                }
            }
            Ok(_) => debug!("error payload lacks expected fields, using raw body"),
            Err(error) => debug!(error = %error, "unparseable error payload, using raw body"),
        }
    }

    Some(body.to_string())
}

fn is_json_content_type(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(str::trim)
        .is_some_and(|mime| {
            mime.eq_ignore_ascii_case("application/json")
                || mime.to_ascii_lowercase().ends_with("+json")
        })
}

/// Parses a Retry-After header value into a Duration.
///
/// Supports integer seconds and HTTP-dates (RFC 7231). Values above one hour
/// are capped; dates in the past yield zero; anything else yields `None`.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use wsgate_core::transport::parse_retry_after;
///
/// assert_eq!(parse_retry_after("120"), Some(Duration::from_secs(120)));
/// assert_eq!(parse_retry_after("soon"), None);
/// ```
#[must_use]
pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
    let header_value = header_value.trim();

    if let Ok(seconds) = header_value.parse::<i64>() {
        let seconds = u64::try_from(seconds).ok()?;
        return Some(Duration::from_secs(seconds).min(MAX_RETRY_AFTER));
    }

    let Ok(when) = httpdate::parse_http_date(header_value) else {
        debug!(header_value, "unparseable Retry-After value");
        return None;
    };
    let delay = when
        .duration_since(std::time::SystemTime::now())
        .unwrap_or(Duration::ZERO);
    if delay > MAX_RETRY_AFTER {
        warn!(
            delay_secs = delay.as_secs(),
            "Retry-After date exceeds maximum, capping at 1 hour"
        );
    }
    Some(delay.min(MAX_RETRY_AFTER))
}
