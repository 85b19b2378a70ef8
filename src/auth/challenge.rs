//! Parsing of `WWW-Authenticate` digest challenges.
//!
//! The grammar is deliberately permissive: a scheme token followed by a
//! comma-separated list of `key=value` or `key="value"` pairs. One malformed
//! pair is tolerated and skipped; a second one makes the whole challenge
//! unusable.

use std::collections::BTreeMap;

use reqwest::header::{HeaderMap, WWW_AUTHENTICATE};
use tracing::debug;

/// Number of malformed pairs a challenge may contain and still be accepted.
const MAX_MALFORMED_PAIRS: usize = 1;

/// Server-issued digest challenge attributes, keyed by lowercase name.
///
/// Always contains `realm` and `nonce`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    attributes: BTreeMap<String, String>,
}

impl Challenge {
    /// Returns an attribute by (case-insensitive) name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.attributes
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Protection space the credentials apply to.
    #[must_use]
    pub fn realm(&self) -> &str {
        self.get("realm").unwrap_or_default()
    }

    /// Server nonce for this challenge.
    #[must_use]
    pub fn nonce(&self) -> &str {
        self.get("nonce").unwrap_or_default()
    }

    /// Opaque value to echo back, if the server sent one.
    #[must_use]
    pub fn opaque(&self) -> Option<&str> {
        self.get("opaque")
    }

    /// Advertised hash algorithm, if any.
    #[must_use]
    pub fn algorithm(&self) -> Option<&str> {
        self.get("algorithm")
    }

    /// Advertised quality-of-protection values.
    pub fn qop(&self) -> impl Iterator<Item = &str> {
        self.get("qop")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

/// Extracts the first usable digest challenge from response headers.
///
/// Non-digest schemes and digest values that fail to parse are skipped.
#[must_use]
pub fn challenge_from(headers: &HeaderMap) -> Option<Challenge> {
    headers
        .get_all(WWW_AUTHENTICATE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter(|value| is_digest_scheme(value))
        .find_map(parse_challenge)
}

/// Parses a single `WWW-Authenticate` value using the digest scheme.
///
/// Returns `None` when the scheme is not `Digest`, when `realm` or `nonce` is
/// missing, or when more than one pair is malformed.
///
/// # Examples
///
/// ```
/// use wsgate_core::auth::parse_challenge;
///
/// let challenge = parse_challenge(r#"Digest realm="r", nonce="n1", qop="auth""#).unwrap();
/// assert_eq!(challenge.realm(), "r");
/// assert_eq!(challenge.nonce(), "n1");
/// assert!(parse_challenge(r#"Digest realm="r""#).is_none());
/// ```
#[must_use]
pub fn parse_challenge(header_value: &str) -> Option<Challenge> {
    let header_value = header_value.trim();
    if !is_digest_scheme(header_value) {
        return None;
    }
    let params = header_value
        .split_once(char::is_whitespace)
        .map_or("", |(_, rest)| rest);

    let mut attributes = BTreeMap::new();
    let mut malformed = 0_usize;

    for item in split_list(params) {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }
        let pair = item
            .split_once('=')
            .filter(|(key, _)| !key.trim().is_empty())
            .and_then(|(key, value)| Some((key, unquote(value.trim())?)));
        match pair {
            Some((key, value)) => {
                attributes.insert(key.trim().to_ascii_lowercase(), value);
            }
            None => {
                debug!(item, "malformed challenge pair");
                malformed += 1;
            }
        }
    }

    if malformed > MAX_MALFORMED_PAIRS {
        debug!(malformed, "too many malformed challenge pairs");
        return None;
    }
    if !attributes.contains_key("realm") || !attributes.contains_key("nonce") {
        debug!("challenge lacks realm or nonce");
        return None;
    }

    Some(Challenge { attributes })
}

fn is_digest_scheme(header_value: &str) -> bool {
    header_value
        .split_whitespace()
        .next()
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("digest"))
}

/// Splits on commas that are not inside a quoted string.
fn split_list(input: &str) -> Vec<&str> {
    let mut items = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut escaped = false;

    for (index, ch) in input.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                items.push(&input[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }
    items.push(&input[start..]);
    items
}

/// Strips quotes and escapes from a value.
///
/// Returns `None` for a stray quote, such as two pairs run together without
/// a separating comma.
fn unquote(value: &str) -> Option<String> {
    let Some(rest) = value.strip_prefix('"') else {
        return (!value.contains('"')).then(|| value.to_string());
    };

    let mut out = String::with_capacity(rest.len());
    let mut chars = rest.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => out.push(chars.next()?),
            '"' => return chars.as_str().is_empty().then_some(out),
            _ => out.push(ch),
        }
    }
    None
}
