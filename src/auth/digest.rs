//! Digest access authentication (RFC 2617, MD5 only).
//!
//! A [`DigestCredential`] is the negotiated state derived from one server
//! challenge. It is combined with the user's secret and the request method
//! and URI to produce an `Authorization` header value.

use std::time::{SystemTime, UNIX_EPOCH};

use md5::{Digest, Md5};
use rand::RngCore;
use sha2::Sha256;
use tracing::debug;

use super::challenge::Challenge;
use super::credentials::Credentials;

/// Request counter sent with every qop response.
///
/// Digest state is never persisted, so every negotiated credential starts at 1.
pub const NONCE_COUNT: &str = "00000001";

/// Length of the generated client nonce, in hex characters.
const CNONCE_LEN: usize = 16;

/// Hash algorithms the client can answer a challenge with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    /// Plain MD5 (the default when the server names no algorithm).
    Md5,
}

impl DigestAlgorithm {
    /// Maps an advertised algorithm name, `None` meaning the default.
    #[must_use]
    pub fn negotiate(advertised: Option<&str>) -> Option<Self> {
        match advertised {
            None => Some(Self::Md5),
            Some(name) if name.eq_ignore_ascii_case("md5") => Some(Self::Md5),
            Some(_) => None,
        }
    }

    /// Name used in the `algorithm` directive.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Md5 => "MD5",
        }
    }

    fn hex_digest(self, data: &str) -> String {
        match self {
            Self::Md5 => hex::encode(Md5::digest(data.as_bytes())),
        }
    }
}

/// Quality-of-protection modes the client supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Qop {
    /// Authentication only.
    Auth,
}

impl Qop {
    fn as_str(self) -> &'static str {
        match self {
            Self::Auth => "auth",
        }
    }
}

/// Negotiated digest parameters for one server challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestCredential {
    realm: String,
    nonce: String,
    opaque: Option<String>,
    algorithm: DigestAlgorithm,
    qop: Option<Qop>,
}

impl DigestCredential {
    /// Derives credential state from a challenge.
    ///
    /// Returns `None` when the challenge asks for an unsupported algorithm or
    /// offers qop values without `auth`.
    #[must_use]
    pub fn from_challenge(challenge: &Challenge) -> Option<Self> {
        let Some(algorithm) = DigestAlgorithm::negotiate(challenge.algorithm()) else {
            debug!(algorithm = ?challenge.algorithm(), "unsupported digest algorithm");
            return None;
        };

        let qop = if challenge.get("qop").is_some() {
            if !challenge.qop().any(|value| value.eq_ignore_ascii_case("auth")) {
                debug!(qop = ?challenge.get("qop"), "unsupported digest qop");
                return None;
            }
            Some(Qop::Auth)
        } else {
            None
        };

        Some(Self {
            realm: challenge.realm().to_string(),
            nonce: challenge.nonce().to_string(),
            opaque: challenge.opaque().map(str::to_string),
            algorithm,
            qop,
        })
    }

    /// Protection space.
    #[must_use]
    pub fn realm(&self) -> &str {
        &self.realm
    }

    /// Server nonce.
    #[must_use]
    pub fn nonce(&self) -> &str {
        &self.nonce
    }

    /// Negotiated quality of protection.
    #[must_use]
    pub fn qop(&self) -> Option<Qop> {
        self.qop
    }

    /// Computes the `response` directive for a request.
    ///
    /// `cnonce` only participates when qop is in play.
    #[must_use]
    pub fn response_hash(
        &self,
        credentials: &Credentials,
        method: &str,
        uri: &str,
        cnonce: &str,
    ) -> String {
        let ha1 = self.algorithm.hex_digest(&format!(
            "{}:{}:{}",
            credentials.username(),
            self.realm,
            credentials.password()
        ));
        let ha2 = self.algorithm.hex_digest(&format!("{method}:{uri}"));

        match self.qop {
            Some(qop) => self.algorithm.hex_digest(&format!(
                "{ha1}:{}:{NONCE_COUNT}:{cnonce}:{}:{ha2}",
                self.nonce,
                qop.as_str()
            )),
            None => self
                .algorithm
                .hex_digest(&format!("{ha1}:{}:{ha2}", self.nonce)),
        }
    }

    /// Builds the `Authorization` header value with a fresh client nonce.
    #[must_use]
    pub fn authorization(&self, credentials: &Credentials, method: &str, uri: &str) -> String {
        let cnonce = generate_cnonce(&self.nonce);
        self.authorization_with_cnonce(credentials, method, uri, &cnonce)
    }

    /// Builds the `Authorization` header value with a caller-supplied client nonce.
    #[must_use]
    pub fn authorization_with_cnonce(
        &self,
        credentials: &Credentials,
        method: &str,
        uri: &str,
        cnonce: &str,
    ) -> String {
        let response = self.response_hash(credentials, method, uri, cnonce);

        let mut header = format!(
            "Digest username=\"{}\", realm=\"{}\", nonce=\"{}\", uri=\"{}\", algorithm={}, response=\"{response}\"",
            quote(credentials.username()),
            quote(&self.realm),
            quote(&self.nonce),
            quote(uri),
            self.algorithm.as_str(),
        );
        if let Some(opaque) = &self.opaque {
            header.push_str(&format!(", opaque=\"{}\"", quote(opaque)));
        }
        if let Some(qop) = self.qop {
            header.push_str(&format!(
                ", qop={}, nc={NONCE_COUNT}, cnonce=\"{cnonce}\"",
                qop.as_str()
            ));
        }
        header
    }
}

/// Generates a fresh client nonce from the server nonce, the clock and random bytes.
#[must_use]
pub fn generate_cnonce(server_nonce: &str) -> String {
    let mut random = [0_u8; 8];
    rand::thread_rng().fill_bytes(&mut random);
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos())
        .unwrap_or_default();

    let mut hasher = Sha256::new();
    hasher.update(server_nonce.as_bytes());
    hasher.update(NONCE_COUNT.as_bytes());
    hasher.update(now.to_le_bytes());
    hasher.update(random);

    let mut cnonce = hex::encode(hasher.finalize());
    cnonce.truncate(CNONCE_LEN);
    cnonce
}

fn quote(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
