//! User secrets and the credential presented on a request.

use std::fmt;

use serde::Deserialize;

use super::digest::DigestCredential;

/// Username and password used to answer digest challenges.
///
/// `Debug` output redacts the password.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    /// Creates a credential pair.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// The account name.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    pub(crate) fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// The credential a single request is sent with.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Unauthenticated.
    None,
    /// Pre-issued opaque token, presented verbatim.
    Bearer(String),
    /// Negotiated digest state from the latest server challenge.
    Digest(DigestCredential),
}

impl Credential {
    /// Returns the digest state, if this is a digest credential.
    #[must_use]
    pub fn as_digest(&self) -> Option<&DigestCredential> {
        match self {
            Self::Digest(digest) => Some(digest),
            _ => None,
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Bearer(_) => f.write_str("Bearer([REDACTED])"),
            Self::Digest(digest) => f.debug_tuple("Digest").field(digest).finish(),
        }
    }
}
