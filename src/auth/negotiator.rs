//! Per-client credential selection and digest renegotiation.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use reqwest::header::HeaderMap;
use tracing::{debug, instrument};

use super::challenge::challenge_from;
use super::credentials::{Credential, Credentials};
use super::digest::DigestCredential;

/// Computes `Authorization` headers for one client instance.
///
/// A bearer token, when configured, is fixed for the lifetime of the
/// negotiator and always wins. Otherwise the most recently negotiated digest
/// credential is used; it lives behind a lock because concurrent calls on the
/// same client may renegotiate at the same time.
pub struct CredentialNegotiator {
    credentials: Option<Credentials>,
    bearer_token: Option<String>,
    cached_digest: Mutex<Option<DigestCredential>>,
}

impl CredentialNegotiator {
    /// Creates a negotiator from the configured secrets.
    #[must_use]
    pub fn new(credentials: Option<Credentials>, bearer_token: Option<String>) -> Self {
        Self {
            credentials,
            bearer_token,
            cached_digest: Mutex::new(None),
        }
    }

    /// Creates a negotiator that never authenticates.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::new(None, None)
    }

    /// The credential the next request should carry.
    #[must_use]
    pub fn current(&self) -> Credential {
        if let Some(token) = &self.bearer_token {
            return Credential::Bearer(token.clone());
        }
        self.lock_digest()
            .clone()
            .map_or(Credential::None, Credential::Digest)
    }

    /// The currently cached digest credential, if any.
    #[must_use]
    pub fn cached_digest(&self) -> Option<DigestCredential> {
        self.lock_digest().clone()
    }

    /// Builds the `Authorization` header value for a credential.
    ///
    /// Digest credentials need a username and password; without them the
    /// request goes out unauthenticated.
    #[must_use]
    pub fn header_for(&self, credential: &Credential, method: &str, uri: &str) -> Option<String> {
        match credential {
            Credential::None => None,
            Credential::Bearer(token) => Some(format!("Bearer {token}")),
            Credential::Digest(digest) => self
                .credentials
                .as_ref()
                .map(|credentials| digest.authorization(credentials, method, uri)),
        }
    }

    /// Derives a new digest credential from a 401 response's challenge.
    ///
    /// Returns `true` when the request is worth retrying with [`current`](Self::current).
    /// The cache is only swapped if it still holds `used`; when a concurrent
    /// call has already replaced it, that newer credential is kept and the
    /// caller retries with it. A challenge identical to the one just used
    /// means the server rejected the secret itself, so nothing changes.
    #[instrument(skip(self, used, headers))]
    pub fn renegotiate(&self, used: &Credential, headers: &HeaderMap) -> bool {
        if self.bearer_token.is_some() {
            debug!("bearer token configured, digest renegotiation skipped");
            return false;
        }
        if self.credentials.is_none() {
            debug!("no credentials configured, cannot answer challenge");
            return false;
        }
        let Some(challenge) = challenge_from(headers) else {
            debug!("no usable digest challenge in response");
            return false;
        };
        let Some(negotiated) = DigestCredential::from_challenge(&challenge) else {
            return false;
        };

        let mut cached = self.lock_digest();
        if cached.as_ref() != used.as_digest() {
            debug!("digest already renegotiated by a concurrent call");
            return cached.is_some();
        }
        if used.as_digest() == Some(&negotiated) {
            debug!(realm = negotiated.realm(), "server repeated the rejected challenge");
            return false;
        }
        debug!(realm = negotiated.realm(), "negotiated new digest credential");
        *cached = Some(negotiated);
        true
    }

    fn lock_digest(&self) -> MutexGuard<'_, Option<DigestCredential>> {
        self.cached_digest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for CredentialNegotiator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialNegotiator")
            .field("credentials", &self.credentials)
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "[REDACTED]"))
            .field("cached_digest", &self.cached_digest())
            .finish()
    }
}
