//! Authentication: bearer tokens and digest challenge-response.
//!
//! This module turns configured secrets and server challenges into
//! `Authorization` header values.
//!
//! - [`Credentials`] - username/password used for digest responses
//! - [`Credential`] - what a single request is sent with (none, bearer, digest)
//! - [`CredentialNegotiator`] - per-client selection and renegotiation
//! - [`parse_challenge`] / [`challenge_from`] - `WWW-Authenticate` parsing

mod challenge;
mod credentials;
mod digest;
mod negotiator;

pub use challenge::{Challenge, challenge_from, parse_challenge};
pub use credentials::{Credential, Credentials};
pub use digest::{DigestAlgorithm, DigestCredential, NONCE_COUNT, Qop, generate_cnonce};
pub use negotiator::CredentialNegotiator;
