//! Wsgate Core Library
//!
//! Client-side access layer for rate-limited, paginated web services that
//! authenticate with either a bearer token or HTTP digest challenges.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`transport`] - Process-wide throttle, request execution, error classification
//! - [`auth`] - Bearer and digest credentials, challenge parsing and negotiation
//! - [`paging`] - Limit/offset cursors and lazy result streams
//! - [`config`] - Client configuration
//!
//! Resource catalogs (search, browse, lookup methods) and entity models live
//! outside this crate; they hand the core a [`paging::ResourceQuery`] and a
//! [`paging::PageDecoder`].

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod config;
pub mod paging;
pub mod transport;
mod user_agent;

// Re-export commonly used types
pub use auth::{Credential, Credentials, CredentialNegotiator};
pub use config::ClientConfig;
pub use paging::{
    CursorState, JsonListDecoder, Page, PageCursor, PageDecoder, PageOptions, PageSize,
    ResourceQuery, ResultStream,
};
pub use transport::{
    ApiClient, ApiError, ApiRequest, ApiResponse, RequestThrottle, ResponseError,
    classify_response,
};
pub use user_agent::UserAgent;
