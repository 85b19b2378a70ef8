//! Request pipeline: throttling, execution and error classification.
//!
//! # Features
//!
//! - Process-wide minimum-interval throttle shared by every client
//! - Transparent upgrade from unauthenticated to digest-authenticated requests
//!   (one retry per logical call)
//! - Bearer token support
//! - Typed errors with the server's own message extracted from the body
//!
//! # Example
//!
//! ```no_run
//! use wsgate_core::transport::{ApiClient, ApiRequest};
//! use wsgate_core::ClientConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ApiClient::new(ClientConfig::default())?;
//! let response = client.execute(&ApiRequest::get("genre/all").query("fmt", "json")).await?;
//! println!("{}", response.text());
//! # Ok(())
//! # }
//! ```

mod classify;
mod client;
pub mod constants;
mod error;
mod request;
mod throttle;

pub use classify::{classify_response, parse_retry_after};
pub use client::ApiClient;
pub use error::{ApiError, ResponseError};
pub use request::{ApiRequest, ApiResponse, RequestBody};
pub use throttle::{RequestThrottle, ThrottlePermit};

// Note: no module-local Result alias. Use `Result<T, ApiError>` explicitly.
