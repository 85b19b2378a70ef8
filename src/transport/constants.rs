//! Constants for the transport layer (timeouts, throttling, paging bounds).

use std::time::Duration;

/// Default web service root used when the configuration names none.
pub const DEFAULT_BASE_URL: &str = "https://musicbrainz.org/ws/2/";

/// Default HTTP connect timeout (10 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default HTTP read timeout (30 seconds).
pub const READ_TIMEOUT_SECS: u64 = 30;

/// Default minimum spacing between any two outbound requests.
pub const DEFAULT_THROTTLE_INTERVAL: Duration = Duration::from_secs(1);

/// Maximum Retry-After header value (1 hour) to prevent excessive delays.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);

/// Smallest page size the server accepts.
pub const MIN_PAGE_SIZE: u32 = 1;

/// Largest page size the server accepts.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Page size used when the caller does not ask for one.
pub const DEFAULT_PAGE_SIZE: u32 = 25;
