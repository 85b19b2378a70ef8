//! Process-wide request throttling.
//!
//! This module provides the [`RequestThrottle`] struct which enforces a minimum
//! interval between *any* two outbound requests, no matter which task or
//! client instance issues them.
//!
//! # Overview
//!
//! The throttle keeps a single admission timestamp. A caller is admitted once
//! at least `minimum_interval` has passed since the previous admission; the
//! timestamp is recorded at admission time, i.e. when the network phase of a
//! request starts, not when it completes.
//!
//! Waiting never holds the internal lock: a caller checks under the lock,
//! releases it, sleeps for the remaining gap and checks again. Ordering among
//! waiters is whoever re-checks first after waking.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use wsgate_core::transport::RequestThrottle;
//!
//! # async fn example() {
//! let throttle = Arc::new(RequestThrottle::new(Duration::from_secs(1)));
//!
//! // First request proceeds immediately
//! throttle.acquire().await;
//!
//! // Second request waits until one second after the first admission
//! throttle.acquire().await;
//! # }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use super::constants::DEFAULT_THROTTLE_INTERVAL;

/// Warning threshold for cumulative throttle delay (30 seconds).
const CUMULATIVE_DELAY_WARNING_THRESHOLD: Duration = Duration::from_secs(30);

static GLOBAL_THROTTLE: LazyLock<Arc<RequestThrottle>> =
    LazyLock::new(|| Arc::new(RequestThrottle::new(DEFAULT_THROTTLE_INTERVAL)));

/// Minimum-interval admission gate shared by every outbound request.
///
/// Designed to be wrapped in `Arc` and shared across Tokio tasks. The
/// process-wide instance is available through [`RequestThrottle::global`];
/// every [`ApiClient`](super::ApiClient) uses it unless another throttle is
/// injected.
#[derive(Debug)]
pub struct RequestThrottle {
    /// Admission bookkeeping, guarded for the read-check-write on admission.
    state: Mutex<ThrottleState>,

    /// Total time callers spent waiting (in milliseconds).
    cumulative_delay_ms: AtomicU64,
}

#[derive(Debug)]
struct ThrottleState {
    /// Start of the most recently admitted request. `None` until the first one.
    last_request: Option<Instant>,

    /// Minimum spacing between admissions. Zero disables throttling.
    minimum_interval: Duration,
}

/// Proof of admission returned by [`RequestThrottle::acquire`].
#[derive(Debug, Clone, Copy)]
pub struct ThrottlePermit {
    admitted_at: Instant,
    waited: Duration,
}

impl ThrottlePermit {
    /// Instant at which the request was admitted.
    #[must_use]
    pub fn admitted_at(&self) -> Instant {
        self.admitted_at
    }

    /// How long the caller waited before admission.
    #[must_use]
    pub fn waited(&self) -> Duration {
        self.waited
    }
}

impl RequestThrottle {
    /// Creates a throttle with the given minimum interval.
    ///
    /// A zero interval creates a disabled throttle.
    #[must_use]
    #[instrument(skip_all, fields(interval_ms = minimum_interval.as_millis()))]
    pub fn new(minimum_interval: Duration) -> Self {
        debug!("creating request throttle");
        Self {
            state: Mutex::new(ThrottleState {
                last_request: None,
                minimum_interval,
            }),
            cumulative_delay_ms: AtomicU64::new(0),
        }
    }

    /// Creates a throttle that admits every request immediately.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Returns the process-wide throttle.
    #[must_use]
    pub fn global() -> Arc<Self> {
        Arc::clone(&GLOBAL_THROTTLE)
    }

    /// Returns the current minimum interval.
    #[must_use]
    pub fn minimum_interval(&self) -> Duration {
        self.lock_state().minimum_interval
    }

    /// Returns whether throttling is currently disabled.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.minimum_interval().is_zero()
    }

    /// Changes the minimum interval at runtime.
    ///
    /// Callers already waiting pick the new value up on their next check.
    #[instrument(skip(self), fields(interval_ms = minimum_interval.as_millis()))]
    pub fn set_minimum_interval(&self, minimum_interval: Duration) {
        self.lock_state().minimum_interval = minimum_interval;
        debug!("throttle interval updated");
    }

    /// Total time callers have spent waiting on this throttle.
    #[must_use]
    pub fn cumulative_delay(&self) -> Duration {
        Duration::from_millis(self.cumulative_delay_ms.load(Ordering::SeqCst))
    }

    /// Waits until a request may start, then records the admission.
    ///
    /// Returns immediately without bookkeeping when the throttle is disabled.
    /// Dropping the returned future while it sleeps leaves the state untouched;
    /// an admission, once recorded, stands.
    #[instrument(skip(self))]
    pub async fn acquire(&self) -> ThrottlePermit {
        let started = Instant::now();

        loop {
            let delay = {
                let mut state = self.lock_state();
                let now = Instant::now();

                if state.minimum_interval.is_zero() {
                    return ThrottlePermit {
                        admitted_at: now,
                        waited: now.duration_since(started),
                    };
                }

                match state.last_request {
                    Some(last) if now.duration_since(last) < state.minimum_interval => {
                        state.minimum_interval - now.duration_since(last)
                    }
                    _ => {
                        state.last_request = Some(now);
                        return ThrottlePermit {
                            admitted_at: now,
                            waited: now.duration_since(started),
                        };
                    }
                }
            };

            let cumulative = self.add_cumulative_delay(delay);
            debug!(
                delay_ms = delay.as_millis(),
                cumulative_ms = cumulative.as_millis(),
                "applying throttle delay"
            );
            if cumulative >= CUMULATIVE_DELAY_WARNING_THRESHOLD
                && cumulative.saturating_sub(delay) < CUMULATIVE_DELAY_WARNING_THRESHOLD
            {
                warn!(
                    cumulative_delay_secs = cumulative.as_secs(),
                    "excessive throttling - consider reducing request volume"
                );
            }

            tokio::time::sleep(delay).await;
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, ThrottleState> {
        // The guarded section never panics midway, so a poisoned lock still holds consistent data.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn add_cumulative_delay(&self, delay: Duration) -> Duration {
        let delay_ms = delay.as_millis() as u64;
        let total = self
            .cumulative_delay_ms
            .fetch_add(delay_ms, Ordering::SeqCst)
            + delay_ms;
        Duration::from_millis(total)
    }
}
