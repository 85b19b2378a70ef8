//! Offset cursor over a paginated resource.
//!
//! ```text
//! NotStarted -> Fetching -> HasPage -> Fetching -> ... -> Exhausted
//!                   \-> Failed -> Fetching (caller retries)
//! ```
//!
//! The cursor advances by the number of records actually received, so a
//! short final page is handled without special cases. Only an empty page
//! exhausts it.

use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::transport::{ApiClient, ApiError};

use super::page::{Page, PageDecoder, PageOptions, PageSize, ResourceQuery};

/// Lifecycle of a [`PageCursor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// No page requested yet.
    NotStarted,
    /// A page request is in flight.
    Fetching,
    /// The last fetch returned records.
    HasPage,
    /// The last fetch failed; the next fetch retries the same offset.
    Failed {
        /// Whether the failure was a caller cancellation.
        cancelled: bool,
    },
    /// The server returned an empty page.
    Exhausted,
}

/// Stateful pointer into a paginated resource.
///
/// Owned by one logical browse or search; never shared between streams.
#[derive(Debug)]
pub struct PageCursor<D> {
    client: ApiClient,
    query: ResourceQuery,
    decoder: D,
    offset: u64,
    page_size: PageSize,
    total_count: Option<u64>,
    state: CursorState,
}

impl<D: PageDecoder> PageCursor<D> {
    /// Creates a cursor positioned at `options`' start offset.
    #[must_use]
    pub fn new(client: ApiClient, query: ResourceQuery, decoder: D, options: PageOptions) -> Self {
        Self {
            client,
            query,
            decoder,
            offset: options.start_offset(),
            page_size: options.page_size(),
            total_count: None,
            state: CursorState::NotStarted,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> CursorState {
        self.state
    }

    /// Offset the next fetch will request.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Records requested per page.
    #[must_use]
    pub fn page_size(&self) -> PageSize {
        self.page_size
    }

    /// Latest total-count hint from the server.
    #[must_use]
    pub fn total_count(&self) -> Option<u64> {
        self.total_count
    }

    /// Whether the cursor has seen an empty page.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.state == CursorState::Exhausted
    }

    /// Fetches the page at the current offset and advances past it.
    ///
    /// Returns `Ok(None)` once the cursor is exhausted. An empty page is
    /// returned once and exhausts the cursor. Failures are not retried; calling
    /// again after an error re-requests the same offset.
    ///
    /// Dropping the returned future mid-request leaves the cursor in
    /// `Failed { cancelled: true }`.
    ///
    /// # Errors
    ///
    /// Returns the transport error, the classified response error, or
    /// [`ApiError::Decode`] when the body is not a valid page.
    pub async fn fetch_next(&mut self) -> Result<Option<Page<D::Item>>, ApiError> {
        if self.is_exhausted() {
            return Ok(None);
        }
        self.fetch_page(None).await.map(Some)
    }

    /// Like [`fetch_next`](Self::fetch_next), but gives up when `token` is cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Cancelled`] on cancellation, otherwise the errors of
    /// [`fetch_next`](Self::fetch_next).
    pub async fn fetch_next_cancellable(
        &mut self,
        token: &CancellationToken,
    ) -> Result<Option<Page<D::Item>>, ApiError> {
        if self.is_exhausted() {
            return Ok(None);
        }
        self.fetch_page(Some(token)).await.map(Some)
    }

    #[instrument(
        skip_all,
        fields(path = self.query.path(), offset = self.offset, limit = self.page_size.get())
    )]
    pub(super) async fn fetch_page(
        &mut self,
        token: Option<&CancellationToken>,
    ) -> Result<Page<D::Item>, ApiError> {
        let request = self.query.page_request(self.offset, self.page_size);
        let guard = FetchGuard::arm(&mut self.state);

        let result = match token {
            Some(token) => self.client.execute_cancellable(&request, token).await,
            None => self.client.execute(&request).await,
        };
        let response = match result {
            Ok(response) => response,
            Err(error) => {
                guard.finish(CursorState::Failed {
                    cancelled: error.is_cancelled(),
                });
                return Err(error);
            }
        };

        let decoded = match self.decoder.decode(response.text()) {
            Ok(decoded) => decoded,
            Err(reason) => {
                warn!(%reason, "page body could not be decoded");
                guard.finish(CursorState::Failed { cancelled: false });
                let url = self
                    .client
                    .url_for(&request)
                    .map_or_else(|_| request.path().to_string(), String::from);
                return Err(ApiError::decode(url, reason));
            }
        };

        let mut items = decoded.items;
        let requested = usize::try_from(self.page_size.get()).unwrap_or(usize::MAX);
        if items.len() > requested {
            warn!(
                received = items.len(),
                requested, "server returned more records than requested, truncating"
            );
            items.truncate(requested);
        }

        let page = Page::new(self.offset, self.page_size, items, decoded.total_count);
        if decoded.total_count.is_some() {
            self.total_count = decoded.total_count;
        }
        self.offset += page.len() as u64;

        if page.is_empty() {
            debug!("empty page, cursor exhausted");
            guard.finish(CursorState::Exhausted);
        } else {
            debug!(received = page.len(), next_offset = self.offset, "page fetched");
            guard.finish(CursorState::HasPage);
        }
        Ok(page)
    }
}

/// Marks the cursor `Fetching` and, unless finished explicitly, `Failed { cancelled: true }` on drop.
struct FetchGuard<'a> {
    state: &'a mut CursorState,
}

impl<'a> FetchGuard<'a> {
    fn arm(state: &'a mut CursorState) -> Self {
        *state = CursorState::Fetching;
        Self { state }
    }

    fn finish(self, next: CursorState) {
        *self.state = next;
    }
}

impl Drop for FetchGuard<'_> {
    fn drop(&mut self) {
        if *self.state == CursorState::Fetching {
            debug!("page fetch dropped before completion");
            *self.state = CursorState::Failed { cancelled: true };
        }
    }
}
