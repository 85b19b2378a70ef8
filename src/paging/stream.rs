//! Lazy, forward-only record sequence over a [`PageCursor`].
//!
//! Pages are fetched only when the records of the previous page have all been
//! handed out. Consistency is weak: the collection may change on the server
//! between two page fetches, so a record can be yielded twice (something was
//! inserted before an already-returned position) or never (something
//! already-returned was deleted). Callers needing stronger guarantees must
//! de-duplicate themselves.

use std::collections::VecDeque;
use std::fmt;

use futures_util::Stream;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::transport::ApiError;

use super::cursor::PageCursor;
use super::page::PageDecoder;

/// Flattened sequence of records from successive pages.
///
/// Not restartable: create a new stream to iterate from the start again.
/// After yielding an error the stream is finished.
pub struct ResultStream<D: PageDecoder> {
    cursor: PageCursor<D>,
    buffer: VecDeque<D::Item>,
    finished: bool,
}

impl<D: PageDecoder + fmt::Debug> fmt::Debug for ResultStream<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultStream")
            .field("cursor", &self.cursor)
            .field("buffered", &self.buffer.len())
            .field("finished", &self.finished)
            .finish()
    }
}

impl<D: PageDecoder> ResultStream<D> {
    /// Wraps a cursor; nothing is fetched until the first pull.
    #[must_use]
    pub fn new(cursor: PageCursor<D>) -> Self {
        Self {
            cursor,
            buffer: VecDeque::new(),
            finished: false,
        }
    }

    /// The underlying cursor.
    #[must_use]
    pub fn cursor(&self) -> &PageCursor<D> {
        &self.cursor
    }

    /// Whether the stream will yield nothing more.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished && self.buffer.is_empty()
    }

    /// Pulls the next record, fetching the next page if the current one is used up.
    ///
    /// Returns `None` at the end of the data or after an error has been yielded.
    pub async fn next(&mut self) -> Option<Result<D::Item, ApiError>> {
        self.pull(None).await
    }

    /// Like [`next`](Self::next), but a page fetch gives up when `token` is cancelled.
    pub async fn next_cancellable(
        &mut self,
        token: &CancellationToken,
    ) -> Option<Result<D::Item, ApiError>> {
        self.pull(Some(token)).await
    }

    async fn pull(&mut self, token: Option<&CancellationToken>) -> Option<Result<D::Item, ApiError>> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                return Some(Ok(item));
            }
            if self.finished || self.cursor.is_exhausted() {
                self.finished = true;
                return None;
            }

            match self.cursor.fetch_page(token).await {
                Ok(page) if page.is_empty() => {
                    debug!(offset = self.cursor.offset(), "result stream reached the end");
                    self.finished = true;
                }
                Ok(page) => self.buffer.extend(page.into_items()),
                Err(error) => {
                    self.finished = true;
                    return Some(Err(error));
                }
            }
        }
    }

    /// Adapts this stream to a [`futures_util::Stream`].
    pub fn into_stream(self) -> impl Stream<Item = Result<D::Item, ApiError>> {
        futures_util::stream::unfold(self, |mut stream| async move {
            let item = stream.next().await?;
            Some((item, stream))
        })
    }
}
