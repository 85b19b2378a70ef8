//! Limit/offset pagination: single pages and lazy record streams.
//!
//! - [`PageCursor`] - offset state machine issuing one page request at a time
//! - [`ResultStream`] - flattened, lazily fetched sequence of records
//! - [`PageDecoder`] / [`JsonListDecoder`] - turn a response body into records
//!
//! # Example
//!
//! ```no_run
//! use wsgate_core::paging::{JsonListDecoder, PageOptions, ResourceQuery};
//! use wsgate_core::{ApiClient, ClientConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ApiClient::new(ClientConfig::default())?;
//! let query = ResourceQuery::new("recording").param("artist", "5b11f4ce-a62d-471e-81fc-a69a8278c7da").param("fmt", "json");
//! let decoder = JsonListDecoder::<serde_json::Value>::new("recordings").with_count_key("recording-count");
//!
//! let mut records = client.stream(query, decoder, PageOptions::default().limit(100));
//! while let Some(record) = records.next().await {
//!     println!("{}", record?["title"]);
//! }
//! # Ok(())
//! # }
//! ```

mod cursor;
mod page;
mod stream;

pub use cursor::{CursorState, PageCursor};
pub use page::{
    DecodedPage, JsonListDecoder, Page, PageDecoder, PageOptions, PageSize, ResourceQuery,
};
pub use stream::ResultStream;

use crate::transport::{ApiClient, ApiError};

impl ApiClient {
    /// Fetches a single page of a resource.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`PageCursor::fetch_next`].
    pub async fn fetch_page<D: PageDecoder>(
        &self,
        query: ResourceQuery,
        decoder: D,
        options: PageOptions,
    ) -> Result<Page<D::Item>, ApiError> {
        PageCursor::new(self.clone(), query, decoder, options)
            .fetch_page(None)
            .await
    }

    /// Starts a lazy stream over every record of a resource.
    #[must_use]
    pub fn stream<D: PageDecoder>(
        &self,
        query: ResourceQuery,
        decoder: D,
        options: PageOptions,
    ) -> ResultStream<D> {
        ResultStream::new(PageCursor::new(self.clone(), query, decoder, options))
    }
}
