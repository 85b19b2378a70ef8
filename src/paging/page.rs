//! Page values, page-size bounds and body decoding.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::transport::ApiRequest;
use crate::transport::constants::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, MIN_PAGE_SIZE};

/// Number of records requested per page, always within `[1, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PageSize(u32);

impl PageSize {
    /// Creates a page size, clamping out-of-range values into bounds.
    ///
    /// # Examples
    ///
    /// ```
    /// use wsgate_core::paging::PageSize;
    ///
    /// assert_eq!(PageSize::new(0).get(), 1);
    /// assert_eq!(PageSize::new(50).get(), 50);
    /// assert_eq!(PageSize::new(500).get(), 100);
    /// ```
    #[must_use]
    pub fn new(size: u32) -> Self {
        Self(size.clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE))
    }

    /// The page size as a number.
    #[must_use]
    pub fn get(self) -> u32 {
        self.0
    }
}

impl Default for PageSize {
    fn default() -> Self {
        Self(DEFAULT_PAGE_SIZE)
    }
}

/// Where a paginated fetch starts and how large its pages are.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageOptions {
    offset: u64,
    page_size: PageSize,
}

impl PageOptions {
    /// Starts at `offset` instead of 0.
    #[must_use]
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    /// Requests `limit` records per page (clamped into bounds).
    #[must_use]
    pub fn limit(mut self, limit: u32) -> Self {
        self.page_size = PageSize::new(limit);
        self
    }

    /// Starting offset.
    #[must_use]
    pub fn start_offset(&self) -> u64 {
        self.offset
    }

    /// Page size.
    #[must_use]
    pub fn page_size(&self) -> PageSize {
        self.page_size
    }
}

/// A paginated resource: path plus fixed query parameters.
///
/// `limit` and `offset` are added per page and must not be set here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceQuery {
    path: String,
    params: Vec<(String, String)>,
}

impl ResourceQuery {
    /// Creates a query for a resource path relative to the base URL.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            params: Vec::new(),
        }
    }

    /// Adds a fixed query parameter.
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    /// Resource path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Builds the request for one page.
    #[must_use]
    pub fn page_request(&self, offset: u64, page_size: PageSize) -> ApiRequest {
        ApiRequest::get(self.path.clone())
            .queries(self.params.iter().cloned())
            .query("limit", page_size.get().to_string())
            .query("offset", offset.to_string())
    }
}

/// One fetched batch of records.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    offset: u64,
    requested_size: u32,
    items: Vec<T>,
    total_count: Option<u64>,
}

impl<T> Page<T> {
    pub(crate) fn new(
        offset: u64,
        requested_size: PageSize,
        items: Vec<T>,
        total_count: Option<u64>,
    ) -> Self {
        Self {
            offset,
            requested_size: requested_size.get(),
            items,
            total_count,
        }
    }

    /// Offset this page was requested at.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Page size that was requested.
    #[must_use]
    pub fn requested_size(&self) -> u32 {
        self.requested_size
    }

    /// Records in server order.
    #[must_use]
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Consumes the page, returning its records.
    #[must_use]
    pub fn into_items(self) -> Vec<T> {
        self.items
    }

    /// Number of records on this page.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the page holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Total number of records the server reported, if it did.
    #[must_use]
    pub fn total_count(&self) -> Option<u64> {
        self.total_count
    }
}

/// Records and count hint extracted from a response body.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedPage<T> {
    /// Records in server order.
    pub items: Vec<T>,
    /// Total record count, if the body carried one.
    pub total_count: Option<u64>,
}

/// Turns a page response body into records.
///
/// Implemented by the resource layer for each entity listing it exposes.
pub trait PageDecoder {
    /// Record type.
    type Item;

    /// Decodes one response body.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when the body does not have the expected shape.
    fn decode(&self, body: &str) -> Result<DecodedPage<Self::Item>, String>;
}

/// Decodes JSON listings shaped like `{"<count key>": N, "<list key>": [...]}`.
///
/// Records are deserialized into `T` (raw [`Value`]s by default).
#[derive(Debug)]
pub struct JsonListDecoder<T = Value> {
    list_key: String,
    count_key: Option<String>,
    _item: PhantomData<fn() -> T>,
}

impl<T> Clone for JsonListDecoder<T> {
    fn clone(&self) -> Self {
        Self {
            list_key: self.list_key.clone(),
            count_key: self.count_key.clone(),
            _item: PhantomData,
        }
    }
}

impl<T> JsonListDecoder<T> {
    /// Reads records from `list_key`; the count hint from `count`.
    pub fn new(list_key: impl Into<String>) -> Self {
        Self {
            list_key: list_key.into(),
            count_key: None,
            _item: PhantomData,
        }
    }

    /// Reads the count hint from `count_key` instead of `count`.
    #[must_use]
    pub fn with_count_key(mut self, count_key: impl Into<String>) -> Self {
        self.count_key = Some(count_key.into());
        self
    }
}

impl<T: DeserializeOwned> PageDecoder for JsonListDecoder<T> {
    type Item = T;

    fn decode(&self, body: &str) -> Result<DecodedPage<T>, String> {
        let mut document: Value =
            serde_json::from_str(body).map_err(|error| format!("invalid JSON: {error}"))?;
        let Some(object) = document.as_object_mut() else {
            return Err("expected a JSON object".to_string());
        };

        let count_key = self.count_key.as_deref().unwrap_or("count");
        let total_count = object.get(count_key).and_then(Value::as_u64);

        let list = match object.remove(&self.list_key) {
            Some(Value::Array(list)) => list,
            Some(_) => return Err(format!("`{}` is not an array", self.list_key)),
            None => return Err(format!("missing `{}` list", self.list_key)),
        };

        let items = list
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<T>, _>>()
            .map_err(|error| format!("invalid `{}` record: {error}", self.list_key))?;

        Ok(DecodedPage { items, total_count })
    }
}
