//! Remote row retrieval
//!
//! [`RowSource`] is the seam between the export pipeline and whatever serves
//! table rows. [`http::HttpRowSource`] talks to a sync server over HTTP;
//! tests substitute scripted sources.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

pub mod http;
pub mod pagination;

pub use pagination::PaginatedFetcher;

/// Fetcher errors
#[derive(Debug, thiserror::Error)]
pub enum FetcherError {
    /// HTTP request error
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Response parse error
    #[error("parse error: {0}")]
    ParseError(String),

    /// API error response
    #[error("API error: {0}")]
    ApiError(String),

    /// Network error
    #[error("network error: {0}")]
    NetworkError(String),
}

/// Result type for fetcher operations
pub type FetcherResult<T> = Result<T, FetcherError>;

/// One page of rows returned by the endpoint.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RowPage {
    /// Raw row records in server order
    pub rows: Vec<Value>,
    /// Continuation cursor for the following page
    #[serde(rename = "webSafeResumeCursor", default)]
    pub next_cursor: Option<String>,
    /// Whether another page follows
    #[serde(rename = "hasMoreResults")]
    pub has_more: bool,
}

impl RowPage {
    /// Build a page directly
    pub fn new(rows: Vec<Value>, next_cursor: Option<&str>, has_more: bool) -> Self {
        Self {
            rows,
            next_cursor: next_cursor.map(str::to_string),
            has_more,
        }
    }

    /// Cursor to send with the next request. An empty cursor means "from the start".
    pub fn continuation(&self) -> Option<String> {
        self.next_cursor
            .as_deref()
            .filter(|cursor| !cursor.is_empty())
            .map(str::to_string)
    }
}

/// Source of paginated table rows
#[async_trait]
pub trait RowSource: Send + Sync {
    /// Fetch one page of rows
    ///
    /// # Arguments
    /// * `table_id` - Remote table identifier
    /// * `cursor` - Continuation cursor from the previous page, `None` for the first page
    ///
    /// # Errors
    /// Returns [`FetcherError`] on transport or protocol failures
    async fn fetch_row_page(
        &self,
        table_id: &str,
        cursor: Option<&str>,
    ) -> FetcherResult<RowPage>;
}
