//! Cursor-driven pagination over a [`RowSource`]
//!
//! The first request carries no cursor. Each response supplies the cursor for
//! the next request and a flag saying whether more pages follow; the loop ends
//! as soon as that flag is false. There is no iteration cap: an endpoint that
//! always reports more results keeps the loop going until cancelled.

use crate::exporter::config::RETRIEVING_ROWS;
use crate::exporter::{ExportError, ProgressEvent, ProgressSink};
use crate::shutdown::ShutdownCoordinator;
use crate::store::RowStore;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::RowSource;

/// What a completed fetch retrieved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FetchSummary {
    /// Pages requested
    pub pages: usize,
    /// Rows appended to the store
    pub rows: usize,
}

/// Drives a [`RowSource`] page by page into a [`RowStore`]
#[derive(Clone)]
pub struct PaginatedFetcher {
    source: Arc<dyn RowSource>,
}

impl PaginatedFetcher {
    /// Create a fetcher over `source`
    pub fn new(source: Arc<dyn RowSource>) -> Self {
        Self { source }
    }

    /// Fetch every page of the store's table and append the rows in arrival order.
    ///
    /// Emits a single indeterminate stage-start event before the first request.
    /// Shutdown is checked before each page and raced against each request.
    ///
    /// # Errors
    /// The first failing page aborts the loop. Rows from earlier pages stay in
    /// the store.
    pub async fn fetch(
        &self,
        store: &mut RowStore,
        progress: &dyn ProgressSink,
        shutdown: Option<&ShutdownCoordinator>,
    ) -> Result<FetchSummary, ExportError> {
        let table_id = store.table_id().to_string();
        progress.emit(ProgressEvent::stage(RETRIEVING_ROWS, true));
        info!(table_id = %table_id, "Retrieving rows");

        let mut summary = FetchSummary::default();
        let mut cursor: Option<String> = None;

        loop {
            if shutdown.is_some_and(|s| s.is_shutdown_requested()) {
                warn!(table_id = %table_id, pages = summary.pages, "Retrieval cancelled");
                return Err(ExportError::Cancelled);
            }

            let request = self.source.fetch_row_page(&table_id, cursor.as_deref());
            let page = match shutdown {
                Some(s) => tokio::select! {
                    page = request => page?,
                    _ = s.wait_for_shutdown() => {
                        warn!(
                            table_id = %table_id,
                            pages = summary.pages,
                            "Retrieval cancelled mid-request"
                        );
                        return Err(ExportError::Cancelled);
                    }
                },
                None => request.await?,
            };

            summary.pages += 1;
            let added = store.try_add(&page.rows)?;
            summary.rows += added;
            crate::metrics::record_page(added);

            debug!(
                table_id = %table_id,
                page = summary.pages,
                rows = added,
                has_more = page.has_more,
                "Received page"
            );

            if !page.has_more {
                break;
            }
            cursor = page.continuation();
        }

        info!(
            table_id = %table_id,
            pages = summary.pages,
            rows = summary.rows,
            "Retrieval complete"
        );
        Ok(summary)
    }
}
