//! HTTP row source for sync servers
//!
//! Requests `GET {base_url}/apps/{app_id}/tables/{table_id}/rows` with an
//! optional `cursor` query parameter and decodes the JSON page body.
//! Failures are surfaced immediately: there is no retry at this layer.

use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{FetcherError, FetcherResult, RowPage, RowSource};
use crate::EndpointInfo;

/// Longest slice of an error body kept in error messages.
const MAX_ERROR_BODY: usize = 256;

/// Row source backed by a shared, already-authenticated HTTP client
pub struct HttpRowSource {
    client: Arc<Client>,
    base_url: String,
    app_id: String,
}

impl HttpRowSource {
    /// Create a row source
    ///
    /// # Arguments
    /// * `client` - Ready-to-use HTTP client (authentication is the caller's concern)
    /// * `endpoint` - Server coordinates
    pub fn new(client: Client, endpoint: &EndpointInfo) -> Self {
        Self::with_shared_client(Arc::new(client), endpoint)
    }

    /// Create a row source sharing an existing client
    pub fn with_shared_client(client: Arc<Client>, endpoint: &EndpointInfo) -> Self {
        Self {
            client,
            base_url: endpoint.base_url.clone(),
            app_id: endpoint.app_id.clone(),
        }
    }

    /// URL of the rows resource for a table
    pub fn rows_url(&self, table_id: &str) -> String {
        format!(
            "{}/apps/{}/tables/{}/rows",
            self.base_url, self.app_id, table_id
        )
    }
}

#[async_trait]
impl RowSource for HttpRowSource {
    async fn fetch_row_page(
        &self,
        table_id: &str,
        cursor: Option<&str>,
    ) -> FetcherResult<RowPage> {
        let url = self.rows_url(table_id);
        let mut request = self.client.get(&url);
        if let Some(cursor) = cursor {
            request = request.query(&[("cursor", cursor)]);
        }

        debug!("Requesting rows page: {} cursor={:?}", url, cursor);

        let response = request
            .send()
            .await
            .map_err(|e| FetcherError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let body = truncate(&body, MAX_ERROR_BODY);
            warn!("Rows request failed with status {}", status);

            if status.is_client_error() {
                return Err(FetcherError::ApiError(format!("Client error {status}: {body}")));
            }
            return Err(FetcherError::HttpError(format!("Server error {status}: {body}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetcherError::NetworkError(format!("Failed to read body: {e}")))?;

        parse_row_page(&body)
    }
}

/// Decode a rows page body.
///
/// # Errors
/// Returns [`FetcherError::ParseError`] when the body is not a valid page
pub fn parse_row_page(body: &str) -> FetcherResult<RowPage> {
    serde_json::from_str(body)
        .map_err(|e| FetcherError::ParseError(format!("Failed to deserialize rows page: {e}")))
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
