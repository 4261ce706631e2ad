//! In-memory row store for a single export run.
//!
//! The store is filled once by the paginated fetcher and then read once by the
//! CSV writer. The header is derived lazily on first request and cached for the
//! lifetime of the store: a later call with a different [`FormatConfig`] still
//! returns the first header.

use crate::{is_metadata_column, FormatConfig, Row};
use serde_json::Value;
use std::collections::HashSet;
use tracing::debug;

/// Row store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A raw record could not be interpreted as a row
    #[error("malformed row at index {index}: {reason}")]
    MalformedRow {
        /// Position the record would have taken in the store
        index: usize,
        /// What was wrong with it
        reason: String,
    },

    /// A row lacks a header column while strict columns are enabled
    #[error("row {index} is missing column {column:?}")]
    MissingColumn {
        /// Row index
        index: usize,
        /// Header column that was absent
        column: String,
    },
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Holds every row retrieved for one table.
#[derive(Debug, Clone)]
pub struct RowStore {
    table_id: String,
    rows: Vec<Row>,
    /// End of the first non-empty page within `rows`
    first_page_len: Option<usize>,
    header: Option<Vec<String>>,
}

impl RowStore {
    /// Create an empty store for a table
    pub fn new(table_id: impl Into<String>) -> Self {
        Self {
            table_id: table_id.into(),
            rows: Vec::new(),
            first_page_len: None,
            header: None,
        }
    }

    /// Table this store belongs to
    pub fn table_id(&self) -> &str {
        &self.table_id
    }

    /// Number of rows held. Zero means the table has not been fetched yet.
    pub fn size(&self) -> usize {
        self.rows.len()
    }

    /// Rows in arrival order
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Append one page of raw records.
    ///
    /// The whole page is parsed before anything is appended, so a page with a
    /// malformed record leaves the store untouched.
    ///
    /// # Errors
    /// Returns [`StoreError::MalformedRow`] naming the first bad record.
    pub fn try_add(&mut self, page: &[Value]) -> StoreResult<usize> {
        let base = self.rows.len();
        let parsed = page
            .iter()
            .enumerate()
            .map(|(offset, record)| parse_row(record, base + offset))
            .collect::<StoreResult<Vec<_>>>()?;

        let added = parsed.len();
        // Empty pages do not count as the first page for header derivation
        if self.first_page_len.is_none() && added > 0 {
            self.first_page_len = Some(self.rows.len() + added);
        }
        self.rows.extend(parsed);

        debug!(
            table_id = %self.table_id,
            added = added,
            total = self.rows.len(),
            "Rows added to store"
        );
        Ok(added)
    }

    /// Append already-parsed rows, e.g. when seeding a store from a previous run.
    pub fn extend_rows<I: IntoIterator<Item = Row>>(&mut self, rows: I) {
        let before = self.rows.len();
        self.rows.extend(rows);
        if self.first_page_len.is_none() && self.rows.len() > before {
            self.first_page_len = Some(self.rows.len());
        }
    }

    /// Ordered header columns.
    ///
    /// Computed on the first call from `config` and the first non-empty page,
    /// then cached. Subsequent calls ignore `config` and return the cached list.
    pub fn header(&mut self, config: &FormatConfig) -> &[String] {
        if self.header.is_none() {
            let header = self.derive_header(config);
            debug!(table_id = %self.table_id, columns = header.len(), "Header derived");
            self.header = Some(header);
        }
        self.header.as_deref().unwrap_or_default()
    }

    /// Cached header, if one has been derived
    pub fn cached_header(&self) -> Option<&[String]> {
        self.header.as_deref()
    }

    fn derive_header(&self, config: &FormatConfig) -> Vec<String> {
        if let Some(columns) = &config.columns {
            return columns.clone();
        }

        let first_page = &self.rows[..self.first_page_len.unwrap_or(0)];
        let mut seen = HashSet::new();
        let mut header = Vec::new();
        for row in first_page {
            for column in row.columns() {
                if !config.include_metadata && is_metadata_column(column) {
                    continue;
                }
                if seen.insert(column) {
                    header.push(column.to_string());
                }
            }
        }
        header
    }

    /// Iterate formatted rows in header order.
    ///
    /// Each call starts from the first row again. Items carry the 0-based index
    /// of the row just produced so callers can compute progress.
    pub fn iter<'a>(&'a mut self, config: &'a FormatConfig) -> RowIter<'a> {
        self.header(config);
        RowIter {
            rows: &self.rows,
            header: self.header.as_deref().unwrap_or_default(),
            config,
            index: 0,
        }
    }
}

/// Forward iterator over formatted rows of a [`RowStore`].
pub struct RowIter<'a> {
    rows: &'a [Row],
    header: &'a [String],
    config: &'a FormatConfig,
    index: usize,
}

impl RowIter<'_> {
    /// Index of the next row to be produced
    pub fn position(&self) -> usize {
        self.index
    }
}

impl Iterator for RowIter<'_> {
    type Item = StoreResult<(usize, Vec<String>)>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.rows.get(self.index)?;
        let index = self.index;
        self.index += 1;
        Some(format_row(row, index, self.header, self.config).map(|values| (index, values)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.rows.len() - self.index;
        (remaining, Some(remaining))
    }
}

fn format_row(
    row: &Row,
    index: usize,
    header: &[String],
    config: &FormatConfig,
) -> StoreResult<Vec<String>> {
    header
        .iter()
        .map(|column| {
            if config.strict_columns && !row.contains(column) {
                return Err(StoreError::MissingColumn {
                    index,
                    column: column.clone(),
                });
            }
            Ok(row
                .value(column)
                .map(str::to_string)
                .unwrap_or_else(|| config.null_value.clone()))
        })
        .collect()
}

fn parse_row(record: &Value, index: usize) -> StoreResult<Row> {
    let object = record.as_object().ok_or_else(|| StoreError::MalformedRow {
        index,
        reason: format!("expected a JSON object, got {}", json_kind(record)),
    })?;

    // JSON object keys are unique, so cells are pushed without a lookup
    let mut cells = Vec::with_capacity(object.len());
    for (column, value) in object {
        let cell = match value {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Array(_) | Value::Object(_) => {
                return Err(StoreError::MalformedRow {
                    index,
                    reason: format!(
                        "column {column:?} holds a nested {}",
                        json_kind(value)
                    ),
                });
            }
        };
        cells.push((column.clone(), cell));
    }
    Ok(Row::from_unique_cells(cells))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
