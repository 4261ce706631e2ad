//! Export configuration constants

/// Label of the retrieval stage.
pub const RETRIEVING_ROWS: &str = "Retrieving rows";

/// Label of the write stage.
pub const PROCESSING_ROWS: &str = "Processing and writing data";

/// Label of the terminal event after success.
pub const STATUS_DONE: &str = "Done";

/// Label of the terminal event after failure.
pub const STATUS_ERROR: &str = "Error";

/// Prompt key passed to the confirmation collaborator before replacing output.
pub const OVERWRITE_CSV: &str = "overwrite_csv";

/// Write buffer capacity for the CSV file.
pub const WRITE_BUFFER_SIZE: usize = 8192; // 8KB buffer

/// Flush interval for the CSV writer (flush every N rows)
pub const FLUSH_INTERVAL: usize = 1_000;

/// Integer percentage of `done` out of `total`, rounded down.
///
/// An empty total counts as complete.
pub fn percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let done = done.min(total) as u128;
    (done * 100 / total as u128) as u8
}
