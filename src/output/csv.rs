//! CSV serializer for row stores
//!
//! Writes one header line followed by one line per row using RFC 4180 quoting:
//! a field containing a comma, a double quote or a line break is wrapped in
//! double quotes with inner quotes doubled. Lines end with CRLF.

use crate::exporter::config::{percent, FLUSH_INTERVAL, PROCESSING_ROWS, WRITE_BUFFER_SIZE};
use crate::exporter::{ExportError, ProgressEvent, ProgressSink};
use crate::shutdown::ShutdownCoordinator;
use crate::store::RowStore;
use crate::FormatConfig;
use csv::{Terminator, Writer, WriterBuilder};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, info, warn};

use super::{OutputError, OutputResult};

/// CSV writer for table rows
pub struct CsvTableWriter<W: Write> {
    writer: Writer<W>,
    rows_written: usize,
}

impl CsvTableWriter<BufWriter<File>> {
    /// Create (or truncate) the CSV file at `path`
    ///
    /// # Arguments
    /// * `path` - Output file path; its directory must already exist
    pub fn create<P: AsRef<Path>>(path: P) -> OutputResult<Self> {
        let path = path.as_ref();
        info!("Creating CSV writer: path={}", path.display());

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|e| OutputError::IoError(format!("Failed to create file: {}", e)))?;

        Ok(Self::from_writer(BufWriter::with_capacity(
            WRITE_BUFFER_SIZE,
            file,
        )))
    }

    /// Flush, then sync the file to disk
    pub fn close(self) -> OutputResult<()> {
        let rows_written = self.rows_written;
        debug!("Closing CSV writer: {} total rows written", rows_written);

        let buf_writer = self.into_inner()?;
        let file = buf_writer
            .into_inner()
            .map_err(|e| OutputError::IoError(format!("Failed to get file handle: {}", e)))?;

        file.sync_all()
            .map_err(|e| OutputError::IoError(format!("Failed to sync file: {}", e)))?;

        info!("CSV writer closed successfully: {} rows written", rows_written);
        Ok(())
    }
}

impl<W: Write> CsvTableWriter<W> {
    /// Wrap any destination stream
    pub fn from_writer(destination: W) -> Self {
        let writer = WriterBuilder::new()
            .terminator(Terminator::CRLF)
            .from_writer(destination);

        Self {
            writer,
            rows_written: 0,
        }
    }

    /// Write the header line. An empty header writes nothing.
    pub fn write_header(&mut self, header: &[String]) -> OutputResult<()> {
        if header.is_empty() {
            warn!("Header has no columns; no header line written");
            return Ok(());
        }
        self.writer
            .write_record(header)
            .map_err(|e| OutputError::CsvError(format!("Failed to write header: {}", e)))
    }

    /// Write one data line
    pub fn write_row(&mut self, values: &[String]) -> OutputResult<()> {
        self.writer
            .write_record(values)
            .map_err(|e| OutputError::CsvError(format!("Failed to write row: {}", e)))?;

        self.rows_written += 1;

        // Flush periodically (every FLUSH_INTERVAL rows)
        if self.rows_written % FLUSH_INTERVAL == 0 {
            self.flush()?;
            debug!("Progress: {} rows written", self.rows_written);
        }

        Ok(())
    }

    /// Flush buffered data
    pub fn flush(&mut self) -> OutputResult<()> {
        self.writer
            .flush()
            .map_err(|e| OutputError::FlushError(format!("Failed to flush: {}", e)))
    }

    /// Data rows written so far
    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    /// Flush and hand back the destination stream
    pub fn into_inner(mut self) -> OutputResult<W> {
        self.flush()?;
        self.writer
            .into_inner()
            .map_err(|e| OutputError::IoError(format!("Failed to get inner writer: {}", e)))
    }
}

/// Write the header and every row of `store` through `writer`.
///
/// Emits a stage-start event, then one percentage event per row. An empty
/// store produces a single event at 100%.
///
/// # Errors
/// Row formatting failures surface as [`ExportError::DataFormat`], write
/// failures as [`ExportError::Output`], and a shutdown request between rows
/// as [`ExportError::Cancelled`].
pub fn write_rows<W: Write>(
    store: &mut RowStore,
    config: &FormatConfig,
    writer: &mut CsvTableWriter<W>,
    progress: &dyn ProgressSink,
    shutdown: Option<&ShutdownCoordinator>,
) -> Result<usize, ExportError> {
    progress.emit(ProgressEvent::stage(PROCESSING_ROWS, false));

    let header = store.header(config).to_vec();
    if header.is_empty() && config.columns.is_none() {
        warn!(
            table_id = %store.table_id(),
            "No rows and no configured columns; header cannot be derived, CSV will be empty"
        );
    }
    writer.write_header(&header)?;

    let size = store.size();
    if size == 0 {
        progress.emit(ProgressEvent::percent(percent(0, 0)));
        return Ok(0);
    }

    for item in store.iter(config) {
        if shutdown.is_some_and(|s| s.is_shutdown_requested()) {
            return Err(ExportError::Cancelled);
        }

        let (index, values) = item?;
        writer.write_row(&values)?;
        progress.emit(ProgressEvent::percent(percent(index + 1, size)));
    }

    Ok(writer.rows_written())
}

/// Write `store` to a CSV file at `path`, truncating existing content.
///
/// The file is flushed and closed on every exit path. When writing fails the
/// write error wins over any close error; partially written files are left
/// in place.
pub fn write_csv_file(
    store: &mut RowStore,
    config: &FormatConfig,
    path: &Path,
    progress: &dyn ProgressSink,
    shutdown: Option<&ShutdownCoordinator>,
) -> Result<usize, ExportError> {
    let mut writer = CsvTableWriter::create(path)?;
    let result = write_rows(store, config, &mut writer, progress, shutdown);
    let closed = writer.close();

    match (result, closed) {
        (Ok(rows), Ok(())) => Ok(rows),
        (Ok(_), Err(e)) => Err(e.into()),
        (Err(e), close_result) => {
            if let Err(close_err) = close_result {
                warn!(error = %close_err, "Failed to close CSV after write error");
            }
            Err(e)
        }
    }
}
