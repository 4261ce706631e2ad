//! Export executor: runs one job through retrieval and CSV writing

use crate::exporter::config::OVERWRITE_CSV;
use crate::exporter::confirm::{AutoConfirm, Confirmer};
use crate::exporter::progress::{NoProgress, ProgressEvent, ProgressSink, TrackedProgress};
use crate::exporter::{ExportError, ExportJob, ExportOutcome};
use crate::fetcher::{PaginatedFetcher, RowSource};
use crate::metrics::ExportMetrics;
use crate::output::{write_csv_file, ExportTarget, OutputPolicy};
use crate::shutdown::{SharedShutdown, ShutdownCoordinator};
use crate::store::RowStore;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn, Instrument};

/// Runs export jobs against a row source and an output policy
#[derive(Clone)]
pub struct ExportExecutor {
    source: Arc<dyn RowSource>,
    policy: Arc<dyn OutputPolicy>,
    confirmer: Arc<dyn Confirmer>,
    progress: Arc<dyn ProgressSink>,
    shutdown: Option<SharedShutdown>,
}

impl ExportExecutor {
    /// Create an executor that answers prompts automatically and reports no progress
    pub fn new(source: Arc<dyn RowSource>, policy: Arc<dyn OutputPolicy>) -> Self {
        Self {
            source,
            policy,
            confirmer: Arc::new(AutoConfirm::default()),
            progress: Arc::new(NoProgress),
            shutdown: None,
        }
    }

    /// Send progress events to `sink`
    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = sink;
        self
    }

    /// Ask `confirmer` before replacing existing output
    pub fn with_confirmer(mut self, confirmer: Arc<dyn Confirmer>) -> Self {
        self.confirmer = confirmer;
        self
    }

    /// Attach a shared shutdown handle for cancellation.
    ///
    /// Tasks from [`ExportExecutor::spawn`] get their own child of this handle,
    /// so a request here stops every task while [`ExportTask::cancel`] stops one.
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Run `job`, filling `store` from the endpoint when it is empty.
    ///
    /// Exactly one outcome is produced per call. After the first call the job
    /// is terminal and later calls fail without side effects.
    pub async fn run(&self, job: &mut ExportJob, store: &mut RowStore) -> ExportOutcome {
        let span = tracing::info_span!(
            "export",
            table_id = %job.table_id,
            app_id = %job.endpoint.app_id,
            variant = job.config.variant()
        );

        async move {
            if let Err(status) = job.start() {
                let error = ExportError::AlreadyRun(status);
                warn!(error = %error, "Export job cannot be started");
                return ExportOutcome::from_error(&error);
            }

            info!("Starting export job");
            let metrics = ExportMetrics::start(&job.table_id);
            let progress = TrackedProgress::new(self.progress.clone());

            match self.execute(job, store, &progress).await {
                Ok((rows_written, output_path)) => {
                    progress.emit(ProgressEvent::done());
                    job.finish(true);
                    metrics.record_success(rows_written);
                    info!(
                        rows_written = rows_written,
                        path = %output_path.display(),
                        "Export job completed"
                    );
                    ExportOutcome::Success {
                        rows_written,
                        output_path,
                    }
                }
                Err(error) => {
                    progress.emit(ProgressEvent::error(progress.last_percent()));
                    job.finish(false);
                    if matches!(error, ExportError::Cancelled) {
                        warn!(rows_retrieved = store.size(), "Export cancelled");
                    }
                    metrics.record_failure(error.kind(), &error.to_string());
                    ExportOutcome::from_error(&error)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn execute(
        &self,
        job: &ExportJob,
        store: &mut RowStore,
        progress: &TrackedProgress,
    ) -> Result<(usize, PathBuf), ExportError> {
        job.validate().map_err(ExportError::InvalidJob)?;
        if store.table_id() != job.table_id {
            return Err(ExportError::InvalidJob(format!(
                "row store belongs to table {:?}, job exports {:?}",
                store.table_id(),
                job.table_id
            )));
        }

        let target = ExportTarget::new(&job.save_dir, &job.endpoint, &job.table_id, &job.config);

        if self.policy.exists(&target) {
            let confirmed = self
                .confirmer
                .confirm(OVERWRITE_CSV, job.interactive, !job.interactive);
            if !confirmed {
                warn!(interactive = job.interactive, "Overwrite of existing export declined");
                return Err(ExportError::OverwriteDeclined);
            }
            self.policy.delete(&target)?;
        }

        self.policy.create_dirs(&target)?;

        let shutdown = self.shutdown.as_deref();
        if store.size() == 0 {
            PaginatedFetcher::new(self.source.clone())
                .fetch(store, progress, shutdown)
                .await?;
        } else {
            info!(rows = store.size(), "Row store already populated; skipping retrieval");
        }

        let path = self.policy.resolve_csv_path(&target);
        let rows_written = write_csv_file(store, &job.config, &path, progress, shutdown)?;
        Ok((rows_written, path))
    }

    /// Run `job` on a background task.
    ///
    /// The task watches its own cancellation handle, a child of the
    /// executor's handle when one is attached. Cancellation takes effect
    /// between pages or between written rows.
    pub fn spawn(&self, mut job: ExportJob, mut store: RowStore) -> ExportTask {
        let shutdown = match &self.shutdown {
            Some(parent) => parent.child(),
            None => ShutdownCoordinator::shared(),
        };
        let executor = self.clone().with_shutdown(shutdown.clone());

        let handle = tokio::spawn(async move {
            let outcome = executor.run(&mut job, &mut store).await;
            (job, store, outcome)
        });

        ExportTask { handle, shutdown }
    }
}

/// Handle to an export running on a background task
pub struct ExportTask {
    handle: JoinHandle<(ExportJob, RowStore, ExportOutcome)>,
    shutdown: SharedShutdown,
}

impl ExportTask {
    /// Ask this export to stop. It ends with a generic failure; other tasks
    /// from the same executor keep running.
    pub fn cancel(&self) {
        self.shutdown.request_shutdown();
    }

    /// Whether the background task has finished
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the outcome
    pub async fn wait(self) -> ExportOutcome {
        match self.join().await {
            Ok((_, _, outcome)) => outcome,
            Err(error) => ExportOutcome::from_error(&error),
        }
    }

    /// Wait for the task and take back the job and store along with the outcome
    ///
    /// # Errors
    /// Returns [`ExportError::TaskFailed`] if the task panicked or was aborted.
    pub async fn join(self) -> Result<(ExportJob, RowStore, ExportOutcome), ExportError> {
        self.handle
            .await
            .map_err(|e| ExportError::TaskFailed(e.to_string()))
    }
}
