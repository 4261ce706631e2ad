//! Progress events emitted while an export runs.
//!
//! Events are delivered in emission order. A stage-start event carries a label
//! and an indeterminate flag and resets the percentage to 0; per-row events
//! carry the percentage only, meaning "same stage, new percent".

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info};

use super::config::{STATUS_DONE, STATUS_ERROR};

/// One progress update
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    /// Completion of the current stage, 0-100
    pub percent: u8,
    /// Stage or status label; present only when the stage changes
    pub stage_label: Option<String>,
    /// Whether the stage has no measurable progress; present only when the stage changes
    pub indeterminate: Option<bool>,
}

impl ProgressEvent {
    /// Start of a new stage
    pub fn stage(label: &str, indeterminate: bool) -> Self {
        Self {
            percent: 0,
            stage_label: Some(label.to_string()),
            indeterminate: Some(indeterminate),
        }
    }

    /// Percentage update within the current stage
    pub fn percent(percent: u8) -> Self {
        Self {
            percent: percent.min(100),
            stage_label: None,
            indeterminate: None,
        }
    }

    /// Terminal event after a successful run
    pub fn done() -> Self {
        Self {
            percent: 100,
            stage_label: Some(STATUS_DONE.to_string()),
            indeterminate: Some(false),
        }
    }

    /// Terminal event after a failed run, keeping the last percentage
    pub fn error(last_percent: u8) -> Self {
        Self {
            percent: last_percent.min(100),
            stage_label: Some(STATUS_ERROR.to_string()),
            indeterminate: Some(false),
        }
    }

    /// Whether this event opens a new stage or reports a terminal status
    pub fn is_stage_change(&self) -> bool {
        self.stage_label.is_some()
    }
}

/// Receiver of progress events
pub trait ProgressSink: Send + Sync {
    /// Deliver one event
    fn emit(&self, event: ProgressEvent);
}

/// Channel sink. Events sent after the receiver is dropped are discarded.
impl ProgressSink for UnboundedSender<ProgressEvent> {
    fn emit(&self, event: ProgressEvent) {
        let _ = self.send(event);
    }
}

/// Headless sink that logs stage changes and percentage steps.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn emit(&self, event: ProgressEvent) {
        match &event.stage_label {
            Some(label) => info!(stage = %label, percent = event.percent, "[PROGRESS] {}", label),
            None if event.percent % 10 == 0 => {
                info!(percent = event.percent, "[PROGRESS] {}% complete", event.percent)
            }
            None => debug!(percent = event.percent, "[PROGRESS] {}% complete", event.percent),
        }
    }
}

/// Sink that discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn emit(&self, _event: ProgressEvent) {}
}

/// Forwards every event, in order, to each registered sink.
#[derive(Default, Clone)]
pub struct ProgressFanout {
    sinks: Vec<Arc<dyn ProgressSink>>,
}

impl ProgressFanout {
    /// Create an empty fanout
    pub fn new() -> Self {
        Self::default()
    }

    /// Register another subscriber
    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Number of subscribers
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Whether there are no subscribers
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl ProgressSink for ProgressFanout {
    fn emit(&self, event: ProgressEvent) {
        for sink in &self.sinks {
            sink.emit(event.clone());
        }
    }
}

/// Wraps a sink and remembers the last percentage it saw.
pub(crate) struct TrackedProgress {
    inner: Arc<dyn ProgressSink>,
    last_percent: std::sync::atomic::AtomicU8,
}

impl TrackedProgress {
    pub(crate) fn new(inner: Arc<dyn ProgressSink>) -> Self {
        Self {
            inner,
            last_percent: std::sync::atomic::AtomicU8::new(0),
        }
    }

    pub(crate) fn last_percent(&self) -> u8 {
        self.last_percent.load(std::sync::atomic::Ordering::Relaxed)
    }
}

impl ProgressSink for TrackedProgress {
    fn emit(&self, event: ProgressEvent) {
        self.last_percent
            .store(event.percent, std::sync::atomic::Ordering::Relaxed);
        self.inner.emit(event);
    }
}
