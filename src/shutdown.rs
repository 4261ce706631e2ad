//! Cooperative cancellation for running exports.
//!
//! A [`ShutdownCoordinator`] is shared between the party that wants an export
//! to stop (Ctrl+C handler, a task handle) and the export itself, which checks
//! it between pages and between written rows. Cancellation never interrupts a
//! row halfway through being written.
//!
//! Coordinators form a tree: [`ShutdownCoordinator::child`] creates a handle
//! that is cancelled together with its parent but can also be cancelled on its
//! own without touching the parent or its siblings.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio::sync::Notify;
use tracing::{debug, warn};

/// Shared handle to a shutdown coordinator.
pub type SharedShutdown = Arc<ShutdownCoordinator>;

/// Spawn a task that requests shutdown on the first Ctrl+C.
///
/// Must be called from within a Tokio runtime.
pub fn install_ctrl_c_handler(handle: SharedShutdown) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Ctrl+C received - cancelling export...");
                handle.request_shutdown();
            }
            Err(e) => warn!(error = %e, "Unable to listen for Ctrl+C"),
        }
    });
}

/// One-way cancellation flag with async wakeups.
#[derive(Debug, Default)]
pub struct ShutdownCoordinator {
    requested: AtomicBool,
    notify: Notify,
    children: Mutex<Vec<Weak<ShutdownCoordinator>>>,
}

impl ShutdownCoordinator {
    /// Create a coordinator that has not been triggered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a coordinator wrapped in [`Arc`].
    pub fn shared() -> SharedShutdown {
        Arc::new(Self::new())
    }

    /// Create a coordinator that follows this one.
    ///
    /// A request on `self` reaches the child; a request on the child stays
    /// local. A child of an already triggered coordinator starts triggered.
    pub fn child(&self) -> SharedShutdown {
        let child = Self::shared();
        {
            let mut children = self.children.lock().unwrap_or_else(PoisonError::into_inner);
            children.retain(|c| c.strong_count() > 0);
            children.push(Arc::downgrade(&child));
        }
        // The flag is set before children are collected, so either the
        // request sees this child or this check sees the flag.
        if self.is_shutdown_requested() {
            child.request_shutdown();
        }
        child
    }

    /// Request shutdown of this coordinator and every child.
    ///
    /// Waiters are woken on the first request only.
    pub fn request_shutdown(&self) {
        if self.requested.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!("Shutdown requested");
        self.notify.notify_waiters();

        let children: Vec<SharedShutdown> = self
            .children
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .filter_map(|c| c.upgrade())
            .collect();
        for child in children {
            child.request_shutdown();
        }
    }

    /// Whether shutdown has been requested.
    pub fn is_shutdown_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Resolve once shutdown is requested; immediately if it already was.
    pub async fn wait_for_shutdown(&self) {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        // Register before checking the flag so a concurrent request is not missed.
        notified.as_mut().enable();
        if self.is_shutdown_requested() {
            return;
        }
        notified.await;
    }
}
