//! Graceful shutdown coordination utilities.
//!
//! Provides a lightweight [`ShutdownCoordinator`] shared between the Ctrl+C
//! handler and the download loop. The loop checks it between slots and races it
//! against in-flight transfers and courtesy delays, so an interrupt never leaves
//! a half-written archive or a progress marker pointing at an unfinished slot.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Shared handle to a shutdown coordinator.
pub type SharedShutdown = Arc<ShutdownCoordinator>;

/// Coordinates graceful shutdown across async tasks.
#[derive(Debug, Default)]
pub struct ShutdownCoordinator {
    is_shutdown: AtomicBool,
    notify: Notify,
}

impl ShutdownCoordinator {
    /// Create a new coordinator.
    pub fn new() -> Self {
        Self {
            is_shutdown: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    /// Create a new shared coordinator wrapped in [`Arc`].
    pub fn shared() -> SharedShutdown {
        Arc::new(Self::new())
    }

    /// Request shutdown. Notifies all registered waiters exactly once.
    pub fn request_shutdown(&self) {
        if !self.is_shutdown.swap(true, Ordering::SeqCst) {
            self.notify.notify_waiters();
        }
    }

    /// Whether shutdown has been requested.
    pub fn is_shutdown_requested(&self) -> bool {
        self.is_shutdown.load(Ordering::SeqCst)
    }

    /// Wait until shutdown is requested. Returns immediately if already set.
    pub async fn wait_for_shutdown(&self) {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        // Register before checking the flag so a request in between is not lost.
        notified.as_mut().enable();

        if self.is_shutdown_requested() {
            return;
        }
        notified.await;
    }

    /// Sleep for `duration` unless shutdown is requested first.
    ///
    /// Returns `true` if the sleep was cut short by a shutdown request.
    pub async fn sleep_or_shutdown(&self, duration: Duration) -> bool {
        if self.is_shutdown_requested() {
            return true;
        }
        if duration.is_zero() {
            return false;
        }

        tokio::select! {
            _ = self.wait_for_shutdown() => true,
            _ = tokio::time::sleep(duration) => false,
        }
    }
}
