/*!
Trailing-edge throttle for store change notifications.
*/

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tracing::trace;

/// Coalesces bursts of notifications into one call at the end of a window.
///
/// The first [`notify`](Throttle::notify) while idle opens a window of
/// `window` length; further notifications inside the window are absorbed. When
/// the window closes the action runs once, and the next notification opens a
/// fresh window.
pub struct Throttle {
    window: Duration,
    pending: Arc<AtomicBool>,
    action: Arc<dyn Fn() + Send + Sync>,
    handle: Handle,
}

impl Throttle {
    /// Create a throttle running `action` on the runtime behind `handle`
    pub fn new(window: Duration, handle: Handle, action: Arc<dyn Fn() + Send + Sync>) -> Self {
        Self {
            window,
            pending: Arc::new(AtomicBool::new(false)),
            action,
            handle,
        }
    }

    /// Record a notification
    ///
    /// Returns `true` when this call opened a new window.
    pub fn notify(&self) -> bool {
        if self.pending.swap(true, Ordering::AcqRel) {
            trace!("Notification absorbed by open throttle window");
            return false;
        }

        let pending = Arc::clone(&self.pending);
        let action = Arc::clone(&self.action);
        let window = self.window;
        self.handle.spawn(async move {
            tokio::time::sleep(window).await;
            pending.store(false, Ordering::Release);
            action();
        });
        true
    }

    /// Whether a window is currently open
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }
}
