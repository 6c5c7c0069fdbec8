//! Scan guard restoring event delivery on drop.
//!
//! While a scan runs, transport events are routed to the scan's collector
//! instead of the session. [`ScanGuard`] puts the session handler back when
//! it goes out of scope, whether the scan finished, failed, or its future
//! was dropped mid-way.

use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::warn;

use crate::transport::{EventHandler, Transport};

/// A guard that restores the session's event handler when dropped.
///
/// # Example
///
/// ```ignore
/// let mut guard = ScanGuard::redirect(Arc::clone(&transport), collector, session_handler);
/// transport.start_scan().await?;
/// guard.set_scanning(true);
/// // ... collect advertisements ...
/// transport.stop_scan().await?;
/// guard.set_scanning(false);
/// // session handler is reinstalled here
/// ```
pub struct ScanGuard<T: Transport + 'static> {
    transport: Arc<T>,
    restore: Option<EventHandler>,
    scanning: bool,
}

impl<T: Transport + 'static> ScanGuard<T> {
    /// Install `redirect` on `transport`, remembering `restore`.
    pub fn redirect(transport: Arc<T>, redirect: EventHandler, restore: EventHandler) -> Self {
        transport.set_event_handler(redirect);
        Self {
            transport,
            restore: Some(restore),
            scanning: false,
        }
    }

    /// Record whether the transport is currently scanning.
    ///
    /// A guard dropped while scanning stops the scan in the background.
    pub fn set_scanning(&mut self, scanning: bool) {
        self.scanning = scanning;
    }
}

impl<T: Transport + 'static> Drop for ScanGuard<T> {
    fn drop(&mut self) {
        if let Some(restore) = self.restore.take() {
            self.transport.set_event_handler(restore);
        }
        if !self.scanning {
            return;
        }

        let transport = Arc::clone(&self.transport);
        if let Ok(handle) = Handle::try_current() {
            handle.spawn(async move {
                if let Err(e) = transport.stop_scan().await {
                    warn!("Failed to stop scan in guard drop: {}", e);
                }
            });
        } else {
            warn!("No tokio runtime available to stop scan in guard drop");
        }
    }
}
