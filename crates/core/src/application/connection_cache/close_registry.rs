// Append-only list of connection handles released at shutdown

use std::sync::{Arc, Mutex, PoisonError};
use tracing::warn;

use crate::port::ManagementConnection;

/// Handles awaiting release
///
/// Handles are appended on every successful connect and only drained by
/// `close_all`. Removing a cache entry does not remove its handle here.
#[derive(Default)]
pub struct CloseRegistry {
    handles: Mutex<Vec<Arc<dyn ManagementConnection>>>,
}

impl CloseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, handle: Arc<dyn ManagementConnection>) {
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handle);
    }

    pub fn len(&self) -> usize {
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Close every handle; failures are logged and skipped
    ///
    /// Returns the number of handles closed successfully.
    pub fn close_all(&self) -> usize {
        let handles = std::mem::take(
            &mut *self
                .handles
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        let mut closed = 0;
        for handle in handles {
            match handle.close() {
                Ok(()) => closed += 1,
                Err(e) => warn!(error = %e, "Failed to close management connection"),
            }
        }
        closed
    }
}
