//! Cooperative cancellation for long-running requests.

use crate::engine::error::{RelocationError, RelocationResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag checked between pipeline stages.
///
/// Cancelling after mutations started still rolls the transaction back.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> RelocationResult<()> {
        if self.is_cancelled() {
            return Err(RelocationError::Cancelled);
        }
        Ok(())
    }
}
