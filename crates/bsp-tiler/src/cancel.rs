//! Cooperative cancellation between file boundaries.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{TilingError, TilingResult};

/// Shared flag that asks a running tiling job to stop.
///
/// Clones share the same flag. The pipeline polls it between input files,
/// between splits and between leaves, never inside a vertex loop.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Returns `true` once [`cancel`](Self::cancel) has been called on any clone.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Fails with [`TilingError::Cancelled`] if cancellation was requested.
    pub fn check(&self) -> TilingResult<()> {
        if self.is_cancelled() {
            Err(TilingError::Cancelled)
        } else {
            Ok(())
        }
    }
}
