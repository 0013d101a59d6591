//! Lock-free side channels between a running carve and other threads.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Bytes scanned so far, readable from any thread while a carve runs.
///
/// The value only grows during a run.
#[derive(Debug, Clone, Default)]
pub struct ProgressCounter(Arc<AtomicU64>);

impl ProgressCounter {
    /// Creates a counter starting at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Current number of bytes scanned
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    pub(crate) fn set(&self, bytes_scanned: u64) {
        self.0.store(bytes_scanned, Ordering::Relaxed);
    }
}

/// Coarse cancellation request, honoured between chunk reads
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Creates an unset flag
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks every run holding this flag to stop at its next chunk boundary
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Returns true once [`cancel`](Self::cancel) has been called
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
