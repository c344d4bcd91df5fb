use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

/// Read-only view of a stop flag owned by someone else.
///
/// The consumer checks it before and after every blocking poll, so a stop
/// takes effect within one poll timeout.
pub trait StopSignal: Send {
    fn is_stopped(&self) -> bool;
}

impl StopSignal for Arc<AtomicBool> {
    fn is_stopped(&self) -> bool {
        self.load(Ordering::Acquire)
    }
}

impl StopSignal for watch::Receiver<bool> {
    fn is_stopped(&self) -> bool {
        *self.borrow()
    }
}
