use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

/// Polled once per capture iteration to decide whether the watch loop ends.
pub trait ShutdownSignal: Send {
    fn should_stop(&self) -> bool;
}

impl ShutdownSignal for CancellationToken {
    fn should_stop(&self) -> bool {
        self.is_cancelled()
    }
}

impl ShutdownSignal for Arc<AtomicBool> {
    fn should_stop(&self) -> bool {
        self.load(Ordering::SeqCst)
    }
}
