//! Cooperative cancellation

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared stop signal checked between rules and between devices
///
/// Work already in flight is allowed to finish; nothing new starts once the
/// flag is set.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Clear the flag so later runs can start again
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let flag = CancelFlag::new();
        let other = flag.clone();
        assert!(!other.is_cancelled());

        flag.cancel();
        assert!(other.is_cancelled());

        other.reset();
        assert!(!flag.is_cancelled());
    }
}
