//! Per-context cooperative cancellation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cancellation token checked at execution checkpoints.
///
/// `trigger` is a single atomic store and may be called from any thread,
/// including a signal handler (through the raw pointer from [`as_flag_ptr`]).
/// The executor consumes the trigger one-shot: exactly one checkpoint fails
/// per trigger.
///
/// [`as_flag_ptr`]: CancelToken::as_flag_ptr
#[derive(Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Consume the trigger. Returns true at most once per trigger.
    pub fn take_triggered(&self) -> bool {
        self.flag.swap(false, Ordering::AcqRel)
    }

    pub fn clear(&self) {
        self.flag.store(false, Ordering::Release);
    }

    /// Raw pointer to the flag, for async-signal-safe delivery. The pointer
    /// stays valid while any clone of this token is alive.
    pub fn as_flag_ptr(&self) -> *const AtomicBool {
        Arc::as_ptr(&self.flag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_is_consumed_once() {
        let t = CancelToken::new();
        assert!(!t.take_triggered());
        t.trigger();
        assert!(t.is_triggered());
        assert!(t.take_triggered());
        assert!(!t.take_triggered());
    }

    #[test]
    fn clones_share_the_flag() {
        let t = CancelToken::new();
        let u = t.clone();
        u.trigger();
        assert!(t.take_triggered());
        assert!(!u.is_triggered());
    }
}
