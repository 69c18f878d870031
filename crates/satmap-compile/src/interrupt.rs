//! Stop conditions for blocking solver work.
//!
//! Solver loops run on the blocking pool, where dropping the awaiting future
//! does not stop them. They poll an [`Interrupt`] between solver calls
//! instead; it fires once its deadline passes or once the paired
//! [`InterruptOnDrop`] guard is dropped together with the future that held it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// Deadline plus a shared terminate flag.
#[derive(Debug, Clone)]
pub struct Interrupt {
    terminate: Arc<AtomicBool>,
    deadline: Instant,
}

impl Interrupt {
    /// An interrupt firing at `deadline`, and the guard that fires it early.
    pub fn new(deadline: Instant) -> (Self, InterruptOnDrop) {
        let terminate = Arc::new(AtomicBool::new(false));
        let guard = InterruptOnDrop(Arc::clone(&terminate));
        (
            Self {
                terminate,
                deadline,
            },
            guard,
        )
    }

    /// Whether the guard was dropped.
    pub fn is_terminated(&self) -> bool {
        self.terminate.load(Ordering::Relaxed)
    }

    pub fn should_stop(&self) -> bool {
        self.is_terminated() || Instant::now() >= self.deadline
    }
}

/// Sets the terminate flag of its [`Interrupt`] when dropped.
#[derive(Debug)]
pub struct InterruptOnDrop(Arc<AtomicBool>);

impl Drop for InterruptOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_guard_drop_terminates() {
        let (interrupt, guard) = Interrupt::new(Instant::now() + Duration::from_secs(3600));
        let copy = interrupt.clone();
        assert!(!interrupt.should_stop());
        drop(guard);
        assert!(interrupt.is_terminated());
        assert!(copy.should_stop());
    }

    #[test]
    fn test_past_deadline_stops() {
        let (interrupt, _guard) = Interrupt::new(Instant::now());
        assert!(interrupt.should_stop());
        assert!(!interrupt.is_terminated());
    }
}
