use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Caller-supplied cancellation signal, optionally paired with a deadline.
///
/// Checked between retry attempts and between themes, never mid-request,
/// so an in-flight backoff loop can abort early without tearing down a
/// request that is already on the wire.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A flag that also trips once `deadline` has passed.
    #[must_use]
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: Some(deadline),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        if self.cancelled.load(Ordering::SeqCst) {
            return true;
        }
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn fresh_flag_is_not_cancelled() {
        assert!(!CancelFlag::new().is_cancelled());
    }

    #[test]
    fn cancel_trips_flag_for_all_clones() {
        let flag = CancelFlag::new();
        let clone = flag.clone();
        flag.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn passed_deadline_counts_as_cancelled() {
        let flag = CancelFlag::with_deadline(Instant::now() - Duration::from_secs(1));
        assert!(flag.is_cancelled());
    }

    #[test]
    fn future_deadline_is_not_cancelled() {
        let flag = CancelFlag::with_deadline(Instant::now() + Duration::from_secs(3600));
        assert!(!flag.is_cancelled());
    }
}
