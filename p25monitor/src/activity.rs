use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Units of work a lease produced since the last sweep.
///
/// The consumer increments it; the sweep reads and resets it in one swap so
/// an increment landing between the two is never lost.
#[derive(Debug, Clone, Default)]
pub struct ActivityCounter(Arc<AtomicU64>);

impl ActivityCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_count(count: u64) -> Self {
        Self(Arc::new(AtomicU64::new(count)))
    }

    pub fn increment(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    /// Returns the count and resets it to zero.
    pub fn take(&self) -> u64 {
        self.0.swap(0, Ordering::AcqRel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_resets() {
        let counter = ActivityCounter::with_count(2);
        let shared = counter.clone();
        shared.increment();

        assert_eq!(counter.take(), 3);
        assert_eq!(counter.get(), 0);
        assert_eq!(shared.take(), 0);
    }
}
