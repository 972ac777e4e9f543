//! A weighted, non-queueing semaphore used for admission control.
//!
//! Both of this crate's process-wide admission gates (metadata prefetch concurrency and the
//! buffered-write block budget) use "try, don't queue" semantics: if the budget is saturated, the
//! caller aborts the work rather than waiting in line (spec §5). That's a much simpler contract
//! than a general async semaphore, so this is a small hand-rolled type rather than a dependency.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A semaphore with `capacity` permits, supporting only non-blocking acquisition.
#[derive(Debug)]
pub struct WeightedSemaphore {
    capacity: usize,
    available: AtomicUsize,
}

/// A held set of permits. Releases them automatically when dropped.
#[derive(Debug)]
pub struct Permit {
    sem: Arc<WeightedSemaphore>,
    count: usize,
}

impl WeightedSemaphore {
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            capacity,
            available: AtomicUsize::new(capacity),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.available.load(Ordering::SeqCst)
    }

    /// Attempt to acquire `count` permits. Returns `None` immediately if unavailable; never
    /// blocks or queues the caller.
    pub fn try_acquire(self: &Arc<Self>, count: usize) -> Option<Permit> {
        loop {
            let current = self.available.load(Ordering::SeqCst);
            if current < count {
                return None;
            }
            let next = current - count;
            if self
                .available
                .compare_exchange(current, next, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return Some(Permit {
                    sem: Arc::clone(self),
                    count,
                });
            }
        }
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        self.sem.available.fetch_add(self.count, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_acquire_respects_capacity() {
        let sem = WeightedSemaphore::new(2);
        let p1 = sem.try_acquire(1).expect("should acquire");
        let p2 = sem.try_acquire(1).expect("should acquire");
        assert!(sem.try_acquire(1).is_none(), "saturated semaphore should not queue");
        drop(p1);
        assert!(sem.try_acquire(1).is_some());
        drop(p2);
    }

    #[test]
    fn permit_release_on_drop() {
        let sem = WeightedSemaphore::new(1);
        assert_eq!(sem.available(), 1);
        {
            let _permit = sem.try_acquire(1).unwrap();
            assert_eq!(sem.available(), 0);
        }
        assert_eq!(sem.available(), 1);
    }

    #[test]
    fn weighted_acquire() {
        let sem = WeightedSemaphore::new(5);
        let _big = sem.try_acquire(3).unwrap();
        assert!(sem.try_acquire(3).is_none());
        assert!(sem.try_acquire(2).is_some());
    }
}
