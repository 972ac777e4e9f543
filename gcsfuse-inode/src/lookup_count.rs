//! Per-inode reference counter driven by kernel lookup/forget, gating destruction.

use std::sync::atomic::{AtomicU64, Ordering};

/// Mirrors the FUSE lookup-count protocol: every `lookup`, `create`, or `readdir` entry that is
/// "remembered" increments the count; every `forget` decrements it by the forget count. An inode
/// is eligible for destruction only once its count reaches zero.
#[derive(Debug)]
pub struct LookupCount(AtomicU64);

impl LookupCount {
    /// A freshly looked-up or created inode starts with one outstanding reference: the one just
    /// handed back to the caller.
    pub fn new() -> Self {
        Self(AtomicU64::new(1))
    }

    pub fn increment(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    /// Decrement by `n`, returning the count after decrementing. Saturates at zero rather than
    /// wrapping if `n` exceeds the current count, which should never happen in a well-behaved
    /// kernel but would otherwise be an easy way to corrupt the destruction protocol.
    pub fn decrement(&self, n: u64) -> u64 {
        loop {
            let current = self.0.load(Ordering::SeqCst);
            let next = current.saturating_sub(n);
            if self
                .0
                .compare_exchange(current, next, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return next;
            }
        }
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    pub fn is_zero(&self) -> bool {
        self.get() == 0
    }
}

impl Default for LookupCount {
    fn default() -> Self {
        Self::new()
    }
}
