//! Time abstraction used throughout the inode layer.
//!
//! Every call into a [Clock] is a potential source of test flakiness if it reads real wall-clock
//! time, so every component that needs "now" takes a `&dyn Clock` (or a generic `C: Clock`)
//! instead of calling `OffsetDateTime::now_utc()` or `Instant::now()` directly.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use time::OffsetDateTime;

/// A source of monotonic and wall-clock time, substitutable in tests.
pub trait Clock: Send + Sync {
    /// Monotonic time, used for TTL and expiry bookkeeping. Never goes backwards.
    fn monotonic_now(&self) -> Instant;

    /// Wall-clock time, used for metadata timestamps (mtime/ctime/atime).
    fn now(&self) -> OffsetDateTime;
}

/// The real clock, backed by [Instant::now] and [OffsetDateTime::now_utc].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn monotonic_now(&self) -> Instant {
        Instant::now()
    }

    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// A clock whose value is set explicitly by the test, rather than tracking real time.
///
/// `monotonic_now` is derived from an internal offset applied to the clock's own creation instant,
/// so it remains monotonic even as [TestClock::advance] moves `now()` forward.
#[derive(Debug, Clone)]
pub struct TestClock {
    inner: Arc<TestClockInner>,
}

#[derive(Debug)]
struct TestClockInner {
    epoch: Instant,
    offset_nanos: AtomicU64,
    wall_epoch: OffsetDateTime,
}

impl TestClock {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TestClockInner {
                epoch: Instant::now(),
                offset_nanos: AtomicU64::new(0),
                wall_epoch: OffsetDateTime::UNIX_EPOCH,
            }),
        }
    }

    /// Move the clock forward by `duration`. Never moves it backwards.
    pub fn advance(&self, duration: Duration) {
        self.inner
            .offset_nanos
            .fetch_add(duration.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl Default for TestClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TestClock {
    fn monotonic_now(&self) -> Instant {
        let offset = Duration::from_nanos(self.inner.offset_nanos.load(Ordering::SeqCst));
        self.inner.epoch + offset
    }

    fn now(&self) -> OffsetDateTime {
        let offset = Duration::from_nanos(self.inner.offset_nanos.load(Ordering::SeqCst));
        self.inner.wall_epoch + offset
    }
}
