//! Validity window for a cached value, measured against a [Clock].

use std::time::{Duration, Instant};

use crate::clock::Clock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Deadline {
    /// Already past, regardless of what time it is now.
    AlreadyExpired,
    /// Expires at a fixed monotonic instant.
    At(Instant),
    /// Never expires.
    Never,
}

/// The time at which a cached value becomes invalid and must be refreshed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expiry(Deadline);

impl Expiry {
    /// An expiry that is always already expired.
    pub fn already_expired() -> Self {
        Self(Deadline::AlreadyExpired)
    }

    /// An expiry that never expires.
    pub fn never() -> Self {
        Self(Deadline::Never)
    }

    /// An expiry `validity` in the future, relative to `clock`'s current monotonic time.
    pub fn from_clock(clock: &dyn Clock, validity: Duration) -> Self {
        Self(Deadline::At(clock.monotonic_now() + validity))
    }

    pub fn is_expired(&self, clock: &dyn Clock) -> bool {
        match self.0 {
            Deadline::AlreadyExpired => true,
            Deadline::Never => false,
            Deadline::At(deadline) => clock.monotonic_now() >= deadline,
        }
    }

    /// Remaining time-to-live, or zero if already expired.
    pub fn remaining_ttl(&self, clock: &dyn Clock) -> Duration {
        match self.0 {
            Deadline::AlreadyExpired => Duration::ZERO,
            Deadline::Never => Duration::MAX,
            Deadline::At(deadline) => deadline.saturating_duration_since(clock.monotonic_now()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TestClock;

    #[test]
    fn expiry_ttl_boundary() {
        let clock = TestClock::new();
        let ttl = Duration::from_secs(10);
        let expiry = Expiry::from_clock(&clock, ttl);

        assert!(!expiry.is_expired(&clock));
        clock.advance(Duration::from_secs(9));
        assert!(!expiry.is_expired(&clock));
        clock.advance(Duration::from_secs(1));
        assert!(expiry.is_expired(&clock));
    }

    #[test]
    fn never_expires() {
        let clock = TestClock::new();
        let expiry = Expiry::never();
        clock.advance(Duration::from_secs(1_000_000));
        assert!(!expiry.is_expired(&clock));
    }

    #[test]
    fn already_expired() {
        let clock = TestClock::new();
        assert!(Expiry::already_expired().is_expired(&clock));
    }
}
