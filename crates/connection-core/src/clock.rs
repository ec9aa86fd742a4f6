//! Wall-clock and monotonic time sources

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::types::MonotonicMillis;

static MONOTONIC_ORIGIN: Lazy<Instant> = Lazy::new(Instant::now);

/// Time source used by connections
pub trait Clock: Send + Sync {
    fn now_wall(&self) -> DateTime<Utc>;
    fn now_monotonic(&self) -> MonotonicMillis;
}

/// Clock backed by the system
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_wall(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn now_monotonic(&self) -> MonotonicMillis {
        MonotonicMillis(MONOTONIC_ORIGIN.elapsed().as_millis() as u64)
    }
}

/// Clock that only moves when told to. Wall time is fixed at creation.
#[derive(Debug)]
pub struct ManualClock {
    wall: DateTime<Utc>,
    monotonic: AtomicU64,
}

impl ManualClock {
    pub fn new(start: MonotonicMillis) -> Arc<Self> {
        Arc::new(Self {
            wall: Utc::now(),
            monotonic: AtomicU64::new(start.0),
        })
    }

    pub fn set(&self, now: MonotonicMillis) {
        self.monotonic.store(now.0, Ordering::SeqCst);
    }

    pub fn advance(&self, millis: u64) {
        self.monotonic.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_wall(&self) -> DateTime<Utc> {
        self.wall
    }

    fn now_monotonic(&self) -> MonotonicMillis {
        MonotonicMillis(self.monotonic.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::new(MonotonicMillis(1000));
        clock.advance(500);
        assert_eq!(clock.now_monotonic(), MonotonicMillis(1500));
        clock.set(MonotonicMillis(10));
        assert_eq!(clock.now_monotonic(), MonotonicMillis(10));
    }

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemClock;
        let first = clock.now_monotonic();
        assert!(clock.now_monotonic() >= first);
    }
}
