//! Clock - Injectable Time Source
//!
//! TigerStyle: backends never read wall time directly; they ask a `Clock`.
//! Creation order and `created_at` order agree for every clock here.
//!
//! Timestamps are truncated to microseconds, the resolution of Postgres
//! `TIMESTAMPTZ`, so a value survives a database round trip unchanged.

use std::fmt::Debug;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};

use crate::constants::TIME_MICROS_PER_SEC;

/// A source of creation timestamps.
pub trait Clock: Send + Sync + Debug {
    /// Current time. Successive calls on one clock never go backwards.
    fn now(&self) -> DateTime<Utc>;
}

fn from_micros(micros: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(micros).unwrap_or_else(Utc::now)
}

// =============================================================================
// SystemClock
// =============================================================================

/// Wall clock that is strictly monotonic at microsecond resolution.
///
/// Two calls inside the same microsecond (or across a backwards NTP step)
/// still yield increasing values, so ordering by `created_at` reproduces
/// insertion order.
#[derive(Debug, Default)]
pub struct SystemClock {
    last_micros: AtomicI64,
}

impl SystemClock {
    /// Create a new system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        let wall = Utc::now().timestamp_micros();
        let mut last = self.last_micros.load(Ordering::Acquire);
        loop {
            let next = wall.max(last + 1);
            match self.last_micros.compare_exchange_weak(
                last,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return from_micros(next),
                Err(observed) => last = observed,
            }
        }
    }
}

// =============================================================================
// ManualClock
// =============================================================================

/// A controllable clock for deterministic tests.
///
/// - Time only moves forward
/// - Each `now()` returns the current instant, then advances by `tick`
#[derive(Debug)]
pub struct ManualClock {
    current_micros: AtomicI64,
    tick_micros: i64,
}

impl ManualClock {
    /// Clock starting at `start` that advances one millisecond per read.
    #[must_use]
    pub fn at(start: DateTime<Utc>) -> Self {
        Self::with_tick(start, chrono::Duration::milliseconds(1))
    }

    /// Clock starting at `start` that advances `tick` per read.
    ///
    /// # Panics
    /// Panics if `tick` is negative.
    #[must_use]
    pub fn with_tick(start: DateTime<Utc>, tick: chrono::Duration) -> Self {
        let tick_micros = tick.num_microseconds().unwrap_or(i64::MAX);
        assert!(tick_micros >= 0, "tick must not be negative");
        Self {
            current_micros: AtomicI64::new(start.timestamp_micros()),
            tick_micros,
        }
    }

    /// Peek at the current instant without advancing.
    #[must_use]
    pub fn peek(&self) -> DateTime<Utc> {
        from_micros(self.current_micros.load(Ordering::Acquire))
    }

    /// Advance by whole seconds.
    pub fn advance_secs(&self, secs: i64) {
        assert!(secs >= 0, "secs must be non-negative, got {secs}");
        self.current_micros
            .fetch_add(secs.saturating_mul(TIME_MICROS_PER_SEC), Ordering::AcqRel);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        from_micros(
            self.current_micros
                .fetch_add(self.tick_micros, Ordering::AcqRel),
        )
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn epoch_plus(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn test_system_clock_strictly_increasing() {
        let clock = SystemClock::new();
        let mut previous = clock.now();
        for _ in 0..1_000 {
            let next = clock.now();
            assert!(next > previous, "{next} should be after {previous}");
            previous = next;
        }
    }

    #[test]
    fn test_system_clock_microsecond_resolution() {
        let clock = SystemClock::new();
        let now = clock.now();
        assert_eq!(now.timestamp_subsec_nanos() % 1_000, 0);
    }

    #[test]
    fn test_manual_clock_ticks_per_read() {
        let clock = ManualClock::at(epoch_plus(1_000));

        assert_eq!(clock.now(), epoch_plus(1_000));
        assert_eq!(
            clock.now(),
            epoch_plus(1_000) + chrono::Duration::milliseconds(1)
        );
    }

    #[test]
    fn test_manual_clock_zero_tick_is_frozen() {
        let clock = ManualClock::with_tick(epoch_plus(5), chrono::Duration::zero());

        assert_eq!(clock.now(), clock.now());
        assert_eq!(clock.peek(), epoch_plus(5));
    }

    #[test]
    fn test_manual_clock_advance_secs() {
        let clock = ManualClock::with_tick(epoch_plus(0), chrono::Duration::zero());

        clock.advance_secs(90);

        assert_eq!(clock.peek(), epoch_plus(90));
    }

    #[test]
    #[should_panic(expected = "tick must not be negative")]
    fn test_manual_clock_rejects_negative_tick() {
        let _ = ManualClock::with_tick(epoch_plus(0), chrono::Duration::seconds(-1));
    }
}
