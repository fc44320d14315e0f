//! Atomic counters for the regulation loop.
//!
//! # RT Safety
//!
//! All methods on [`RegCounters`] are RT-safe:
//! - Use `Ordering::Relaxed` for performance (counters are independent)
//! - No heap allocations
//! - Bounded execution time

use core::sync::atomic::{AtomicU64, Ordering};

/// Counter snapshot returned by [`RegCounters::snapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CounterSnapshot {
    /// Iterations processed
    pub iterations: u64,
    /// Iterations that started a regulation period
    pub reg_iterations: u64,
    /// Measurements flagged invalid and replaced
    pub invalid_meas: u64,
    /// Length of the current run of invalid measurements
    pub consecutive_invalid_meas: u64,
    /// Longest run of invalid measurements seen
    pub max_consecutive_invalid_meas: u64,
    /// Iterations where the reference was clipped to its limits
    pub ref_clipped: u64,
    /// Iterations where the reference was rate limited
    pub ref_rate_limited: u64,
}

/// Counters updated by the regulation loop and read by a background
/// collector.
///
/// # Example
///
/// ```rust
/// use powerconv_atomic::RegCounters;
///
/// let counters = RegCounters::new();
/// for _ in 0..3 {
///     counters.record_meas(false);
/// }
/// counters.record_meas(true);
///
/// let snapshot = counters.snapshot();
/// assert_eq!(snapshot.max_consecutive_invalid_meas, 3);
/// ```
#[derive(Debug)]
pub struct RegCounters {
    iterations: AtomicU64,
    reg_iterations: AtomicU64,
    invalid_meas: AtomicU64,
    consecutive_invalid_meas: AtomicU64,
    max_consecutive_invalid_meas: AtomicU64,
    ref_clipped: AtomicU64,
    ref_rate_limited: AtomicU64,
}

impl Default for RegCounters {
    fn default() -> Self {
        Self::new()
    }
}

impl RegCounters {
    /// Create counters initialised to zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            iterations: AtomicU64::new(0),
            reg_iterations: AtomicU64::new(0),
            invalid_meas: AtomicU64::new(0),
            consecutive_invalid_meas: AtomicU64::new(0),
            max_consecutive_invalid_meas: AtomicU64::new(0),
            ref_clipped: AtomicU64::new(0),
            ref_rate_limited: AtomicU64::new(0),
        }
    }

    /// Count one iteration.
    #[inline]
    pub fn inc_iteration(&self) {
        self.iterations.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one regulation period.
    #[inline]
    pub fn inc_reg_iteration(&self) {
        self.reg_iterations.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the validity of this iteration's measurement.
    ///
    /// Returns the length of the current run of invalid measurements.
    #[inline]
    pub fn record_meas(&self, valid: bool) -> u64 {
        if valid {
            self.consecutive_invalid_meas.store(0, Ordering::Relaxed);
            return 0;
        }

        self.invalid_meas.fetch_add(1, Ordering::Relaxed);
        let run = self.consecutive_invalid_meas.fetch_add(1, Ordering::Relaxed) + 1;
        self.max_consecutive_invalid_meas.fetch_max(run, Ordering::Relaxed);
        run
    }

    /// Record whether the reference limiter clipped or rate limited.
    #[inline]
    pub fn record_ref_limited(&self, clipped: bool, rate_limited: bool) {
        if clipped {
            self.ref_clipped.fetch_add(1, Ordering::Relaxed);
        }
        if rate_limited {
            self.ref_rate_limited.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Length of the current run of invalid measurements.
    #[inline]
    pub fn consecutive_invalid_meas(&self) -> u64 {
        self.consecutive_invalid_meas.load(Ordering::Relaxed)
    }

    /// Read all counters.
    #[must_use]
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            iterations: self.iterations.load(Ordering::Relaxed),
            reg_iterations: self.reg_iterations.load(Ordering::Relaxed),
            invalid_meas: self.invalid_meas.load(Ordering::Relaxed),
            consecutive_invalid_meas: self.consecutive_invalid_meas.load(Ordering::Relaxed),
            max_consecutive_invalid_meas: self.max_consecutive_invalid_meas.load(Ordering::Relaxed),
            ref_clipped: self.ref_clipped.load(Ordering::Relaxed),
            ref_rate_limited: self.ref_rate_limited.load(Ordering::Relaxed),
        }
    }

    /// Read all counters and reset them to zero.
    ///
    /// The current run of invalid measurements is kept so that a run in
    /// progress is not split.
    pub fn snapshot_and_reset(&self) -> CounterSnapshot {
        CounterSnapshot {
            iterations: self.iterations.swap(0, Ordering::Relaxed),
            reg_iterations: self.reg_iterations.swap(0, Ordering::Relaxed),
            invalid_meas: self.invalid_meas.swap(0, Ordering::Relaxed),
            consecutive_invalid_meas: self.consecutive_invalid_meas.load(Ordering::Relaxed),
            max_consecutive_invalid_meas: self.max_consecutive_invalid_meas.swap(0, Ordering::Relaxed),
            ref_clipped: self.ref_clipped.swap(0, Ordering::Relaxed),
            ref_rate_limited: self.ref_rate_limited.swap(0, Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_run_tracking() {
        let counters = RegCounters::new();
        assert_eq!(counters.record_meas(false), 1);
        assert_eq!(counters.record_meas(false), 2);
        assert_eq!(counters.record_meas(true), 0);
        assert_eq!(counters.record_meas(false), 1);

        let snapshot = counters.snapshot();
        assert_eq!(snapshot.invalid_meas, 3);
        assert_eq!(snapshot.consecutive_invalid_meas, 1);
        assert_eq!(snapshot.max_consecutive_invalid_meas, 2);
    }

    #[test]
    fn test_snapshot_and_reset_keeps_current_run() {
        let counters = RegCounters::new();
        counters.inc_iteration();
        counters.record_ref_limited(true, true);
        counters.record_meas(false);

        let first = counters.snapshot_and_reset();
        assert_eq!(first.iterations, 1);
        assert_eq!(first.ref_clipped, 1);
        assert_eq!(first.ref_rate_limited, 1);

        let second = counters.snapshot();
        assert_eq!(second.iterations, 0);
        assert_eq!(second.invalid_meas, 0);
        assert_eq!(second.consecutive_invalid_meas, 1);
    }
}
