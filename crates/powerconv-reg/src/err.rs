//! Regulation error tracking.

use serde::{Deserialize, Serialize};

use crate::lim::REG_LIM_HYSTERESIS;

/// Regulation error thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrLimitsConfig {
    /// Warning threshold, zero for none.
    pub warning: f64,
    /// Fault threshold, zero for none.
    pub fault: f64,
}

/// Error flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ErrFlags {
    /// Error above the warning threshold.
    pub warning: bool,
    /// Error exceeded the fault threshold since the last reset.
    pub fault: bool,
}

/// Tracks the regulation error, its maximum and the warning and fault
/// flags.
///
/// The warning clears with hysteresis once the error falls back. The fault
/// is latched until [`RegErrTracker::reset`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RegErrTracker {
    limits: ErrLimitsConfig,
    err: f64,
    max_abs_err: f64,
    flags: ErrFlags,
}

impl RegErrTracker {
    /// Tracker with the given thresholds.
    pub fn new(limits: &ErrLimitsConfig) -> Self {
        Self {
            limits: *limits,
            ..Self::default()
        }
    }

    /// Replace the thresholds, keeping the state.
    pub fn set_limits(&mut self, limits: &ErrLimitsConfig) {
        self.limits = *limits;
    }

    /// Record a new error. The maximum is only updated when `track_max`.
    #[inline]
    pub fn check(&mut self, err: f64, track_max: bool) -> ErrFlags {
        let magnitude = err.abs();
        self.err = err;
        if track_max && magnitude > self.max_abs_err {
            self.max_abs_err = magnitude;
        }

        if self.limits.warning > 0.0 {
            self.flags.warning = if self.flags.warning {
                magnitude > self.limits.warning * (1.0 - REG_LIM_HYSTERESIS)
            } else {
                magnitude > self.limits.warning
            };
        }
        if self.limits.fault > 0.0 && magnitude > self.limits.fault {
            self.flags.fault = true;
        }
        self.flags
    }

    /// Last error.
    #[inline]
    pub fn err(&self) -> f64 {
        self.err
    }

    /// Largest error magnitude since the last reset.
    pub fn max_abs_err(&self) -> f64 {
        self.max_abs_err
    }

    /// Current flags.
    pub fn flags(&self) -> ErrFlags {
        self.flags
    }

    /// Reset the maximum only.
    pub fn reset_max(&mut self) {
        self.max_abs_err = 0.0;
    }

    /// Reset the error, its maximum and both flags.
    pub fn reset(&mut self) {
        self.err = 0.0;
        self.max_abs_err = 0.0;
        self.flags = ErrFlags::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_only_tracked_on_request() {
        let mut tracker = RegErrTracker::new(&ErrLimitsConfig::default());
        tracker.check(-3.0, false);
        assert_eq!(tracker.max_abs_err(), 0.0);
        tracker.check(-3.0, true);
        tracker.check(1.0, true);
        assert_eq!(tracker.max_abs_err(), 3.0);
        assert_eq!(tracker.err(), 1.0);
    }

    #[test]
    fn test_fault_latches_warning_does_not() {
        let mut tracker = RegErrTracker::new(&ErrLimitsConfig {
            warning: 1.0,
            fault: 2.0,
        });
        assert_eq!(tracker.check(2.5, true), ErrFlags { warning: true, fault: true });
        assert_eq!(tracker.check(0.9, true), ErrFlags { warning: true, fault: true });
        assert_eq!(tracker.check(0.1, true), ErrFlags { warning: false, fault: true });

        tracker.reset();
        assert_eq!(tracker.flags(), ErrFlags::default());
        assert_eq!(tracker.max_abs_err(), 0.0);
    }
}
