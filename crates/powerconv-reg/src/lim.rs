//! Reference, measurement and RMS limits.
//!
//! # RT Safety
//!
//! Every `apply`/`check` method is allocation-free and O(1).

use powerconv_fg::FgLimits;
use serde::{Deserialize, Serialize};

/// Fraction of the measurement range beyond the limits that trips the
/// measurement.
pub const REG_MEAS_TRIP_FACTOR: f64 = 0.05;

/// Relative hysteresis applied to the low, zero and warning flags.
pub const REG_LIM_HYSTERESIS: f64 = 0.2;

/// Limits on a reference.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RefLimitsConfig {
    /// Positive limit.
    pub pos: f64,
    /// Minimum magnitude when `neg` is not negative.
    pub min: f64,
    /// Negative limit.
    pub neg: f64,
    /// Rate limit, zero for none.
    pub rate: f64,
    /// Acceleration limit for function arming, zero for none.
    pub acceleration: f64,
    /// Measurement below which regulation runs open loop, zero for never.
    pub closeloop: f64,
}

/// Which limiting actions were taken on a reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LimitFlags {
    /// The value was clipped to the range.
    pub clip: bool,
    /// The change was clipped to the rate limit.
    pub rate: bool,
}

impl LimitFlags {
    /// Whether any limiting happened.
    #[inline]
    pub fn any(self) -> bool {
        self.clip || self.rate
    }
}

/// Reference limiter, optionally inverted for negative-polarity circuits.
///
/// # Example
///
/// ```
/// use powerconv_reg::lim::{RefLimits, RefLimitsConfig};
///
/// let limits = RefLimits::new(
///     &RefLimitsConfig { pos: 10.0, neg: -10.0, rate: 5.0, ..RefLimitsConfig::default() },
///     false,
/// );
/// let (value, flags) = limits.apply(20.0, 9.0, 0.1);
/// assert_eq!(value, 9.5);
/// assert!(flags.clip && flags.rate);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RefLimits {
    config: RefLimitsConfig,
    inverted: bool,
}

impl RefLimits {
    /// Limiter for `config`, reflected about zero when `inverted`.
    pub fn new(config: &RefLimitsConfig, inverted: bool) -> Self {
        Self {
            config: *config,
            inverted,
        }
    }

    /// Configured limits.
    pub fn config(&self) -> &RefLimitsConfig {
        &self.config
    }

    /// Whether the limits are reflected.
    pub fn inverted(&self) -> bool {
        self.inverted
    }

    /// Legal range `(low, high)` after inversion.
    pub fn bounds(&self) -> (f64, f64) {
        let lower = if self.config.neg < 0.0 { self.config.neg } else { self.config.min };
        if self.inverted {
            (-self.config.pos, -lower)
        } else {
            (lower, self.config.pos)
        }
    }

    /// Clip `reference` to the range and its change since `previous` to the
    /// rate limit over `period` seconds.
    #[inline]
    pub fn apply(&self, reference: f64, previous: f64, period: f64) -> (f64, LimitFlags) {
        let (low, high) = self.bounds();
        let mut flags = LimitFlags::default();

        let mut value = if low <= high { reference.clamp(low, high) } else { reference };
        flags.clip = value != reference;

        if self.config.rate > 0.0 {
            let max_step = self.config.rate * period;
            let step = value - previous;
            if step.abs() > max_step {
                value = previous + max_step.copysign(step);
                flags.rate = true;
            }
        }

        (value, flags)
    }

    /// Whether `meas` is below the close-loop threshold.
    #[inline]
    pub fn below_closeloop(&self, meas: f64) -> bool {
        let signed = if self.inverted { -meas } else { meas };
        self.config.closeloop > 0.0 && signed < self.config.closeloop
    }

    /// Limits for arming functions against this limiter.
    pub fn fg_limits(&self) -> FgLimits {
        FgLimits::new(
            self.config.pos,
            self.config.min,
            self.config.neg,
            self.config.rate,
            self.config.acceleration,
        )
    }
}

/// Low and zero thresholds for a measurement.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MeasLimitsConfig {
    /// Magnitude below which the measurement is flagged low, zero for none.
    pub low: f64,
    /// Magnitude below which the measurement is flagged zero, zero for none.
    pub zero: f64,
}

/// Measurement limit flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MeasFlags {
    /// Measurement outside the trip range.
    pub trip: bool,
    /// Measurement magnitude low.
    pub low: bool,
    /// Measurement magnitude near zero.
    pub zero: bool,
}

/// Measurement limit checker.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MeasLimits {
    pos_trip: f64,
    neg_trip: f64,
    low: f64,
    zero: f64,
    flags: MeasFlags,
}

impl MeasLimits {
    /// Checker tripping [`REG_MEAS_TRIP_FACTOR`] of the range beyond
    /// `pos`/`neg`.
    pub fn new(pos: f64, neg: f64, config: &MeasLimitsConfig) -> Self {
        let margin = REG_MEAS_TRIP_FACTOR * (pos - neg).abs();
        Self {
            pos_trip: pos + margin,
            neg_trip: neg - margin,
            low: config.low,
            zero: config.zero,
            flags: MeasFlags::default(),
        }
    }

    /// Check one measurement.
    #[inline]
    pub fn check(&mut self, meas: f64) -> MeasFlags {
        let magnitude = meas.abs();
        self.flags = MeasFlags {
            trip: meas > self.pos_trip || meas < self.neg_trip,
            low: below_with_hysteresis(magnitude, self.low, self.flags.low),
            zero: below_with_hysteresis(magnitude, self.zero, self.flags.zero),
        };
        self.flags
    }

    /// Flags from the last check.
    pub fn flags(&self) -> MeasFlags {
        self.flags
    }
}

fn below_with_hysteresis(magnitude: f64, threshold: f64, active: bool) -> bool {
    if threshold <= 0.0 {
        return false;
    }
    let threshold = if active { threshold * (1.0 + REG_LIM_HYSTERESIS) } else { threshold };
    magnitude < threshold
}

/// RMS current limits.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RmsLimitsConfig {
    /// Warning threshold, zero for none.
    pub warning: f64,
    /// Fault threshold, zero for none.
    pub fault: f64,
    /// Time constant of the first-order `I²` filter in seconds.
    pub filter_tc: f64,
}

/// RMS limit flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RmsFlags {
    /// RMS above the warning threshold.
    pub warning: bool,
    /// RMS above the fault threshold.
    pub fault: bool,
}

/// RMS limit checker.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RmsLimits {
    config: RmsLimitsConfig,
    factor: f64,
    meas2_filter: f64,
    flags: RmsFlags,
}

impl RmsLimits {
    /// Checker updated every `iter_period` seconds.
    pub fn new(config: &RmsLimitsConfig, iter_period: f64) -> Self {
        let factor = if config.filter_tc > 0.0 {
            1.0 - (-iter_period / config.filter_tc).exp()
        } else {
            1.0
        };
        Self {
            config: *config,
            factor,
            meas2_filter: 0.0,
            flags: RmsFlags::default(),
        }
    }

    /// Check one measurement.
    #[inline]
    pub fn check(&mut self, meas: f64) -> RmsFlags {
        self.meas2_filter += self.factor * (meas * meas - self.meas2_filter);
        let rms = self.rms();

        let warning = self.config.warning > 0.0
            && if self.flags.warning {
                rms > self.config.warning * (1.0 - REG_LIM_HYSTERESIS)
            } else {
                rms > self.config.warning
            };
        let fault = self.config.fault > 0.0 && rms > self.config.fault;

        self.flags = RmsFlags { warning, fault };
        self.flags
    }

    /// Filtered RMS value.
    #[inline]
    pub fn rms(&self) -> f64 {
        self.meas2_filter.sqrt()
    }

    /// Flags from the last check.
    pub fn flags(&self) -> RmsFlags {
        self.flags
    }

    /// Restart the filter from `meas`.
    pub fn init_history(&mut self, meas: f64) {
        self.meas2_filter = meas * meas;
        self.flags = RmsFlags::default();
    }
}
