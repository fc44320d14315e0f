//! Reference limits and the limit checker used while arming functions.
//!
//! The legal reference range is `[lower, pos]` where `lower` is `neg` when
//! `neg` is negative and `min` otherwise. This lets a unipolar converter keep
//! a non-zero minimum while a bipolar converter uses its negative limit.
//!
//! All bounds are widened by [`FG_CLIP_LIMIT_FACTOR`] so that a function that
//! ends exactly on a limit is not rejected because of rounding.

use serde::{Deserialize, Serialize};

use crate::error::FgError;
use crate::meta::{FgFuncPolarity, FunctionMeta};

/// Relative margin applied to every limit before comparison.
pub const FG_CLIP_LIMIT_FACTOR: f64 = 0.001;

/// Limits on the reference, its rate and its acceleration.
///
/// A zero `rate` or `acceleration` disables that check.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FgLimits {
    /// Positive limit.
    pub pos: f64,
    /// Minimum magnitude for unipolar converters.
    pub min: f64,
    /// Negative limit, zero for unipolar converters.
    pub neg: f64,
    /// Rate limit in units per second.
    pub rate: f64,
    /// Acceleration limit in units per second squared.
    pub acceleration: f64,
}

impl FgLimits {
    /// Create a limit set.
    pub const fn new(pos: f64, min: f64, neg: f64, rate: f64, acceleration: f64) -> Self {
        Self {
            pos,
            min,
            neg,
            rate,
            acceleration,
        }
    }

    /// Lower bound of the legal range.
    pub fn lower(&self) -> f64 {
        if self.neg < 0.0 { self.neg } else { self.min }
    }

    /// Bounds of the legal range after widening, optionally inverted.
    pub fn bounds(&self, inverted: bool) -> (f64, f64) {
        let max = self.pos * (1.0 + FG_CLIP_LIMIT_FACTOR);
        let lower = self.lower();
        let min = if lower < 0.0 {
            lower * (1.0 + FG_CLIP_LIMIT_FACTOR)
        } else {
            lower * (1.0 - FG_CLIP_LIMIT_FACTOR)
        };

        if inverted { (-max, -min) } else { (min, max) }
    }
}

/// Policy for inverting the limits when a polarity switch is fitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FgLimitsPolarity {
    /// Check the function against the limits as given.
    #[default]
    Normal,
    /// Always check with the limits inverted.
    Negative,
    /// Invert only when the function is entirely negative.
    Auto,
}

/// Check a single point against the limits.
///
/// When `inverted` is true the reference, rate and acceleration are negated
/// before the comparison, which is equivalent to mirroring the limits.
///
/// # Errors
///
/// Returns the first violation found, checking the value, then the rate,
/// then the acceleration.
pub fn check_ref(
    limits: &FgLimits,
    inverted: bool,
    index: usize,
    reference: f64,
    rate: f64,
    acceleration: f64,
) -> Result<(), FgError> {
    let (min, max) = limits.bounds(inverted);
    if reference > max || reference < min {
        return Err(FgError::OutOfLimits {
            index,
            value: reference,
            min,
            max,
        });
    }

    if limits.rate > 0.0 && rate.abs() > limits.rate * (1.0 + FG_CLIP_LIMIT_FACTOR) {
        return Err(FgError::OutOfRateLimits {
            index,
            rate,
            limit: limits.rate,
        });
    }

    if limits.acceleration > 0.0
        && acceleration.abs() > limits.acceleration * (1.0 + FG_CLIP_LIMIT_FACTOR)
    {
        return Err(FgError::OutOfAccelerationLimits {
            index,
            acceleration,
            limit: limits.acceleration,
        });
    }

    Ok(())
}

/// A point on a function where the limits must hold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct CheckPoint {
    pub index: usize,
    pub reference: f64,
    pub rate: f64,
    pub acceleration: f64,
}

impl CheckPoint {
    pub(crate) const fn new(index: usize, reference: f64, rate: f64, acceleration: f64) -> Self {
        Self {
            index,
            reference,
            rate,
            acceleration,
        }
    }
}

/// Settle the polarity of `meta` and check the points in order.
///
/// `meta` must already hold the final value range so that the automatic
/// polarity policy can see whether the function is entirely negative.
pub(crate) fn check_points(
    meta: &mut FunctionMeta,
    limits: Option<&FgLimits>,
    policy: FgLimitsPolarity,
    points: &[CheckPoint],
) -> Result<(), FgError> {
    meta.polarity = FgFuncPolarity::from_range(meta.range.min, meta.range.max);

    let Some(limits) = limits else {
        return Ok(());
    };

    let inverted = match policy {
        FgLimitsPolarity::Normal => false,
        FgLimitsPolarity::Negative => true,
        FgLimitsPolarity::Auto => meta.polarity == FgFuncPolarity::Negative,
    };

    meta.limits_inverted = inverted;
    meta.limits = Some(*limits);

    for point in points {
        check_ref(
            limits,
            inverted,
            point.index,
            point.reference,
            point.rate,
            point.acceleration,
        )?;
    }

    Ok(())
}
