//! RAMP: accelerating parabola, optional linear segment, decelerating parabola.
//!
//! Unlike the other functions a ramp can start from a non-zero rate, which
//! lets it take over from a function that is still moving. The initial rate
//! places the start of the function part way along the accelerating parabola;
//! the parabola's virtual origin may therefore lie before the start time.
//!
//! When the initial rate points away from the final reference, or would
//! overshoot it, the accelerating parabola first brings the reference to a
//! stop and then turns it round.
//!
//! A ramp armed with feedback can also be slowed down by the caller: if the
//! reference actually applied on the previous iteration lags the ramp (for
//! example because a rate limit clipped it), the ramp shifts itself in time
//! so that it continues from the applied value.

use serde::{Deserialize, Serialize};

use crate::error::FgError;
use crate::function::{ArmContext, ArmedFunction, FgShape, FunctionKind};
use crate::limits::{CheckPoint, check_points};
use crate::meta::{FgPhase, FunctionMeta};

/// Tolerance used to decide that the applied reference differs from the ramp.
const FEEDBACK_TOLERANCE: f64 = 1e-9;

/// RAMP parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RampConfig {
    /// Final reference.
    pub final_ref: f64,
    /// Acceleration magnitude.
    pub acceleration: f64,
    /// Rate limit of the linear segment, zero for no limit.
    pub linear_rate: f64,
    /// Deceleration magnitude.
    pub deceleration: f64,
}

impl Default for RampConfig {
    fn default() -> Self {
        Self {
            final_ref: 0.0,
            acceleration: 1.0,
            linear_rate: 0.0,
            deceleration: 1.0,
        }
    }
}

/// Armed RAMP state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ramp {
    direction: f64,
    acceleration: f64,
    deceleration: f64,
    peak_rate: f64,
    /// Virtual origin, end of acceleration, end of linear, end.
    time: [f64; 4],
    refs: [f64; 4],
    initial_ref: f64,
    time_shift: f64,
    prev_time: f64,
    prev_ref: f64,
}

impl Ramp {
    /// Arm a ramp from `ctx.initial_ref` moving at `ctx.initial_rate`.
    ///
    /// # Errors
    ///
    /// Returns [`FgError::BadParameter`] for a zero acceleration or
    /// deceleration and a limit error when the ramp violates `ctx.limits`.
    pub fn arm(ctx: &ArmContext, config: &RampConfig) -> Result<ArmedFunction, FgError> {
        let acc = config.acceleration.abs();
        if !(acc > 0.0) {
            return Err(FgError::bad_parameter(0, "acceleration", config.acceleration));
        }
        let dec = config.deceleration.abs();
        if !(dec > 0.0) {
            return Err(FgError::bad_parameter(0, "deceleration", config.deceleration));
        }
        let linear_limit = config.linear_rate.abs();

        let r_init = ctx.initial_ref;
        let v0 = ctx.initial_rate;
        let to_go = config.final_ref - r_init;

        let mut first_acc = acc;
        let positive = if v0 != 0.0 && to_go * v0 >= 0.0 {
            let stop_ref = r_init + v0 * v0.abs() / (2.0 * dec);
            if (config.final_ref - stop_ref) * v0 < 0.0 {
                // Overshoot: stop with the deceleration, then come back.
                first_acc = dec;
                v0 < 0.0
            } else {
                v0 > 0.0
            }
        } else {
            to_go >= 0.0
        };
        let sg = if positive { 1.0 } else { -1.0 };

        let acc_s = sg * first_acc;
        let t0 = ctx.delay - v0 / acc_s;
        let ref0 = r_init - v0 * v0 / (2.0 * acc_s);
        let delta = (sg * (config.final_ref - ref0)).max(0.0);

        let mut s1 = delta * dec / (first_acc + dec);
        let mut peak = (2.0 * first_acc * s1).sqrt();
        let mut linear = 0.0;

        let toward_rate = (sg * v0).max(0.0);
        let rate_limit = if linear_limit > 0.0 { linear_limit.max(toward_rate) } else { 0.0 };
        if rate_limit > 0.0 && peak > rate_limit {
            peak = rate_limit;
            s1 = peak * peak / (2.0 * first_acc);
            linear = delta - s1 - peak * peak / (2.0 * dec);
        }

        let t1 = t0 + peak / first_acc;
        let t2 = t1 + if linear > 0.0 { linear / peak } else { 0.0 };
        let t3 = t2 + peak / dec;

        let ref1 = ref0 + sg * s1;
        let ref2 = ref1 + sg * linear;

        let ramp = Self {
            direction: sg,
            acceleration: first_acc,
            deceleration: dec,
            peak_rate: peak,
            time: [t0, t1, t2, t3],
            refs: [ref0, ref1, ref2, config.final_ref],
            initial_ref: r_init,
            time_shift: 0.0,
            prev_time: ctx.delay,
            prev_ref: r_init,
        };

        let mut meta = FunctionMeta::new(ctx.delay, r_init);
        if t0 > ctx.delay {
            meta.include(ref0);
        }
        meta.include(ref1);
        meta.include(ref2);
        let end = t3.max(ctx.delay);
        meta.set_end(end, config.final_ref, 0.0);

        let mut points = Vec::with_capacity(4);
        points.push(CheckPoint::new(0, r_init, v0, acc_s));
        if t0 > ctx.delay {
            points.push(CheckPoint::new(1, ref0, 0.0, acc_s));
        }
        points.push(CheckPoint::new(2, ref1, sg * peak, acc_s));
        points.push(CheckPoint::new(3, ref2, sg * peak, -sg * dec));
        points.push(CheckPoint::new(4, config.final_ref, 0.0, -sg * dec));

        check_points(&mut meta, ctx.limits(), ctx.polarity, &points)?;

        Ok(ArmedFunction::new(FunctionKind::Ramp, meta, FgShape::Ramp(ramp)))
    }

    /// Current time shift introduced by reference feedback.
    pub fn time_shift(&self) -> f64 {
        self.time_shift
    }

    /// Peak rate magnitude reached by the ramp.
    pub fn peak_rate(&self) -> f64 {
        self.peak_rate
    }

    /// Sample with feedback of the reference applied on the previous
    /// iteration. A lagging applied reference slides the ramp and its end
    /// time later.
    pub(crate) fn generate_with_feedback(
        &mut self,
        meta: &mut FunctionMeta,
        time: f64,
        applied_ref: f64,
    ) -> (FgPhase, f64) {
        if time >= self.prev_time
            && time >= meta.time.start
            && (applied_ref - self.prev_ref).abs() > FEEDBACK_TOLERANCE
            && self.direction * (applied_ref - self.prev_ref) < 0.0
        {
            if let Some(virtual_time) = self.time_of(applied_ref) {
                let shift = self.prev_time - virtual_time;
                if shift > self.time_shift {
                    self.time_shift = shift;
                    meta.time.end = (self.time[3] + shift).max(meta.time.start);
                    meta.time.duration = meta.time.end - meta.time.start;
                }
            }
        }

        let sample = meta
            .outside(time)
            .unwrap_or_else(|| (FgPhase::During, self.sample(time)));
        if time >= self.prev_time {
            self.prev_time = time;
            self.prev_ref = sample.1;
        }
        sample
    }

    pub(crate) fn sample(&self, time: f64) -> f64 {
        self.sample_shifted(time - self.time_shift)
    }

    fn sample_shifted(&self, t: f64) -> f64 {
        if t < self.time[1] {
            let dt = t - self.time[0];
            self.refs[0] + 0.5 * self.direction * self.acceleration * dt * dt
        } else if t < self.time[2] {
            self.refs[1] + self.direction * self.peak_rate * (t - self.time[1])
        } else {
            let dt = self.time[3] - t;
            self.refs[3] - 0.5 * self.direction * self.deceleration * dt * dt
        }
    }

    /// Virtual time at which the unshifted ramp passes through `reference`,
    /// if it does.
    fn time_of(&self, reference: f64) -> Option<f64> {
        let travelled = self.direction * (reference - self.refs[0]);
        if travelled < 0.0 {
            return None;
        }
        let s1 = self.direction * (self.refs[1] - self.refs[0]);
        if travelled <= s1 {
            return Some(self.time[0] + (2.0 * travelled / self.acceleration).sqrt());
        }
        let linear = self.direction * (reference - self.refs[1]);
        if self.time[2] > self.time[1] && linear <= self.direction * (self.refs[2] - self.refs[1]) {
            return Some(self.time[1] + linear / self.peak_rate);
        }
        let remaining = self.direction * (self.refs[3] - reference);
        if remaining >= 0.0 {
            return Some(self.time[3] - (2.0 * remaining / self.deceleration).sqrt());
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn cfg(final_ref: f64) -> RampConfig {
        RampConfig {
            final_ref,
            acceleration: 4.0,
            linear_rate: 1.0,
            deceleration: 6.0,
        }
    }

    #[test]
    fn test_ramp_with_linear_segment_duration() -> Result<(), FgError> {
        let mut f = Ramp::arm(&ArmContext::from_initial_ref(0.0), &cfg(10.0))?;
        let expected = 0.25 + (10.0 - 0.125 - 1.0 / 12.0) + 1.0 / 6.0;
        assert_abs_diff_eq!(f.meta().time.end, expected, epsilon = 1e-12);
        assert_eq!(f.generate(expected), (FgPhase::Post, 10.0));
        assert_eq!(f.generate(expected + 10.0), (FgPhase::Post, 10.0));
        assert_abs_diff_eq!(f.generate(0.25).1, 0.125, epsilon = 1e-12);
        Ok(())
    }

    #[test]
    fn test_ramp_without_rate_limit_is_two_parabolas() -> Result<(), FgError> {
        let config = RampConfig {
            linear_rate: 0.0,
            acceleration: 1.0,
            deceleration: 1.0,
            final_ref: 4.0,
        };
        let mut f = Ramp::arm(&ArmContext::from_initial_ref(0.0), &config)?;
        assert_abs_diff_eq!(f.meta().time.end, 4.0, epsilon = 1e-12);
        assert_abs_diff_eq!(f.generate(2.0).1, 2.0, epsilon = 1e-12);
        Ok(())
    }

    #[test]
    fn test_initial_rate_away_from_target_turns_round() -> Result<(), FgError> {
        let ctx = ArmContext {
            initial_ref: 0.0,
            initial_rate: -2.0,
            ..ArmContext::default()
        };
        let config = RampConfig {
            final_ref: 5.0,
            acceleration: 2.0,
            linear_rate: 0.0,
            deceleration: 2.0,
        };
        let mut f = Ramp::arm(&ctx, &config)?;
        // Stops at -1 after one second.
        assert_abs_diff_eq!(f.generate(1.0).1, -1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(f.meta().range.min, -1.0, epsilon = 1e-12);
        let (_, start) = f.generate(0.0);
        assert_abs_diff_eq!(start, 0.0, epsilon = 1e-12);
        let slightly_later = f.generate(1e-3).1;
        assert!(slightly_later < 0.0);
        Ok(())
    }

    #[test]
    fn test_initial_rate_toward_target_continues() -> Result<(), FgError> {
        let ctx = ArmContext {
            initial_ref: 0.0,
            initial_rate: 1.0,
            ..ArmContext::default()
        };
        let mut f = Ramp::arm(&ctx, &cfg(10.0))?;
        // Already at the rate limit: continue linearly.
        assert_abs_diff_eq!(f.generate(1.0).1, 1.0, epsilon = 1e-12);
        Ok(())
    }

    #[test]
    fn test_feedback_slides_the_ramp() -> Result<(), FgError> {
        let config = RampConfig {
            final_ref: 10.0,
            acceleration: 1.0,
            linear_rate: 1.0,
            deceleration: 1.0,
        };
        let mut f = Ramp::arm(&ArmContext::from_initial_ref(0.0), &config)?;

        let (_, r1) = f.generate_with_feedback(1.0, 0.0);
        assert_abs_diff_eq!(r1, 0.5, epsilon = 1e-12);

        // The caller could only apply 0.3; the ramp resumes from there.
        let (_, r2) = f.generate_with_feedback(1.0, 0.3);
        let FgShape::Ramp(ramp) = f.shape() else {
            return Err(FgError::bad_parameter(0, "shape", 0.0));
        };
        assert!(ramp.time_shift() > 0.0);
        assert_abs_diff_eq!(r2, 0.3, epsilon = 1e-9);
        Ok(())
    }

    fn held_reference_gaps(start_ms: u32) -> Result<(Vec<f64>, f64, f64), FgError> {
        let mut f = Ramp::arm(&ArmContext::from_initial_ref(0.0), &cfg(10.0))?;
        let armed_end = f.meta().time.end;
        let mut applied = 0.0;
        for k in 0..=start_ms {
            applied = f.generate_with_feedback(f64::from(k) * 1e-3, applied).1;
        }
        let held = applied;
        let mut gaps = Vec::new();
        for k in start_ms + 1..=start_ms + 20 {
            let (_, value) = f.generate_with_feedback(f64::from(k) * 1e-3, held);
            gaps.push(value - held);
        }
        Ok((gaps, armed_end, f.meta().time.end))
    }

    #[test]
    fn test_held_reference_in_linear_segment_stays_one_step_ahead() -> Result<(), FgError> {
        let (gaps, armed_end, end) = held_reference_gaps(5000)?;
        for gap in gaps {
            assert!(gap > 0.0 && gap < 1.1e-3, "gap {gap}");
        }
        assert!(end > armed_end + 0.015);
        Ok(())
    }

    #[test]
    fn test_held_reference_in_deceleration_stays_one_step_ahead() -> Result<(), FgError> {
        // Deceleration runs from about 10.042 s to 10.208 s.
        let (gaps, armed_end, end) = held_reference_gaps(10_060)?;
        for gap in gaps {
            assert!(gap > 0.0 && gap < 1.1e-3, "gap {gap}");
        }
        assert!(end > armed_end + 0.015);
        Ok(())
    }

    #[test]
    fn test_shifted_ramp_finishes_at_the_shifted_end() -> Result<(), FgError> {
        let mut f = Ramp::arm(&ArmContext::from_initial_ref(0.0), &cfg(10.0))?;
        f.generate_with_feedback(10.1, 0.0);
        let clipped = f.generate_with_feedback(10.1, 9.9).1;
        assert_abs_diff_eq!(clipped, 9.9, epsilon = 1e-9);
        let end = f.meta().time.end;
        assert!(end > 10.2084);
        assert_eq!(f.generate_with_feedback(end - 1e-6, 9.9).0, FgPhase::During);
        assert_eq!(f.generate_with_feedback(end, 10.0), (FgPhase::Post, 10.0));
        Ok(())
    }

    #[test]
    fn test_zero_deceleration_rejected() {
        let config = RampConfig {
            deceleration: 0.0,
            ..cfg(1.0)
        };
        assert!(matches!(
            Ramp::arm(&ArmContext::default(), &config),
            Err(FgError::BadParameter { name: "deceleration", .. })
        ));
    }
}
