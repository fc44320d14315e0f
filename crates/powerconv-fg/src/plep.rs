//! PLEP: parabola, linear, exponential, parabola.
//!
//! The function moves from the initial reference to a final reference with
//! bounded acceleration and rate. An optional exponential segment models the
//! natural slowdown of a current that is approaching the voltage limit of the
//! converter: it tends asymptotically towards `exp_final` with time constant
//! `exp_tc`. A non-zero final rate adds a fifth parabolic segment that leaves
//! the function moving at that rate.
//!
//! The rate is not carried through into the fifth parabola. The fourth
//! segment always brings the reference to a stop short of (or beyond) the
//! final reference, and the fifth accelerates away from rest, so a final rate
//! with the same sign as the move makes the reference pause briefly before
//! reaching the final reference.
//!
//! The calculation is done in a normalised frame where the move is ascending.
//! Segments that are not needed have zero duration, so every armed PLEP has
//! the same six boundary times.

use serde::{Deserialize, Serialize};

use crate::error::FgError;
use crate::function::{ArmContext, ArmedFunction, FgShape, FunctionKind};
use crate::limits::{CheckPoint, check_points};
use crate::meta::FunctionMeta;

/// PLEP parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlepConfig {
    /// Final reference.
    pub final_ref: f64,
    /// Acceleration and deceleration magnitude.
    pub acceleration: f64,
    /// Rate of the linear segment.
    pub linear_rate: f64,
    /// Rate at the end of the function.
    pub final_rate: f64,
    /// Time constant of the exponential segment, zero to disable it.
    pub exp_tc: f64,
    /// Asymptote of the exponential segment.
    pub exp_final: f64,
}

impl Default for PlepConfig {
    fn default() -> Self {
        Self {
            final_ref: 0.0,
            acceleration: 1.0,
            linear_rate: 1.0,
            final_rate: 0.0,
            exp_tc: 0.0,
            exp_final: 0.0,
        }
    }
}

/// Armed PLEP segments, in the normalised frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plep {
    normalisation: f64,
    acceleration: f64,
    linear_rate: f64,
    final_acceleration: f64,
    exp_final: f64,
    exp_tc: f64,
    time: [f64; 6],
    refs: [f64; 6],
}

impl Plep {
    /// Arm a PLEP from `ctx.initial_ref` to `config.final_ref`.
    ///
    /// # Errors
    ///
    /// Returns [`FgError::BadParameter`] for a zero acceleration or linear
    /// rate, or a negative time constant, and a limit error when a segment
    /// boundary violates the limits in `ctx`.
    pub fn arm(ctx: &ArmContext, config: &PlepConfig) -> Result<ArmedFunction, FgError> {
        let acc = config.acceleration.abs();
        if !(acc > 0.0 && acc.is_finite()) {
            return Err(FgError::bad_parameter(0, "acceleration", config.acceleration));
        }
        let lin = config.linear_rate.abs();
        if !(lin > 0.0) {
            return Err(FgError::bad_parameter(0, "linear_rate", config.linear_rate));
        }
        if config.exp_tc < 0.0 {
            return Err(FgError::bad_parameter(0, "exp_tc", config.exp_tc));
        }

        let stop_ref =
            config.final_ref - config.final_rate * config.final_rate.abs() / (2.0 * acc);
        let s = if stop_ref >= ctx.initial_ref { 1.0 } else { -1.0 };

        let r0 = s * ctx.initial_ref;
        let r4 = s * stop_ref;
        let final_rate = s * config.final_rate;
        let exp_final = s * config.exp_final;
        let tau = config.exp_tc;
        let delta = r4 - r0;

        let half_l2_a = lin * lin / (2.0 * acc);
        let r_lin = r0 + half_l2_a;
        let r_dec = r4 - half_l2_a;
        let is_par_b4_lin = r_dec < r_lin;

        let mut exp_start = f64::INFINITY;
        let mut r_x = r4;
        let mut v_x = 0.0;
        let mut is_exp_b4_lin = false;

        let exp_distance = exp_final - r4;
        let at2 = acc * tau * tau;
        if tau > 0.0 && exp_distance > 0.0 && at2 >= 2.0 * exp_distance {
            let x = at2 - exp_distance - (at2 * (at2 - 2.0 * exp_distance)).sqrt();
            r_x = r4 - x;
            v_x = (exp_final - r_x) / tau;

            let r_exp = exp_final - lin * tau;
            is_exp_b4_lin = r_exp < r_lin;
            exp_start = if is_exp_b4_lin {
                let f = exp_final - r0;
                let g = f + at2;
                r0 + g - (g * g - f * f).sqrt()
            } else {
                r_exp
            };
        }
        let is_par_b4_exp = !(exp_start < r_x);

        // (peak rate, end of seg 1, end of seg 2, end of seg 3, rate at end of seg 3)
        let (v1, r1, r2, r3, v3) = if is_par_b4_lin && is_par_b4_exp {
            let v = (acc * delta).sqrt();
            let mid = r0 + 0.5 * delta;
            (v, mid, mid, mid, v)
        } else if is_exp_b4_lin && !is_par_b4_exp {
            let v = (2.0 * acc * (exp_start - r0)).sqrt();
            (v, exp_start, exp_start, r_x, v_x)
        } else if !is_par_b4_exp {
            (lin, r_lin, exp_start, r_x, v_x)
        } else {
            (lin, r_lin, r_dec, r_dec, lin)
        };

        let t0 = ctx.delay;
        let t1 = t0 + v1 / acc;
        let t2 = t1 + if r2 > r1 { (r2 - r1) / v1 } else { 0.0 };
        let t3 = t2 + if r3 > r2 { tau * (v1 / v3).ln() } else { 0.0 };
        let t4 = t3 + v3 / acc;
        let t5 = t4 + final_rate.abs() / acc;

        let final_acceleration = if final_rate < 0.0 { -acc } else { acc };

        let plep = Self {
            normalisation: s,
            acceleration: acc,
            linear_rate: v1,
            final_acceleration,
            exp_final,
            exp_tc: tau,
            time: [t0, t1, t2, t3, t4, t5],
            refs: [r0, r1, r2, r3, r4, s * config.final_ref],
        };

        let mut meta = FunctionMeta::new(ctx.delay, ctx.initial_ref);
        for r in plep.refs {
            meta.include(s * r);
        }
        meta.set_end(t5, config.final_ref, config.final_rate);

        let seg_acc = |seg: usize, acc_value: f64| {
            if plep.time[seg] > plep.time[seg - 1] { acc_value } else { 0.0 }
        };
        let exp_acc = if tau > 0.0 { -v1 / tau } else { 0.0 };
        let accs = [
            0.0,
            seg_acc(1, acc),
            0.0,
            seg_acc(3, exp_acc),
            seg_acc(4, -acc),
            seg_acc(5, final_acceleration),
        ];
        let rates = [0.0, v1, v1, v3, 0.0, final_rate];

        let mut points = [CheckPoint::new(0, 0.0, 0.0, 0.0); 6];
        for (i, point) in points.iter_mut().enumerate() {
            let ending = accs[i];
            let starting = if i < 5 { accs[i + 1] } else { 0.0 };
            let acceleration = if ending.abs() >= starting.abs() { ending } else { starting };
            *point = CheckPoint::new(i, s * plep.refs[i], s * rates[i], s * acceleration);
        }

        check_points(&mut meta, ctx.limits(), ctx.polarity, &points)?;

        Ok(ArmedFunction::new(FunctionKind::Plep, meta, FgShape::Plep(plep)))
    }

    /// Segment boundary times.
    pub fn segment_times(&self) -> &[f64; 6] {
        &self.time
    }

    pub(crate) fn sample(&self, time: f64) -> f64 {
        let r = if time < self.time[1] {
            let dt = time - self.time[0];
            self.refs[0] + 0.5 * self.acceleration * dt * dt
        } else if time < self.time[2] {
            self.refs[1] + self.linear_rate * (time - self.time[1])
        } else if time < self.time[3] {
            let dt = time - self.time[2];
            self.exp_final - (self.exp_final - self.refs[2]) * (-dt / self.exp_tc).exp()
        } else if time < self.time[4] {
            let dt = self.time[4] - time;
            self.refs[4] - 0.5 * self.acceleration * dt * dt
        } else {
            let dt = time - self.time[4];
            self.refs[4] + 0.5 * self.final_acceleration * dt * dt
        };

        self.normalisation * r
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::FgLimits;
    use crate::meta::FgPhase;
    use approx::assert_abs_diff_eq;

    fn config(final_ref: f64) -> PlepConfig {
        PlepConfig {
            final_ref,
            acceleration: 2.0,
            linear_rate: 1.0,
            ..PlepConfig::default()
        }
    }

    #[test]
    fn test_trapezoidal_move() -> Result<(), FgError> {
        let mut f = Plep::arm(&ArmContext::from_initial_ref(0.0), &config(10.0))?;
        // 0.25 accel each side (0.25 units), 9.5 units linear
        assert_abs_diff_eq!(f.meta().time.end, 0.5 + 0.5 + 9.5, epsilon = 1e-12);
        assert_eq!(f.generate(10.5), (FgPhase::Post, 10.0));

        let (_, mid) = f.generate(5.0);
        assert_abs_diff_eq!(mid, 0.25 + 4.5, epsilon = 1e-12);
        Ok(())
    }

    #[test]
    fn test_triangular_move_when_linear_rate_unreachable() -> Result<(), FgError> {
        let f = Plep::arm(&ArmContext::from_initial_ref(0.0), &config(0.2))?;
        let FgShape::Plep(plep) = f.shape() else {
            return Err(FgError::bad_parameter(0, "shape", 0.0));
        };
        let t = plep.segment_times();
        assert_eq!(t[1], t[2]);
        assert_eq!(t[2], t[3]);
        assert_abs_diff_eq!(t[4], 2.0 * (0.1f64 / 1.0).sqrt(), epsilon = 1e-12);
        Ok(())
    }

    #[test]
    fn test_descending_move_is_mirrored() -> Result<(), FgError> {
        let mut up = Plep::arm(&ArmContext::from_initial_ref(0.0), &config(5.0))?;
        let mut down = Plep::arm(&ArmContext::from_initial_ref(0.0), &config(-5.0))?;
        for i in 0..=60 {
            let t = f64::from(i) * 0.1;
            assert_abs_diff_eq!(up.generate(t).1, -down.generate(t).1, epsilon = 1e-12);
        }
        Ok(())
    }

    #[test]
    fn test_exponential_segment_is_continuous() -> Result<(), FgError> {
        let cfg = PlepConfig {
            final_ref: 10.0,
            acceleration: 1.0,
            linear_rate: 2.0,
            exp_tc: 2.0,
            exp_final: 11.0,
            ..PlepConfig::default()
        };
        let mut f = Plep::arm(&ArmContext::from_initial_ref(0.0), &cfg)?;
        let FgShape::Plep(plep) = f.shape() else {
            return Err(FgError::bad_parameter(0, "shape", 0.0));
        };
        let times = *plep.segment_times();
        assert!(times[3] > times[2], "exponential segment expected");

        for t in times {
            let before = f.generate(t - 1e-9).1;
            let after = f.generate(t).1;
            assert_abs_diff_eq!(before, after, epsilon = 1e-6);
        }
        assert_eq!(f.generate(times[5]), (FgPhase::Post, 10.0));
        Ok(())
    }

    #[test]
    fn test_final_rate_continues_after_end() -> Result<(), FgError> {
        let cfg = PlepConfig {
            final_rate: 0.5,
            ..config(4.0)
        };
        let mut f = Plep::arm(&ArmContext::from_initial_ref(0.0), &cfg)?;
        let end = f.meta().time.end;
        assert_eq!(f.generate(end).1, 4.0);
        assert_abs_diff_eq!(f.generate(end + 2.0).1, 5.0, epsilon = 1e-12);
        let (_, before_end) = f.generate(end - 1e-6);
        assert_abs_diff_eq!(before_end, 4.0 - 0.5e-6, epsilon = 1e-9);
        Ok(())
    }

    #[test]
    fn test_same_sign_final_rate_stops_before_reaccelerating() -> Result<(), FgError> {
        let cfg = PlepConfig {
            final_rate: 0.5,
            ..config(4.0)
        };
        let mut f = Plep::arm(&ArmContext::from_initial_ref(0.0), &cfg)?;
        let FgShape::Plep(plep) = f.shape() else {
            return Err(FgError::bad_parameter(0, "shape", 0.0));
        };
        let times = *plep.segment_times();
        assert_abs_diff_eq!(times[5] - times[4], 0.25, epsilon = 1e-12);

        // At rest at 4 - 0.5^2 / (2 * 2) between the fourth and fifth segments.
        assert_eq!(f.generate(times[4]).0, FgPhase::During);
        assert_abs_diff_eq!(f.generate(times[4]).1, 3.9375, epsilon = 1e-12);
        let rate = (f.generate(times[4] + 1e-4).1 - f.generate(times[4] - 1e-4).1) / 2e-4;
        assert_abs_diff_eq!(rate, 0.0, epsilon = 1e-3);
        Ok(())
    }

    #[test]
    fn test_zero_acceleration_rejected() {
        let cfg = PlepConfig {
            acceleration: 0.0,
            ..config(1.0)
        };
        let err = Plep::arm(&ArmContext::default(), &cfg);
        assert_eq!(
            err.map(|_| ()),
            Err(FgError::bad_parameter(0, "acceleration", 0.0))
        );
    }

    #[test]
    fn test_rate_limit_violation_reported() {
        let ctx = ArmContext::from_initial_ref(0.0)
            .with_limits(FgLimits::new(20.0, 0.0, -20.0, 0.5, 0.0));
        let err = Plep::arm(&ctx, &config(10.0));
        assert!(matches!(err, Err(FgError::OutOfRateLimits { index: 1, .. })));
    }

    #[test]
    fn test_zero_length_move() -> Result<(), FgError> {
        let mut f = Plep::arm(&ArmContext::from_initial_ref(3.0).with_delay(1.0), &config(3.0))?;
        assert_eq!(f.meta().time.duration, 0.0);
        assert_eq!(f.generate(0.0), (FgPhase::Pre, 3.0));
        assert_eq!(f.generate(1.0), (FgPhase::Post, 3.0));
        Ok(())
    }
}
