//! Linear and cubic trims.
//!
//! A trim moves the reference from its initial value to a final value over a
//! fixed duration. The cubic trim starts and ends with zero rate. When no
//! duration is given, the shortest duration that respects the rate and
//! acceleration limits is used.

use serde::{Deserialize, Serialize};

use crate::error::FgError;
use crate::function::{ArmContext, ArmedFunction, FgShape, FunctionKind};
use crate::limits::{CheckPoint, check_points};
use crate::meta::FunctionMeta;

/// Trim flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrimKind {
    /// Constant rate.
    Linear,
    /// Cubic with zero rate at both ends.
    Cubic,
}

/// Trim parameters.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrimConfig {
    /// Final reference.
    pub final_ref: f64,
    /// Duration, zero to derive it from the limits.
    pub duration: f64,
}

/// Armed trim, centred on its mid-point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trim {
    kind: TrimKind,
    time_mid: f64,
    ref_mid: f64,
    a: f64,
    c: f64,
}

impl Trim {
    /// Arm a trim from `ctx.initial_ref` to `config.final_ref`.
    ///
    /// # Errors
    ///
    /// Returns [`FgError::BadParameter`] for a negative duration, or for a
    /// zero duration when the limits do not allow one to be derived, and a
    /// limit error when the trim violates `ctx.limits`.
    pub fn arm(
        kind: TrimKind,
        ctx: &ArmContext,
        config: &TrimConfig,
    ) -> Result<ArmedFunction, FgError> {
        if config.duration < 0.0 {
            return Err(FgError::bad_parameter(0, "duration", config.duration));
        }

        let delta = config.final_ref - ctx.initial_ref;
        let duration = if config.duration > 0.0 || delta == 0.0 {
            config.duration
        } else {
            derive_duration(kind, delta, ctx)?
        };

        let half = 0.5 * duration;
        let (a, c) = if duration > 0.0 {
            match kind {
                TrimKind::Linear => (0.0, delta / duration),
                TrimKind::Cubic => (
                    -2.0 * delta / (duration * duration * duration),
                    1.5 * delta / duration,
                ),
            }
        } else {
            (0.0, 0.0)
        };

        let trim = Self {
            kind,
            time_mid: ctx.delay + half,
            ref_mid: ctx.initial_ref + 0.5 * delta,
            a,
            c,
        };

        let mut meta = FunctionMeta::new(ctx.delay, ctx.initial_ref);
        meta.set_end(ctx.delay + duration, config.final_ref, 0.0);

        let points = match kind {
            TrimKind::Linear => [
                CheckPoint::new(0, ctx.initial_ref, c, 0.0),
                CheckPoint::new(1, trim.ref_mid, c, 0.0),
                CheckPoint::new(2, config.final_ref, c, 0.0),
            ],
            TrimKind::Cubic => {
                // r'' = 6at, largest at the ends
                let end_acc = 6.0 * a * half;
                [
                    CheckPoint::new(0, ctx.initial_ref, 0.0, -end_acc),
                    CheckPoint::new(1, trim.ref_mid, c, 0.0),
                    CheckPoint::new(2, config.final_ref, 0.0, end_acc),
                ]
            }
        };
        check_points(&mut meta, ctx.limits(), ctx.polarity, &points)?;

        let function_kind = match kind {
            TrimKind::Linear => FunctionKind::Ltrim,
            TrimKind::Cubic => FunctionKind::Ctrim,
        };
        Ok(ArmedFunction::new(function_kind, meta, FgShape::Trim(trim)))
    }

    /// Trim flavour.
    pub fn kind(&self) -> TrimKind {
        self.kind
    }

    pub(crate) fn sample(&self, time: f64) -> f64 {
        let t = time - self.time_mid;
        self.ref_mid + (self.a * t * t + self.c) * t
    }
}

fn derive_duration(kind: TrimKind, delta: f64, ctx: &ArmContext) -> Result<f64, FgError> {
    let Some(limits) = ctx.limits() else {
        return Err(FgError::bad_parameter(0, "duration", 0.0));
    };
    let distance = delta.abs();

    let duration = match kind {
        TrimKind::Linear if limits.rate > 0.0 => distance / limits.rate,
        TrimKind::Cubic if limits.rate > 0.0 || limits.acceleration > 0.0 => {
            let rate_time = if limits.rate > 0.0 { 1.5 * distance / limits.rate } else { 0.0 };
            let acc_time = if limits.acceleration > 0.0 {
                (6.0 * distance / limits.acceleration).sqrt()
            } else {
                0.0
            };
            rate_time.max(acc_time)
        }
        _ => return Err(FgError::bad_parameter(0, "duration", 0.0)),
    };

    Ok(duration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::FgLimits;
    use crate::meta::FgPhase;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_cubic_trim_is_symmetric() -> Result<(), FgError> {
        let ctx = ArmContext::from_initial_ref(-1.0);
        let config = TrimConfig {
            final_ref: 1.0,
            duration: 2.0,
        };
        let mut f = Trim::arm(TrimKind::Cubic, &ctx, &config)?;

        assert_abs_diff_eq!(f.generate(0.0).1, -1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(f.generate(1.0).1, 0.0, epsilon = 1e-12);
        let early = f.generate(0.5).1;
        let late = f.generate(1.5).1;
        assert_abs_diff_eq!(early, -late, epsilon = 1e-12);
        assert_eq!(f.generate(2.0), (FgPhase::Post, 1.0));
        assert_eq!(f.kind(), FunctionKind::Ctrim);
        Ok(())
    }

    #[test]
    fn test_linear_duration_from_rate_limit() -> Result<(), FgError> {
        let ctx = ArmContext::from_initial_ref(0.0)
            .with_limits(FgLimits::new(10.0, 0.0, -10.0, 2.0, 0.0));
        let config = TrimConfig {
            final_ref: 4.0,
            duration: 0.0,
        };
        let f = Trim::arm(TrimKind::Linear, &ctx, &config)?;
        assert_abs_diff_eq!(f.meta().time.duration, 2.0, epsilon = 1e-12);
        Ok(())
    }

    #[test]
    fn test_cubic_duration_from_both_limits() -> Result<(), FgError> {
        let ctx = ArmContext::from_initial_ref(0.0)
            .with_limits(FgLimits::new(10.0, 0.0, -10.0, 3.0, 1.0));
        let config = TrimConfig {
            final_ref: 6.0,
            duration: 0.0,
        };
        let f = Trim::arm(TrimKind::Cubic, &ctx, &config)?;
        // rate: 1.5 * 6 / 3 = 3 s, acceleration: sqrt(36) = 6 s
        assert_abs_diff_eq!(f.meta().time.duration, 6.0, epsilon = 1e-12);
        Ok(())
    }

    #[test]
    fn test_zero_duration_without_limits_rejected() {
        let config = TrimConfig {
            final_ref: 1.0,
            duration: 0.0,
        };
        let err = Trim::arm(TrimKind::Linear, &ArmContext::default(), &config);
        assert!(matches!(err, Err(FgError::BadParameter { name: "duration", .. })));
    }

    #[test]
    fn test_given_duration_too_short_for_rate_limit() {
        let ctx = ArmContext::from_initial_ref(0.0)
            .with_limits(FgLimits::new(10.0, 0.0, -10.0, 1.0, 0.0));
        let config = TrimConfig {
            final_ref: 4.0,
            duration: 1.0,
        };
        let err = Trim::arm(TrimKind::Linear, &ctx, &config);
        assert!(matches!(err, Err(FgError::OutOfRateLimits { .. })));
    }
}
