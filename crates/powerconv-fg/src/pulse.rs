//! PULSE: a constant level, optionally sloping, held for a fixed duration.

use serde::{Deserialize, Serialize};

use crate::error::FgError;
use crate::function::{ArmContext, ArmedFunction, FgShape, FunctionKind};
use crate::limits::{CheckPoint, check_points};
use crate::meta::FunctionMeta;

/// PULSE parameters.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PulseConfig {
    /// Level at the start of the pulse.
    pub reference: f64,
    /// Rate of change during the pulse.
    pub linear_rate: f64,
    /// Pulse duration.
    pub duration: f64,
}

/// Armed pulse.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pulse {
    start: f64,
    reference: f64,
    linear_rate: f64,
}

impl Pulse {
    /// Arm a pulse. The pulse defines its own level, so the initial
    /// reference in `ctx` is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`FgError::BadParameter`] for a negative duration and a limit
    /// error when the pulse violates `ctx.limits`.
    pub fn arm(ctx: &ArmContext, config: &PulseConfig) -> Result<ArmedFunction, FgError> {
        if !(config.duration >= 0.0) {
            return Err(FgError::bad_parameter(0, "duration", config.duration));
        }

        let final_ref = config.reference + config.linear_rate * config.duration;
        let mut meta = FunctionMeta::new(ctx.delay, config.reference);
        meta.set_end(ctx.delay + config.duration, final_ref, 0.0);

        let points = [
            CheckPoint::new(0, config.reference, config.linear_rate, 0.0),
            CheckPoint::new(1, final_ref, config.linear_rate, 0.0),
        ];
        check_points(&mut meta, ctx.limits(), ctx.polarity, &points)?;

        let pulse = Self {
            start: ctx.delay,
            reference: config.reference,
            linear_rate: config.linear_rate,
        };
        Ok(ArmedFunction::new(FunctionKind::Pulse, meta, FgShape::Pulse(pulse)))
    }

    pub(crate) fn sample(&self, time: f64) -> f64 {
        self.reference + self.linear_rate * (time - self.start)
    }
}
