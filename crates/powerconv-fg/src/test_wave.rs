//! Test waveforms: STEPS, SQUARE, SINE and COSINE.
//!
//! Each waveform runs for a whole number of periods. Sine and cosine can be
//! shaped by a sin² window over the first and last half period, and by an
//! exponential envelope that decays by [`FG_TEST_EXP_DECAY_TIME_CONSTANTS`]
//! time constants over the waveform.

use std::f64::consts::{PI, TAU};

use serde::{Deserialize, Serialize};

use crate::error::FgError;
use crate::function::{ArmContext, ArmedFunction, FgShape, FunctionKind};
use crate::limits::{CheckPoint, check_points};
use crate::meta::FunctionMeta;

/// Number of time constants the exponential envelope decays by.
pub const FG_TEST_EXP_DECAY_TIME_CONSTANTS: f64 = 5.0;

/// Test waveform shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TestKind {
    /// Staircase rising by `amplitude_pp / num_cycles` each period.
    Steps,
    /// Square wave, positive half first.
    Square,
    /// Sine wave.
    Sine,
    /// Cosine wave.
    Cosine,
}

/// Test waveform parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestConfig {
    /// Peak-to-peak amplitude; the total rise for STEPS.
    pub amplitude_pp: f64,
    /// Number of periods.
    pub num_cycles: u32,
    /// Period in seconds.
    pub period: f64,
    /// Apply a sin² window to the first and last half periods.
    pub use_window: bool,
    /// Apply a decaying exponential envelope.
    pub exp_decay: bool,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            amplitude_pp: 1.0,
            num_cycles: 1,
            period: 1.0,
            use_window: false,
            exp_decay: false,
        }
    }
}

/// Armed test waveform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TestWave {
    kind: TestKind,
    start: f64,
    initial_ref: f64,
    amplitude_pp: f64,
    num_cycles: f64,
    period: f64,
    duration: f64,
    use_window: bool,
    decay_rate: f64,
}

impl TestWave {
    /// Arm a test waveform around `ctx.initial_ref`.
    ///
    /// # Errors
    ///
    /// Returns [`FgError::BadParameter`] for a non-positive period or zero
    /// cycles, and a limit error when the waveform violates `ctx.limits`.
    pub fn arm(
        kind: TestKind,
        ctx: &ArmContext,
        config: &TestConfig,
    ) -> Result<ArmedFunction, FgError> {
        if !(config.period > 0.0) {
            return Err(FgError::bad_parameter(0, "period", config.period));
        }
        if config.num_cycles == 0 {
            return Err(FgError::bad_parameter(0, "num_cycles", 0.0));
        }

        let num_cycles = f64::from(config.num_cycles);
        let duration = num_cycles * config.period;
        let wave = Self {
            kind,
            start: ctx.delay,
            initial_ref: ctx.initial_ref,
            amplitude_pp: config.amplitude_pp,
            num_cycles,
            period: config.period,
            duration,
            use_window: config.use_window && matches!(kind, TestKind::Sine | TestKind::Cosine),
            decay_rate: if config.exp_decay {
                FG_TEST_EXP_DECAY_TIME_CONSTANTS / duration
            } else {
                0.0
            },
        };

        let init = ctx.initial_ref;
        let amp = config.amplitude_pp;
        let (initial, final_ref, low, high) = match kind {
            TestKind::Steps => (init, init + amp, init.min(init + amp), init.max(init + amp)),
            TestKind::Square => (init + 0.5 * amp, init, init - 0.5 * amp.abs(), init + 0.5 * amp.abs()),
            TestKind::Sine => (init, init, init - 0.5 * amp.abs(), init + 0.5 * amp.abs()),
            TestKind::Cosine => {
                let edge = if wave.use_window {
                    init
                } else {
                    init + 0.5 * amp * wave.envelope(duration)
                };
                let first = if wave.use_window { init } else { init + 0.5 * amp };
                (first, edge, init - 0.5 * amp.abs(), init + 0.5 * amp.abs())
            }
        };

        let mut meta = FunctionMeta::new(ctx.delay, initial);
        meta.include(low);
        meta.include(high);
        meta.set_end(ctx.delay + duration, final_ref, 0.0);

        let peak_rate = match kind {
            TestKind::Sine | TestKind::Cosine => PI * amp / config.period,
            TestKind::Steps | TestKind::Square => 0.0,
        };
        let points = [
            CheckPoint::new(0, low, 0.0, 0.0),
            CheckPoint::new(1, high, 0.0, 0.0),
            CheckPoint::new(2, init, peak_rate, 0.0),
        ];
        check_points(&mut meta, ctx.limits(), ctx.polarity, &points)?;

        let function_kind = match kind {
            TestKind::Steps => FunctionKind::Steps,
            TestKind::Square => FunctionKind::Square,
            TestKind::Sine => FunctionKind::Sine,
            TestKind::Cosine => FunctionKind::Cosine,
        };
        Ok(ArmedFunction::new(function_kind, meta, FgShape::Test(wave)))
    }

    /// Waveform shape.
    pub fn kind(&self) -> TestKind {
        self.kind
    }

    fn envelope(&self, t: f64) -> f64 {
        let decay = if self.decay_rate > 0.0 { (-self.decay_rate * t).exp() } else { 1.0 };
        if !self.use_window {
            return decay;
        }

        let half_period = 0.5 * self.period;
        let window = if t < half_period {
            (PI * t / self.period).sin().powi(2)
        } else if t > self.duration - half_period {
            (PI * (self.duration - t) / self.period).sin().powi(2)
        } else {
            1.0
        };
        window * decay
    }

    pub(crate) fn sample(&self, time: f64) -> f64 {
        let t = time - self.start;
        match self.kind {
            TestKind::Steps => {
                let step = (t / self.period).floor();
                self.initial_ref + self.amplitude_pp * step / self.num_cycles
            }
            TestKind::Square => {
                let half = (2.0 * t / self.period).floor();
                let sign = if half % 2.0 == 0.0 { 0.5 } else { -0.5 };
                self.initial_ref + sign * self.amplitude_pp
            }
            TestKind::Sine => {
                let wave = (TAU * t / self.period).sin();
                self.initial_ref + 0.5 * self.amplitude_pp * wave * self.envelope(t)
            }
            TestKind::Cosine => {
                let wave = (TAU * t / self.period).cos();
                self.initial_ref + 0.5 * self.amplitude_pp * wave * self.envelope(t)
            }
        }
    }
}
