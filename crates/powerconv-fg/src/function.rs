//! The armed function handle returned by every generator.

use serde::{Deserialize, Serialize};

use crate::limits::{FgLimits, FgLimitsPolarity};
use crate::meta::{FgPhase, FunctionMeta};
use crate::plep::Plep;
use crate::pppl::Pppl;
use crate::pulse::Pulse;
use crate::ramp::Ramp;
use crate::table::Table;
use crate::test_wave::TestWave;
use crate::trim::Trim;

/// Every function type the generator can arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FunctionKind {
    /// Parabola, linear, exponential, parabola.
    Plep,
    /// Parabola, parabola with optional linear segment, starting from any rate.
    Ramp,
    /// Sequences of parabola, parabola, parabola, linear sections.
    Pppl,
    /// Piecewise-linear table.
    Table,
    /// Linear trim.
    Ltrim,
    /// Cubic trim.
    Ctrim,
    /// Constant level with an optional linear rate.
    Pulse,
    /// Staircase test waveform.
    Steps,
    /// Square test waveform.
    Square,
    /// Sine test waveform.
    Sine,
    /// Cosine test waveform.
    Cosine,
}

impl FunctionKind {
    /// All kinds in registry order.
    pub const ALL: [Self; 11] = [
        Self::Plep,
        Self::Ramp,
        Self::Pppl,
        Self::Table,
        Self::Ltrim,
        Self::Ctrim,
        Self::Pulse,
        Self::Steps,
        Self::Square,
        Self::Sine,
        Self::Cosine,
    ];

    /// Registry name of this kind.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Plep => "PLEP",
            Self::Ramp => "RAMP",
            Self::Pppl => "PPPL",
            Self::Table => "TABLE",
            Self::Ltrim => "LTRIM",
            Self::Ctrim => "CTRIM",
            Self::Pulse => "PULSE",
            Self::Steps => "STEPS",
            Self::Square => "SQUARE",
            Self::Sine => "SINE",
            Self::Cosine => "COSINE",
        }
    }

    /// Look up a kind by registry name, ignoring case.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(name))
    }
}

impl std::fmt::Display for FunctionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Arming context shared by all function types.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ArmContext {
    /// Limits to check the function against, if any.
    pub limits: Option<FgLimits>,
    /// Polarity switch policy for the limits.
    pub polarity: FgLimitsPolarity,
    /// Start time of the function.
    pub delay: f64,
    /// Reference at the start time.
    pub initial_ref: f64,
    /// Rate at the start time, used only by [`FunctionKind::Ramp`].
    pub initial_rate: f64,
}

impl ArmContext {
    /// Context with no limits, no delay and the given initial reference.
    pub fn from_initial_ref(initial_ref: f64) -> Self {
        Self {
            initial_ref,
            ..Self::default()
        }
    }

    /// Builder-style setter for the limits.
    pub fn with_limits(mut self, limits: FgLimits) -> Self {
        self.limits = Some(limits);
        self
    }

    /// Builder-style setter for the start delay.
    pub fn with_delay(mut self, delay: f64) -> Self {
        self.delay = delay;
        self
    }

    /// Builder-style setter for the polarity policy.
    pub fn with_polarity(mut self, polarity: FgLimitsPolarity) -> Self {
        self.polarity = polarity;
        self
    }

    pub(crate) fn limits(&self) -> Option<&FgLimits> {
        self.limits.as_ref()
    }
}

/// Shape-specific state of an armed function.
#[derive(Debug, Clone, PartialEq)]
pub enum FgShape {
    /// See [`Plep`].
    Plep(Plep),
    /// See [`Ramp`].
    Ramp(Ramp),
    /// See [`Pppl`].
    Pppl(Pppl),
    /// See [`Table`].
    Table(Table),
    /// See [`Trim`].
    Trim(Trim),
    /// See [`Pulse`].
    Pulse(Pulse),
    /// See [`TestWave`].
    Test(TestWave),
}

/// A validated function ready to be sampled.
///
/// # RT Safety
///
/// - `generate()`: RT-safe (no heap allocations, bounded execution time)
/// - arming: NOT RT-safe, done in the background
///
/// # Example
///
/// ```
/// use powerconv_fg::{ArmContext, FgPhase, Trim, TrimConfig, TrimKind};
///
/// let ctx = ArmContext::from_initial_ref(1.0);
/// let config = TrimConfig { final_ref: 3.0, duration: 2.0 };
/// let mut function = Trim::arm(TrimKind::Linear, &ctx, &config)?;
///
/// assert_eq!(function.generate(-1.0), (FgPhase::Pre, 1.0));
/// let (phase, value) = function.generate(1.0);
/// assert_eq!(phase, FgPhase::During);
/// assert!((value - 2.0).abs() < 1e-12);
/// assert_eq!(function.generate(2.0), (FgPhase::Post, 3.0));
/// # Ok::<(), powerconv_fg::FgError>(())
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ArmedFunction {
    kind: FunctionKind,
    meta: FunctionMeta,
    shape: FgShape,
}

impl ArmedFunction {
    pub(crate) fn new(kind: FunctionKind, meta: FunctionMeta, shape: FgShape) -> Self {
        Self { kind, meta, shape }
    }

    /// Function type.
    pub fn kind(&self) -> FunctionKind {
        self.kind
    }

    /// Metadata computed when the function was armed.
    pub fn meta(&self) -> &FunctionMeta {
        &self.meta
    }

    /// Shape-specific state.
    pub fn shape(&self) -> &FgShape {
        &self.shape
    }

    /// Sample the function at `time`.
    pub fn generate(&mut self, time: f64) -> (FgPhase, f64) {
        if let Some(outside) = self.meta.outside(time) {
            return outside;
        }

        let value = match &mut self.shape {
            FgShape::Plep(plep) => plep.sample(time),
            FgShape::Ramp(ramp) => ramp.sample(time),
            FgShape::Pppl(pppl) => pppl.sample(time),
            FgShape::Table(table) => table.sample(time),
            FgShape::Trim(trim) => trim.sample(time),
            FgShape::Pulse(pulse) => pulse.sample(time),
            FgShape::Test(test) => test.sample(time),
        };

        (FgPhase::During, value)
    }

    /// Sample the function at `time`, passing back the reference actually
    /// applied on the previous iteration.
    ///
    /// Only [`FunctionKind::Ramp`] uses the feedback: when the caller had to
    /// clip the reference, the ramp slides in time so that it continues from
    /// the clipped value instead of jumping, and its end time moves later by
    /// the same shift. Time must not go backwards
    /// between calls. All other kinds behave like [`ArmedFunction::generate`].
    pub fn generate_with_feedback(&mut self, time: f64, applied_ref: f64) -> (FgPhase, f64) {
        if let FgShape::Ramp(ramp) = &mut self.shape {
            return ramp.generate_with_feedback(&mut self.meta, time, applied_ref);
        }
        self.generate(time)
    }
}
