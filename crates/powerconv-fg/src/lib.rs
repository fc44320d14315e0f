//! Reference function generation for power converter regulation.
//!
//! This crate arms and samples the reference functions played by a
//! converter controller. A function is armed in the background, where its
//! parameters are validated against the converter limits, and then sampled
//! once per regulation period by the real-time loop.
//!
//! # Overview
//!
//! The generator supports:
//! - **PLEP**: parabola, linear, exponential, parabola, with a final rate
//! - **RAMP**: parabolic ramp that can start from a non-zero rate
//! - **PPPL**: chained parabola, parabola, parabola, linear sections
//! - **TABLE**: piecewise-linear table
//! - **LTRIM / CTRIM**: linear and cubic trims
//! - **PULSE**: sloping level for a fixed duration
//! - **STEPS / SQUARE / SINE / COSINE**: test waveforms
//!
//! # RT Safety Guarantees
//!
//! ## RT-Safe: `ArmedFunction::generate()`
//! Sampling an armed function:
//! - No heap allocations
//! - No syscalls or I/O
//! - Bounded execution time (tables scan from a cursor)
//!
//! ## NOT RT-Safe: arming
//! Arming validates parameters, may allocate and logs through `tracing`.
//!
//! # Example
//!
//! ```
//! use powerconv_fg::{ArmContext, FgConfigSet, FgLimits, FgPhase, FgRegistry};
//!
//! let registry = FgRegistry::new();
//! let mut set = FgConfigSet::default();
//! set.plep.final_ref = 10.0;
//! set.plep.acceleration = 2.0;
//! set.plep.linear_rate = 1.0;
//!
//! let ctx = ArmContext::from_initial_ref(0.0)
//!     .with_limits(FgLimits::new(20.0, 0.0, -20.0, 5.0, 10.0));
//! let mut function = registry.arm_by_name("PLEP", &set, &ctx)?;
//!
//! let end = function.meta().time.end;
//! assert_eq!(function.generate(end), (FgPhase::Post, 10.0));
//! # Ok::<(), powerconv_fg::RegistryError>(())
//! ```

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![deny(static_mut_refs)]
#![deny(unused_must_use)]
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod error;
pub mod function;
pub mod limits;
pub mod meta;
pub mod plep;
pub mod pppl;
pub mod prelude;
pub mod pulse;
pub mod ramp;
pub mod registry;
pub mod table;
pub mod test_wave;
pub mod trim;

pub use error::{FgError, FgErrorKind};
pub use function::{ArmContext, ArmedFunction, FgShape, FunctionKind};
pub use limits::{FG_CLIP_LIMIT_FACTOR, FgLimits, FgLimitsPolarity, check_ref};
pub use meta::{FgFuncPolarity, FgPhase, FgRange, FgTime, FunctionMeta};
pub use plep::{Plep, PlepConfig};
pub use pppl::{FG_MAX_PPPLS, Pppl, PpplConfig};
pub use pulse::{Pulse, PulseConfig};
pub use ramp::{Ramp, RampConfig};
pub use registry::{FgConfigSet, FgRegistry, FgRegistryEntry, LimitsSource, RegistryError};
pub use table::{FG_TABLE_MIN_TIME_STEP, Table, TableConfig};
pub use test_wave::{FG_TEST_EXP_DECAY_TIME_CONSTANTS, TestConfig, TestKind, TestWave};
pub use trim::{Trim, TrimConfig, TrimKind};
