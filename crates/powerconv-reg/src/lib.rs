//! Closed-loop regulation of power converter currents and fields.
//!
//! This crate runs the regulation of a magnet circuit: measurement intake
//! and filtering, reference and measurement limits, RST regulation with a
//! stability self-test, and a load and voltage-source simulation to close
//! the loop offline.
//!
//! # Overview
//!
//! - [`mgr::RegMgr`]: the regulation manager for one circuit
//! - [`rst`]: RST coefficients, synthesis by pole placement, Jury's test
//!   and modulus margin
//! - [`lim`], [`err`]: reference, measurement, RMS and error limits
//! - [`load`], [`vs`], [`sim`]: magnet load and voltage source models
//! - [`params`]: named, typed parameter table for a configuration layer
//!
//! # RT Safety Guarantees
//!
//! ## RT-Safe: the per-iteration path
//! `RegMgr::measurement_intake()`, `RegMgr::regulate()` and
//! `RegMgr::simulate()`:
//! - No heap allocations
//! - No locks or logging
//! - Bounded execution time
//!
//! ## NOT RT-Safe: parameter changes
//! `RegMgr::apply_changed_parameters()`, RST synthesis and the parameter
//! table allocate and log through `tracing`. New RST parameters reach the
//! real-time path through a lock-free hand-off.
//!
//! # Example
//!
//! ```
//! use powerconv_reg::config::{RegMode, RstSource, SignalKind};
//! use powerconv_reg::mgr::RegMgr;
//!
//! let mut mgr = RegMgr::init(1000, true, true, true)?;
//! mgr.simulate_init(RegMode::Field, 50.0)?;
//!
//! for _ in 0..500 {
//!     let mut reference = 60.0;
//!     mgr.measurement_intake(RstSource::Operational, true, true);
//!     mgr.regulate(&mut reference);
//!     mgr.simulate(0.0);
//! }
//! let field = mgr.signal(SignalKind::Field);
//! assert!((field.meas().unfiltered - 60.0).abs() < 0.1);
//! # Ok::<(), powerconv_reg::RegError>(())
//! ```

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![deny(static_mut_refs)]
#![deny(unused_must_use)]
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod config;
pub mod err;
pub mod error;
pub mod jury;
pub mod lim;
pub mod load;
pub mod mgr;
pub mod params;
pub mod prelude;
pub mod ring;
pub mod rst;
pub mod sim;
pub mod vs;

pub use config::{Actuation, RegConfig, RegMode, RstSource, SignalConfig, SignalKind};
pub use error::RegError;
pub use jury::{JurysResult, jurys_test};
pub use load::{Load, LoadConfig, REG_N_LOADS};
pub use mgr::{ApplyReport, ChangeGroups, MeasInput, RegMgr, RegulateOutcome, RstPublisher};
pub use params::{ParDescriptor, ParError, ParTable, ParType, ParValue};
pub use rst::{RstConfig, RstPars, RstStatus};
pub use sim::{SimMeas, Simulation};
pub use vs::{VsConfig, VsModel};
