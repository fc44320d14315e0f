//! Measurement filtering for power-converter regulation.
//!
//! This crate provides the signal conditioning that sits between an
//! acquisition system and a regulator:
//!
//! - [`MeasFilter`]: cascaded fixed-point FIR filter with delay-compensating
//!   extrapolation
//! - [`MeasRate`]: four-point least-squares rate estimate
//! - [`DelayLine`]: fractional delay
//! - [`NoiseAndTone`] and [`quantise`]: acquisition artefacts for simulation
//! - [`SimMeasChain`]: the three above combined
//!
//! # RT Safety
//!
//! Every per-iteration method is allocation-free with bounded execution
//! time. Allocation only happens in constructors.
//!
//! # Example
//!
//! ```
//! use powerconv_filters::prelude::*;
//!
//! let mut filter = MeasFilter::new(32, 8);
//! filter.init([8, 2], 8, 100.0, -100.0, 1.0)?;
//! filter.init_history(10.0);
//!
//! let values = filter.filter(10.0);
//! assert!((values.filtered - 10.0).abs() < 1e-6);
//! # Ok::<(), FilterError>(())
//! ```

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![deny(static_mut_refs)]
#![deny(unused_must_use)]
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod chain;
pub mod delay;
pub mod error;
pub mod meas_filter;
pub mod noise;
pub mod prelude;
pub mod rate;
pub mod state;

pub use chain::{MeasChainConfig, SimMeasChain};
pub use delay::{DELAY_BUF_LEN, DELAY_MAX_ITERS, DelayLine};
pub use error::FilterError;
pub use meas_filter::{MEAS_FILTER_HEADROOM, MeasFilter, MeasSelect, MeasValues};
pub use noise::{NoiseAndTone, quantise};
pub use rate::MeasRate;
pub use state::FilterState;
