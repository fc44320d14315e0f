//! # powerconv-atomic
//!
//! RT-safe synchronisation primitives for the regulation loop.
//!
//! The regulation loop runs on a real-time thread while parameters are
//! prepared on a background thread. This crate provides the two pieces that
//! cross that boundary:
//!
//! - [`counters`] - Atomic counters the RT thread updates every iteration
//! - [`handoff`] - Single-slot lock-free hand-off of parameter sets
//!   (requires the `handoff` feature)
//!
//! ## Safety Guarantees
//!
//! - **No heap allocations** after initialization
//! - **No blocking operations** - all methods are lock-free
//! - **Deterministic execution time** for all RT-side operations
//!
//! ## Usage
//!
//! ```rust
//! use powerconv_atomic::RegCounters;
//!
//! let counters = RegCounters::new();
//!
//! counters.inc_iteration();
//! counters.record_meas(false);
//! counters.record_meas(true);
//!
//! let snapshot = counters.snapshot();
//! assert_eq!(snapshot.invalid_meas, 1);
//! assert_eq!(snapshot.consecutive_invalid_meas, 0);
//! ```

#![no_std]
#![deny(
    unsafe_op_in_unsafe_fn,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::panic,
    missing_docs,
    missing_debug_implementations
)]
#![warn(clippy::pedantic)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod counters;

#[cfg(feature = "handoff")]
#[cfg_attr(docsrs, doc(cfg(feature = "handoff")))]
pub mod handoff;

pub mod prelude;

pub use counters::{CounterSnapshot, RegCounters};

#[cfg(feature = "handoff")]
pub use handoff::{HandoffStats, ParamHandoff};
