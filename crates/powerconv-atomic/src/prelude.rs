//! Prelude for convenient imports.
//!
//! ```rust
//! use powerconv_atomic::prelude::*;
//! ```

pub use crate::counters::{CounterSnapshot, RegCounters};

#[cfg(feature = "handoff")]
pub use crate::handoff::{HandoffStats, ParamHandoff};
