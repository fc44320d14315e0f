//! Prelude for regulation.
//!
//! ```
//! use powerconv_reg::prelude::*;
//! ```

pub use crate::config::{Actuation, RegConfig, RegMode, RstSource, SignalKind};
pub use crate::error::RegError;
pub use crate::mgr::{ChangeGroups, MeasInput, RegMgr, RegulateOutcome};
pub use crate::params::{ParError, ParValue};
pub use crate::rst::RstStatus;
