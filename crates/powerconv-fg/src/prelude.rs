//! Prelude for function generation.
//!
//! ```
//! use powerconv_fg::prelude::*;
//! ```

pub use crate::error::{FgError, FgErrorKind};
pub use crate::function::{ArmContext, ArmedFunction, FunctionKind};
pub use crate::limits::{FgLimits, FgLimitsPolarity};
pub use crate::meta::{FgPhase, FunctionMeta};
pub use crate::registry::{FgConfigSet, FgRegistry, RegistryError};
