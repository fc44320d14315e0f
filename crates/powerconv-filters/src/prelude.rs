//! Prelude for convenient imports.
//!
//! ```
//! use powerconv_filters::prelude::*;
//! ```

pub use crate::chain::{MeasChainConfig, SimMeasChain};
pub use crate::delay::{DELAY_BUF_LEN, DELAY_MAX_ITERS, DelayLine};
pub use crate::error::FilterError;
pub use crate::meas_filter::{MEAS_FILTER_HEADROOM, MeasFilter, MeasSelect, MeasValues};
pub use crate::noise::{NoiseAndTone, quantise};
pub use crate::rate::MeasRate;
pub use crate::state::FilterState;
