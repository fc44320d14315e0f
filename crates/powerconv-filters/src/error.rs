//! Error types for filter configuration.

use thiserror::Error;

/// Error returned when a filter is configured with invalid parameters.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum FilterError {
    /// The measurement limits leave no range to scale the fixed-point filter.
    #[error("invalid measurement limits: pos {pos}, neg {neg}")]
    InvalidLimits {
        /// Positive limit.
        pos: f64,
        /// Negative limit.
        neg: f64,
    },

    /// The requested delay does not fit in the delay buffer.
    #[error("delay of {delay_iters} iterations outside [0, {max_iters}]")]
    InvalidDelay {
        /// Requested delay in iterations.
        delay_iters: f64,
        /// Largest supported delay.
        max_iters: f64,
    },

    /// A period must be at least one iteration.
    #[error("invalid period of {0} iterations")]
    InvalidPeriod(u32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FilterError::InvalidDelay {
            delay_iters: 40.5,
            max_iters: 30.0,
        };
        insta::assert_snapshot!(err.to_string(), @"delay of 40.5 iterations outside [0, 30]");
        insta::assert_snapshot!(FilterError::InvalidPeriod(0).to_string(), @"invalid period of 0 iterations");
    }
}
