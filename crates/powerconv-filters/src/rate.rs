//! Rate estimation from the filtered measurement.
//!
//! The estimator keeps the last four samples taken at the regulation period
//! and fits a least-squares line through them.
//!
//! # RT Safety
//!
//! - No heap allocations
//! - O(1) time complexity

use crate::error::FilterError;
use crate::state::FilterState;

const RATE_HISTORY_LEN: usize = 4;
const RATE_HISTORY_MASK: usize = RATE_HISTORY_LEN - 1;

/// Four-point least-squares rate estimator.
///
/// # Example
///
/// ```
/// use powerconv_filters::{FilterState, MeasRate};
///
/// let mut rate = MeasRate::new(0.001, 1)?;
/// rate.init_history(0.0);
/// let mut estimate = 0.0;
/// for i in 1..=4 {
///     estimate = rate.update(0.002 * f64::from(i));
/// }
/// assert!((estimate - 2.0).abs() < 1e-9);
/// # Ok::<(), powerconv_filters::FilterError>(())
/// ```
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasRate {
    history: [f64; RATE_HISTORY_LEN],
    index: usize,
    period_iters: u32,
    counter: u32,
    period: f64,
    estimate: f64,
}

impl MeasRate {
    /// Estimator sampling every `period_iters` iterations of `iter_period`
    /// seconds.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::InvalidPeriod`] when `period_iters` is zero.
    pub fn new(iter_period: f64, period_iters: u32) -> Result<Self, FilterError> {
        if period_iters == 0 || !(iter_period > 0.0) {
            return Err(FilterError::InvalidPeriod(period_iters));
        }
        Ok(Self {
            history: [0.0; RATE_HISTORY_LEN],
            index: 0,
            period_iters,
            counter: 0,
            period: iter_period * f64::from(period_iters),
            estimate: 0.0,
        })
    }

    /// Feed the filtered measurement of the current iteration.
    ///
    /// A new sample is stored, and the estimate recomputed, on the first
    /// iteration of each period. The last estimate is returned otherwise.
    #[inline]
    pub fn update(&mut self, filtered: f64) -> f64 {
        if self.counter == 0 {
            self.index = (self.index + 1) & RATE_HISTORY_MASK;
            self.history[self.index] = filtered;

            let y0 = self.history[self.index];
            let y1 = self.history[(self.index + 3) & RATE_HISTORY_MASK];
            let y2 = self.history[(self.index + 2) & RATE_HISTORY_MASK];
            let y3 = self.history[(self.index + 1) & RATE_HISTORY_MASK];
            self.estimate = (3.0 * (y0 - y3) + (y1 - y2)) / (10.0 * self.period);
        }

        self.counter += 1;
        if self.counter >= self.period_iters {
            self.counter = 0;
        }
        self.estimate
    }

    /// Last estimate.
    #[inline]
    pub fn estimate(&self) -> f64 {
        self.estimate
    }
}

impl FilterState for MeasRate {
    fn init_history(&mut self, value: f64) {
        self.history = [value; RATE_HISTORY_LEN];
        self.counter = 0;
        self.estimate = 0.0;
    }
}
