//! Fractional delay line.
//!
//! Delays a signal by a non-integer number of iterations using linear
//! interpolation between the two bracketing samples. An under-sampled
//! signal is never interpolated: the older sample is returned instead so
//! that the delayed signal keeps its steps.
//!
//! # RT Safety
//!
//! - No heap allocations
//! - O(1) time complexity

use crate::error::FilterError;
use crate::state::FilterState;

/// Number of samples held by a [`DelayLine`].
pub const DELAY_BUF_LEN: usize = 32;

const DELAY_BUF_MASK: usize = DELAY_BUF_LEN - 1;

/// Longest delay supported, in iterations.
pub const DELAY_MAX_ITERS: f64 = (DELAY_BUF_LEN - 2) as f64;

/// Fractional delay line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DelayLine {
    buf: [f64; DELAY_BUF_LEN],
    index: usize,
    delay_int: usize,
    delay_frac: f64,
    under_sampled: bool,
}

impl DelayLine {
    /// Delay line of `delay_iters` iterations.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::InvalidDelay`] when the delay is negative or
    /// exceeds [`DELAY_MAX_ITERS`].
    pub fn new(delay_iters: f64, under_sampled: bool) -> Result<Self, FilterError> {
        if !(0.0..=DELAY_MAX_ITERS).contains(&delay_iters) {
            return Err(FilterError::InvalidDelay {
                delay_iters,
                max_iters: DELAY_MAX_ITERS,
            });
        }
        let whole = delay_iters.floor();
        Ok(Self {
            buf: [0.0; DELAY_BUF_LEN],
            index: 0,
            delay_int: whole as usize,
            delay_frac: delay_iters - whole,
            under_sampled,
        })
    }

    /// Configured delay in iterations.
    pub fn delay_iters(&self) -> f64 {
        self.delay_int as f64 + self.delay_frac
    }

    /// Push `input` and return the delayed signal.
    #[inline]
    pub fn signal(&mut self, input: f64) -> f64 {
        self.index = (self.index + 1) & DELAY_BUF_MASK;
        self.buf[self.index] = input;

        let newer = self.buf[self.index.wrapping_sub(self.delay_int) & DELAY_BUF_MASK];
        if self.delay_frac == 0.0 {
            return newer;
        }

        let older = self.buf[self.index.wrapping_sub(self.delay_int + 1) & DELAY_BUF_MASK];
        if self.under_sampled {
            older
        } else {
            newer + self.delay_frac * (older - newer)
        }
    }
}

impl FilterState for DelayLine {
    fn init_history(&mut self, value: f64) {
        self.buf = [value; DELAY_BUF_LEN];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_zero_delay_is_identity() -> Result<(), FilterError> {
        let mut line = DelayLine::new(0.0, false)?;
        assert_eq!(line.signal(4.0), 4.0);
        assert_eq!(line.signal(-2.0), -2.0);
        Ok(())
    }

    #[test]
    fn test_integer_delay() -> Result<(), FilterError> {
        let mut line = DelayLine::new(3.0, false)?;
        line.init_history(0.0);
        let out: Vec<f64> = (1..=5).map(|i| line.signal(f64::from(i))).collect();
        assert_eq!(out, vec![0.0, 0.0, 0.0, 1.0, 2.0]);
        Ok(())
    }

    #[test]
    fn test_fractional_delay_interpolates() -> Result<(), FilterError> {
        let mut line = DelayLine::new(1.25, false)?;
        line.init_history(0.0);
        let mut out = 0.0;
        for i in 0..10 {
            out = line.signal(f64::from(i));
        }
        assert_abs_diff_eq!(out, 9.0 - 1.25, epsilon = 1e-12);
        assert_abs_diff_eq!(line.delay_iters(), 1.25, epsilon = 1e-12);
        Ok(())
    }

    #[test]
    fn test_under_sampled_takes_older_sample() -> Result<(), FilterError> {
        let mut line = DelayLine::new(1.25, true)?;
        line.init_history(0.0);
        let mut out = 0.0;
        for i in 0..10 {
            out = line.signal(f64::from(i));
        }
        assert_eq!(out, 7.0);
        Ok(())
    }

    #[test]
    fn test_delay_out_of_range() {
        assert!(DelayLine::new(-0.5, false).is_err());
        assert!(DelayLine::new(DELAY_MAX_ITERS + 0.5, false).is_err());
        assert!(DelayLine::new(DELAY_MAX_ITERS, false).is_ok());
    }
}
