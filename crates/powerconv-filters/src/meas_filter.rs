//! Cascaded fixed-point FIR measurement filter with extrapolation.
//!
//! Two box-car FIR stages run in cascade on integer accumulators so that the
//! running sums never drift. The filtered value is then extrapolated
//! linearly to compensate for the delay of the measurement and the filter.
//!
//! # RT Safety
//!
//! - Buffers are allocated once by [`MeasFilter::new`]
//! - [`MeasFilter::filter`] performs no allocation and runs in O(1)

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::FilterError;
use crate::state::FilterState;

/// Headroom applied to the measurement limits before scaling the integer
/// accumulators.
pub const MEAS_FILTER_HEADROOM: f64 = 1.1;

/// Selects one of the measurement values produced by [`MeasFilter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MeasSelect {
    /// Raw measurement.
    Unfiltered,
    /// Output of the FIR stages.
    #[default]
    Filtered,
    /// Filtered value extrapolated to compensate for its delay.
    Extrapolated,
}

/// The three measurement values produced each iteration.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MeasValues {
    /// Raw measurement.
    pub unfiltered: f64,
    /// Output of the FIR stages.
    pub filtered: f64,
    /// Filtered value extrapolated to compensate for its delay.
    pub extrapolated: f64,
}

impl MeasValues {
    /// All three values equal to `value`.
    pub const fn splat(value: f64) -> Self {
        Self {
            unfiltered: value,
            filtered: value,
            extrapolated: value,
        }
    }

    /// Value selected by `select`.
    #[inline]
    pub const fn select(&self, select: MeasSelect) -> f64 {
        match select {
            MeasSelect::Unfiltered => self.unfiltered,
            MeasSelect::Filtered => self.filtered,
            MeasSelect::Extrapolated => self.extrapolated,
        }
    }
}

/// Measurement filter.
///
/// # Example
///
/// ```
/// use powerconv_filters::{FilterState, MeasFilter, MeasSelect};
///
/// let mut filter = MeasFilter::new(16, 8);
/// filter.init([4, 1], 4, 10.0, -10.0, 1.3)?;
/// filter.init_history(0.0);
///
/// for _ in 0..4 {
///     filter.filter(2.0);
/// }
/// assert!((filter.values().filtered - 2.0).abs() < 1e-6);
/// assert!((filter.delay_iters(MeasSelect::Filtered) - 2.8).abs() < 1e-12);
/// # Ok::<(), powerconv_filters::FilterError>(())
/// ```
#[derive(Debug, Clone)]
pub struct MeasFilter {
    fir_buf: Box<[i32]>,
    fir_length: [usize; 2],
    fir_index: [usize; 2],
    fir_accumulator: [i32; 2],
    float_to_integer: [f64; 2],
    integer_to_float: [f64; 2],
    max_meas: f64,
    extrapolation_buf: Box<[f64]>,
    extrapolation_len: usize,
    extrapolation_index: usize,
    extrapolation_factor: f64,
    delay_iters: [f64; 3],
    values: MeasValues,
}

impl MeasFilter {
    /// Allocate a filter able to hold `fir_capacity` samples across both FIR
    /// stages and `extrapolation_capacity` filtered samples.
    pub fn new(fir_capacity: usize, extrapolation_capacity: usize) -> Self {
        Self {
            fir_buf: vec![0; fir_capacity].into_boxed_slice(),
            fir_length: [0; 2],
            fir_index: [0; 2],
            fir_accumulator: [0; 2],
            float_to_integer: [0.0; 2],
            integer_to_float: [0.0; 2],
            max_meas: 0.0,
            extrapolation_buf: vec![0.0; extrapolation_capacity.max(1)].into_boxed_slice(),
            extrapolation_len: 1,
            extrapolation_index: 0,
            extrapolation_factor: 0.0,
            delay_iters: [0.0; 3],
            values: MeasValues::default(),
        }
    }

    /// Configure the filter.
    ///
    /// The longer FIR length runs first. Lengths of one or less disable a
    /// stage and lengths are clipped to the buffer capacity. The history is
    /// reset to the last unfiltered value.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::InvalidLimits`] when both limits are zero or
    /// not finite.
    pub fn init(
        &mut self,
        fir_lengths: [usize; 2],
        extrapolation_len: usize,
        pos: f64,
        neg: f64,
        meas_delay_iters: f64,
    ) -> Result<(), FilterError> {
        let max_meas = MEAS_FILTER_HEADROOM * pos.abs().max(neg.abs());
        if !(max_meas.is_finite() && max_meas > 0.0) {
            return Err(FilterError::InvalidLimits { pos, neg });
        }

        let capacity = self.fir_buf.len();
        let mut lengths = fir_lengths;
        lengths.sort_unstable_by(|a, b| b.cmp(a));
        lengths[0] = lengths[0].min(capacity);
        lengths[1] = lengths[1].min(capacity - lengths[0]);
        for length in &mut lengths {
            if *length <= 1 {
                *length = 0;
            }
        }

        self.max_meas = max_meas;
        self.fir_length = lengths;
        for (stage, &length) in lengths.iter().enumerate() {
            if length == 0 {
                self.float_to_integer[stage] = 0.0;
                self.integer_to_float[stage] = 0.0;
            } else {
                let scale = f64::from(i32::MAX) / (max_meas * length as f64);
                self.float_to_integer[stage] = scale;
                self.integer_to_float[stage] = 1.0 / (scale * length as f64);
            }
        }

        let fir_delay: f64 = lengths
            .iter()
            .filter(|&&length| length > 0)
            .map(|&length| 0.5 * (length as f64 - 1.0))
            .sum();

        self.extrapolation_len = extrapolation_len.clamp(1, self.extrapolation_buf.len());
        self.delay_iters = [meas_delay_iters, meas_delay_iters + fir_delay, 0.0];
        self.extrapolation_factor = self.delay_iters[1] / self.extrapolation_len as f64;

        debug!(
            fir_length_0 = lengths[0],
            fir_length_1 = lengths[1],
            extrapolation_len = self.extrapolation_len,
            filtered_delay = self.delay_iters[1],
            "measurement filter configured"
        );

        self.init_history(self.values.unfiltered);
        Ok(())
    }

    /// Filter one new measurement and return all three values.
    #[inline]
    pub fn filter(&mut self, unfiltered: f64) -> MeasValues {
        let stage_0 = if self.fir_length[0] > 0 { self.stage(0, unfiltered) } else { unfiltered };
        let filtered = if self.fir_length[1] > 0 { self.stage(1, stage_0) } else { stage_0 };

        let oldest = self.extrapolation_buf[self.extrapolation_index];
        self.extrapolation_buf[self.extrapolation_index] = filtered;
        self.extrapolation_index += 1;
        if self.extrapolation_index >= self.extrapolation_len {
            self.extrapolation_index = 0;
        }

        self.values = MeasValues {
            unfiltered,
            filtered,
            extrapolated: filtered + self.extrapolation_factor * (filtered - oldest),
        };
        self.values
    }

    /// Values produced by the last call to [`MeasFilter::filter`].
    #[inline]
    pub fn values(&self) -> MeasValues {
        self.values
    }

    /// Delay of the selected value relative to the real signal, in iterations.
    #[inline]
    pub fn delay_iters(&self, select: MeasSelect) -> f64 {
        self.delay_iters[select as usize]
    }

    /// Active FIR stage lengths, longest first.
    pub fn fir_lengths(&self) -> [usize; 2] {
        self.fir_length
    }

    fn stage_offset(&self, stage: usize) -> usize {
        if stage == 0 { 0 } else { self.fir_length[0] }
    }

    fn to_integer(&self, stage: usize, value: f64) -> i32 {
        // Truncation keeps the accumulator within i32 for a full buffer
        (value.clamp(-self.max_meas, self.max_meas) * self.float_to_integer[stage]) as i32
    }

    #[inline]
    fn stage(&mut self, stage: usize, input: f64) -> f64 {
        let value = self.to_integer(stage, input);
        let slot = self.stage_offset(stage) + self.fir_index[stage];

        self.fir_accumulator[stage] = self.fir_accumulator[stage]
            .wrapping_add(value)
            .wrapping_sub(self.fir_buf[slot]);
        self.fir_buf[slot] = value;

        self.fir_index[stage] += 1;
        if self.fir_index[stage] >= self.fir_length[stage] {
            self.fir_index[stage] = 0;
        }

        f64::from(self.fir_accumulator[stage]) * self.integer_to_float[stage]
    }

    fn fill_stage(&mut self, stage: usize, input: f64) -> f64 {
        let length = self.fir_length[stage];
        if length == 0 {
            return input;
        }
        let value = self.to_integer(stage, input);
        let offset = self.stage_offset(stage);
        self.fir_buf[offset..offset + length].fill(value);
        self.fir_index[stage] = 0;
        self.fir_accumulator[stage] = value.wrapping_mul(length as i32);
        f64::from(self.fir_accumulator[stage]) * self.integer_to_float[stage]
    }
}

impl FilterState for MeasFilter {
    fn init_history(&mut self, value: f64) {
        let stage_0 = self.fill_stage(0, value);
        let filtered = self.fill_stage(1, stage_0);

        self.extrapolation_buf[..self.extrapolation_len].fill(filtered);
        self.extrapolation_index = 0;
        self.values = MeasValues {
            unfiltered: value,
            filtered,
            extrapolated: filtered,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn filter(lengths: [usize; 2], extrapolation_len: usize) -> Result<MeasFilter, FilterError> {
        let mut filter = MeasFilter::new(32, 16);
        filter.init(lengths, extrapolation_len, 10.0, -10.0, 1.0)?;
        filter.init_history(0.0);
        Ok(filter)
    }

    #[test]
    fn test_disabled_stages_pass_through() -> Result<(), FilterError> {
        let mut f = filter([1, 0], 1)?;
        let values = f.filter(3.5);
        assert_eq!(values.filtered, 3.5);
        assert_eq!(f.fir_lengths(), [0, 0]);
        assert_eq!(f.delay_iters(MeasSelect::Filtered), 1.0);
        Ok(())
    }

    #[test]
    fn test_step_settles_after_combined_length() -> Result<(), FilterError> {
        let mut f = filter([2, 4], 1)?;
        assert_eq!(f.fir_lengths(), [4, 2]);

        let mut last = 0.0;
        for i in 0..5 {
            let filtered = f.filter(5.0).filtered;
            assert!(filtered >= last - 1e-9, "step {i} not monotone");
            last = filtered;
        }
        assert_abs_diff_eq!(last, 5.0, epsilon = 1e-6);
        // 1 + 0.5 * (3 + 1)
        assert_abs_diff_eq!(f.delay_iters(MeasSelect::Filtered), 3.0, epsilon = 1e-12);
        Ok(())
    }

    #[test]
    fn test_lengths_clipped_to_capacity() -> Result<(), FilterError> {
        let mut f = MeasFilter::new(10, 4);
        f.init([8, 8], 4, 1.0, -1.0, 0.0)?;
        assert_eq!(f.fir_lengths(), [8, 2]);
        f.init([16, 2], 4, 1.0, -1.0, 0.0)?;
        assert_eq!(f.fir_lengths(), [10, 0]);
        Ok(())
    }

    #[test]
    fn test_extrapolation_compensates_ramp_delay() -> Result<(), FilterError> {
        let mut f = filter([4, 0], 4)?;
        // Filtered delay is 1 + 1.5 = 2.5 iterations
        let mut values = MeasValues::default();
        for i in 0..20 {
            values = f.filter(0.1 * f64::from(i));
        }
        assert_abs_diff_eq!(values.filtered, 1.9 - 0.1 * 1.5, epsilon = 1e-6);
        assert_abs_diff_eq!(values.extrapolated, 1.9 + 0.1, epsilon = 1e-6);
        assert_eq!(f.delay_iters(MeasSelect::Extrapolated), 0.0);
        Ok(())
    }

    #[test]
    fn test_input_clipped_to_headroom() -> Result<(), FilterError> {
        let mut f = filter([4, 0], 1)?;
        for _ in 0..4 {
            f.filter(1.0e6);
        }
        assert_abs_diff_eq!(f.values().filtered, 11.0, epsilon = 1e-6);
        assert_eq!(f.values().unfiltered, 1.0e6);
        Ok(())
    }

    #[test]
    fn test_invalid_limits() {
        let mut f = MeasFilter::new(4, 4);
        let err = f.init([2, 0], 1, 0.0, 0.0, 0.0);
        assert_eq!(err, Err(FilterError::InvalidLimits { pos: 0.0, neg: 0.0 }));
    }

    #[test]
    fn test_history_prefill_avoids_transient() -> Result<(), FilterError> {
        let mut f = filter([8, 4], 4)?;
        f.init_history(-3.0);
        let values = f.filter(-3.0);
        assert_abs_diff_eq!(values.filtered, -3.0, epsilon = 1e-6);
        assert_abs_diff_eq!(values.extrapolated, -3.0, epsilon = 1e-6);
        Ok(())
    }
}
