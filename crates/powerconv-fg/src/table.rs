//! TABLE: piecewise-linear interpolation through (time, reference) points.
//!
//! Sampling keeps a cursor on the current segment and moves it forwards or
//! backwards, so sequential sampling costs O(1) per call. The value is
//! interpolated from the nearer end of the segment, which makes the value at
//! every table time exactly the tabulated reference.

use serde::{Deserialize, Serialize};

use crate::error::FgError;
use crate::function::{ArmContext, ArmedFunction, FgShape, FunctionKind};
use crate::limits::{CheckPoint, check_points};
use crate::meta::FunctionMeta;

/// Default minimum spacing between table times.
pub const FG_TABLE_MIN_TIME_STEP: f64 = 1e-6;

/// TABLE parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    /// Point times, relative to the start of the function.
    pub time: Vec<f64>,
    /// Point references.
    pub reference: Vec<f64>,
    /// Minimum spacing between successive times.
    pub min_time_step: f64,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            time: vec![0.0, 1.0],
            reference: vec![0.0, 0.0],
            min_time_step: FG_TABLE_MIN_TIME_STEP,
        }
    }
}

/// Armed table with absolute point times.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    time: Vec<f64>,
    reference: Vec<f64>,
    seg_idx: usize,
}

impl Table {
    /// Arm a table. The initial reference in `ctx` is ignored; the table
    /// starts at its first point.
    ///
    /// # Errors
    ///
    /// Returns [`FgError::BadArrayLength`] when the arrays differ in length
    /// or hold fewer than two points, [`FgError::InvalidTime`] when the
    /// times do not advance by at least the minimum step, and a limit error
    /// when a point or segment rate violates `ctx.limits`.
    pub fn arm(ctx: &ArmContext, config: &TableConfig) -> Result<ArmedFunction, FgError> {
        let n = config.time.len();
        if n < 2 {
            return Err(FgError::BadArrayLength {
                index: 0,
                name: "time",
                actual: n,
                expected: 2,
            });
        }
        if config.reference.len() != n {
            return Err(FgError::BadArrayLength {
                index: 1,
                name: "reference",
                actual: config.reference.len(),
                expected: n,
            });
        }
        if config.time[0] < 0.0 {
            return Err(FgError::InvalidTime {
                index: 0,
                time: config.time[0],
                previous: 0.0,
                min_step: config.min_time_step,
            });
        }

        let min_step = config.min_time_step.max(0.0);
        let mut points = Vec::with_capacity(n);
        points.push(CheckPoint::new(0, config.reference[0], 0.0, 0.0));

        for i in 1..n {
            let (previous, time) = (config.time[i - 1], config.time[i]);
            if !(time - previous >= min_step) || time <= previous {
                return Err(FgError::InvalidTime {
                    index: i,
                    time,
                    previous,
                    min_step,
                });
            }
            let rate = (config.reference[i] - config.reference[i - 1]) / (time - previous);
            points.push(CheckPoint::new(i, config.reference[i], rate, 0.0));
        }

        let time: Vec<f64> = config.time.iter().map(|t| ctx.delay + t).collect();
        let mut meta = FunctionMeta::new(time[0], config.reference[0]);
        for &r in &config.reference {
            meta.include(r);
        }
        meta.set_end(time[n - 1], config.reference[n - 1], 0.0);

        check_points(&mut meta, ctx.limits(), ctx.polarity, &points)?;

        let table = Self {
            time,
            reference: config.reference.clone(),
            seg_idx: 1,
        };
        Ok(ArmedFunction::new(FunctionKind::Table, meta, FgShape::Table(table)))
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.time.len()
    }

    /// Whether the table has no points.
    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub(crate) fn sample(&mut self, time: f64) -> f64 {
        let last = self.time.len() - 1;

        while self.seg_idx < last && time >= self.time[self.seg_idx] {
            self.seg_idx += 1;
        }
        while self.seg_idx > 1 && time < self.time[self.seg_idx - 1] {
            self.seg_idx -= 1;
        }

        let i = self.seg_idx;
        let (t0, t1) = (self.time[i - 1], self.time[i]);
        let (r0, r1) = (self.reference[i - 1], self.reference[i]);
        let rate = (r1 - r0) / (t1 - t0);

        if time - t0 <= t1 - time {
            r0 + rate * (time - t0)
        } else {
            r1 - rate * (t1 - time)
        }
    }
}
