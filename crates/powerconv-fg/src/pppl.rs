//! PPPL: sequences of parabola, parabola, parabola, linear sections.
//!
//! Each section is described by three accelerations, the rate at the end of
//! the second parabola, the rate and reference at the end of the third
//! parabola, and the duration of the closing linear segment. The rate at the
//! end of the first parabola is solved from the distance the section must
//! cover. A zero second acceleration turns the second parabola into a linear
//! segment.
//!
//! Segment polynomials are stored relative to the segment end time, so the
//! constant coefficient is the reference at the end of the segment.

use serde::{Deserialize, Serialize};

use crate::error::FgError;
use crate::function::{ArmContext, ArmedFunction, FgShape, FunctionKind};
use crate::limits::{CheckPoint, check_points};
use crate::meta::FunctionMeta;

/// Maximum number of PPPL sections.
pub const FG_MAX_PPPLS: usize = 8;

const SEGS_PER_PPPL: usize = 4;
const FG_PPPL_MAX_SEGS: usize = FG_MAX_PPPLS * SEGS_PER_PPPL;
const PPPL_TIME_TOLERANCE: f64 = 1e-9;

/// PPPL parameters, one element per section in every array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PpplConfig {
    /// Acceleration of the first parabola.
    pub acceleration1: Vec<f64>,
    /// Acceleration of the second parabola, zero for a linear segment.
    pub acceleration2: Vec<f64>,
    /// Acceleration of the third parabola.
    pub acceleration3: Vec<f64>,
    /// Rate at the end of the second parabola.
    pub rate2: Vec<f64>,
    /// Rate at the end of the third parabola and along the linear segment.
    pub rate4: Vec<f64>,
    /// Reference at the end of the third parabola.
    pub ref4: Vec<f64>,
    /// Duration of the linear segment.
    pub duration4: Vec<f64>,
}

impl Default for PpplConfig {
    fn default() -> Self {
        Self {
            acceleration1: vec![1.0],
            acceleration2: vec![0.0],
            acceleration3: vec![-1.0],
            rate2: vec![1.0],
            rate4: vec![0.0],
            ref4: vec![1.0],
            duration4: vec![0.0],
        }
    }
}

/// Armed PPPL segments.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pppl {
    num_segs: usize,
    time: [f64; FG_PPPL_MAX_SEGS],
    a0: [f64; FG_PPPL_MAX_SEGS],
    a1: [f64; FG_PPPL_MAX_SEGS],
    a2: [f64; FG_PPPL_MAX_SEGS],
}

struct SegmentEnd {
    duration: f64,
    reference: f64,
    rate: f64,
    acceleration: f64,
}

impl Pppl {
    /// Arm a PPPL starting from `ctx.initial_ref` at rest.
    ///
    /// # Errors
    ///
    /// Returns [`FgError::BadArrayLength`] when the arrays are empty, too long
    /// or of different lengths, [`FgError::BadParameter`] when a section has
    /// no solution with non-negative segment durations, and a limit error
    /// when a segment end violates `ctx.limits`.
    pub fn arm(ctx: &ArmContext, config: &PpplConfig) -> Result<ArmedFunction, FgError> {
        let arrays: [(&'static str, &[f64]); 7] = [
            ("acceleration1", &config.acceleration1),
            ("acceleration2", &config.acceleration2),
            ("acceleration3", &config.acceleration3),
            ("rate2", &config.rate2),
            ("rate4", &config.rate4),
            ("ref4", &config.ref4),
            ("duration4", &config.duration4),
        ];

        let n = config.acceleration1.len();
        if n == 0 || n > FG_MAX_PPPLS {
            return Err(FgError::BadArrayLength {
                index: 0,
                name: "acceleration1",
                actual: n,
                expected: if n == 0 { 1 } else { FG_MAX_PPPLS },
            });
        }
        for (index, (name, array)) in arrays.iter().enumerate() {
            if array.len() != n {
                return Err(FgError::BadArrayLength {
                    index,
                    name: *name,
                    actual: array.len(),
                    expected: n,
                });
            }
        }

        let mut pppl = Self {
            num_segs: n * SEGS_PER_PPPL,
            time: [0.0; FG_PPPL_MAX_SEGS],
            a0: [0.0; FG_PPPL_MAX_SEGS],
            a1: [0.0; FG_PPPL_MAX_SEGS],
            a2: [0.0; FG_PPPL_MAX_SEGS],
        };

        let mut meta = FunctionMeta::new(ctx.delay, ctx.initial_ref);
        let mut points = Vec::with_capacity(1 + pppl.num_segs);
        points.push(CheckPoint::new(
            0,
            ctx.initial_ref,
            0.0,
            config.acceleration1[0],
        ));

        let mut time = ctx.delay;
        let mut reference = ctx.initial_ref;
        let mut rate = 0.0;

        for i in 0..n {
            let ends = solve_section(
                i,
                reference,
                rate,
                config.acceleration1[i],
                config.acceleration2[i],
                config.acceleration3[i],
                config.rate2[i],
                config.rate4[i],
                config.ref4[i],
                config.duration4[i],
            )?;

            for (j, end) in ends.iter().enumerate() {
                let seg = i * SEGS_PER_PPPL + j;
                let start_rate = rate;

                time += end.duration;
                pppl.time[seg] = time;
                pppl.a0[seg] = end.reference;
                pppl.a1[seg] = end.rate;
                pppl.a2[seg] = 0.5 * end.acceleration;

                if end.acceleration != 0.0 && start_rate * end.rate < 0.0 {
                    meta.include(end.reference - end.rate * end.rate / (2.0 * end.acceleration));
                }
                meta.include(end.reference);
                points.push(CheckPoint::new(seg + 1, end.reference, end.rate, end.acceleration));

                reference = end.reference;
                rate = end.rate;
            }
        }

        meta.set_end(time, reference, rate);
        check_points(&mut meta, ctx.limits(), ctx.polarity, &points)?;

        Ok(ArmedFunction::new(FunctionKind::Pppl, meta, FgShape::Pppl(pppl)))
    }

    /// Number of segments.
    pub fn num_segments(&self) -> usize {
        self.num_segs
    }

    /// Segment end times.
    pub fn segment_times(&self) -> &[f64] {
        &self.time[..self.num_segs]
    }

    pub(crate) fn sample(&self, time: f64) -> f64 {
        let last = self.num_segs.saturating_sub(1);
        let seg = self.time[..self.num_segs]
            .partition_point(|&end| end < time)
            .min(last);
        let dt = time - self.time[seg];
        self.a0[seg] + (self.a1[seg] + self.a2[seg] * dt) * dt
    }
}

#[allow(clippy::too_many_arguments, reason = "one argument per PPPL array")]
fn solve_section(
    index: usize,
    r0: f64,
    v0: f64,
    acc1: f64,
    acc2: f64,
    acc3: f64,
    v2: f64,
    v4: f64,
    r4: f64,
    duration4: f64,
) -> Result<[SegmentEnd; SEGS_PER_PPPL], FgError> {
    if acc1 == 0.0 {
        return Err(FgError::bad_parameter(index, "acceleration1", acc1));
    }
    if acc3 == 0.0 {
        return Err(FgError::bad_parameter(index, "acceleration3", acc3));
    }
    if duration4 < 0.0 {
        return Err(FgError::bad_parameter(index, "duration4", duration4));
    }

    let delta = r4 - r0;
    let p3 = (v4 * v4 - v2 * v2) / (2.0 * acc3);

    let (v1, t2) = if acc2 == 0.0 {
        let v1 = v2;
        let p1 = (v1 * v1 - v0 * v0) / (2.0 * acc1);
        let p2 = delta - p1 - p3;
        let t2 = if v2 == 0.0 {
            if p2.abs() > PPPL_TIME_TOLERANCE {
                return Err(FgError::bad_parameter(index, "rate2", v2));
            }
            0.0
        } else {
            p2 / v2
        };
        (v1, t2)
    } else {
        let denom = 0.5 / acc1 - 0.5 / acc2;
        if denom.abs() < f64::EPSILON {
            return Err(FgError::bad_parameter(index, "acceleration2", acc2));
        }
        let v1_squared = (delta + 0.5 * v0 * v0 / acc1 - 0.5 * v2 * v2 / acc2 - p3) / denom;
        if v1_squared < 0.0 {
            return Err(FgError::bad_parameter(index, "ref4", r4));
        }
        let root = v1_squared.sqrt();
        let v1 = [root, -root]
            .into_iter()
            .find(|v1| {
                (v1 - v0) / acc1 >= -PPPL_TIME_TOLERANCE && (v2 - v1) / acc2 >= -PPPL_TIME_TOLERANCE
            })
            .ok_or(FgError::bad_parameter(index, "rate2", v2))?;
        (v1, (v2 - v1) / acc2)
    };

    let t1 = (v1 - v0) / acc1;
    if t1 < -PPPL_TIME_TOLERANCE {
        return Err(FgError::bad_parameter(index, "acceleration1", acc1));
    }
    if t2 < -PPPL_TIME_TOLERANCE {
        return Err(FgError::bad_parameter(index, "rate2", v2));
    }
    let t3 = (v4 - v2) / acc3;
    if t3 < -PPPL_TIME_TOLERANCE {
        return Err(FgError::bad_parameter(index, "acceleration3", acc3));
    }
    let (t1, t2, t3) = (t1.max(0.0), t2.max(0.0), t3.max(0.0));

    let r1 = r0 + 0.5 * (v0 + v1) * t1;
    let r2 = r1 + 0.5 * (v1 + v2) * t2;

    Ok([
        SegmentEnd {
            duration: t1,
            reference: r1,
            rate: v1,
            acceleration: acc1,
        },
        SegmentEnd {
            duration: t2,
            reference: r2,
            rate: v2,
            acceleration: acc2,
        },
        SegmentEnd {
            duration: t3,
            reference: r4,
            rate: v4,
            acceleration: acc3,
        },
        SegmentEnd {
            duration: duration4,
            reference: r4 + v4 * duration4,
            rate: v4,
            acceleration: 0.0,
        },
    ])
}
