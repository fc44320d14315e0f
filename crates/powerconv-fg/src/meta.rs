//! Metadata shared by every armed function.

use serde::{Deserialize, Serialize};

use crate::limits::FgLimits;

/// Polarity of the values a function produces over its whole duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FgFuncPolarity {
    /// The function is identically zero.
    #[default]
    Zero,
    /// Values are never negative.
    Positive,
    /// Values are never positive.
    Negative,
    /// Values of both signs occur.
    Both,
}

impl FgFuncPolarity {
    /// Classify a function from its value range.
    pub fn from_range(min: f64, max: f64) -> Self {
        match (min < 0.0, max > 0.0) {
            (false, false) => Self::Zero,
            (false, true) => Self::Positive,
            (true, false) => Self::Negative,
            (true, true) => Self::Both,
        }
    }
}

/// Phase of the function relative to the sampling time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FgPhase {
    /// Before the start time; the initial reference is returned.
    Pre,
    /// Between start and end.
    During,
    /// At or after the end time; the final reference is returned.
    Post,
}

/// Time span of a function.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FgTime {
    /// Start time (the arming delay).
    pub start: f64,
    /// End time.
    pub end: f64,
    /// `end - start`.
    pub duration: f64,
}

/// Reference range of a function.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FgRange {
    /// Value returned at the start time.
    pub initial: f64,
    /// Value returned at the end time.
    pub final_ref: f64,
    /// Smallest value over the function.
    pub min: f64,
    /// Largest value over the function.
    pub max: f64,
}

/// Metadata filled in when a function is armed.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FunctionMeta {
    /// Polarity of the function.
    pub polarity: FgFuncPolarity,
    /// Whether the limits were checked with inverted polarity.
    pub limits_inverted: bool,
    /// Time span.
    pub time: FgTime,
    /// Value range.
    pub range: FgRange,
    /// Rate at the end of the function, held in the post phase.
    pub final_rate: f64,
    /// Limits that were checked, if any.
    pub limits: Option<FgLimits>,
}

impl FunctionMeta {
    pub(crate) fn new(delay: f64, initial: f64) -> Self {
        Self {
            time: FgTime {
                start: delay,
                end: delay,
                duration: 0.0,
            },
            range: FgRange {
                initial,
                final_ref: initial,
                min: initial,
                max: initial,
            },
            ..Self::default()
        }
    }

    pub(crate) fn include(&mut self, value: f64) {
        if value < self.range.min {
            self.range.min = value;
        }
        if value > self.range.max {
            self.range.max = value;
        }
    }

    pub(crate) fn set_end(&mut self, end: f64, final_ref: f64, final_rate: f64) {
        self.time.end = end;
        self.time.duration = end - self.time.start;
        self.range.final_ref = final_ref;
        self.final_rate = final_rate;
        self.include(final_ref);
        self.polarity = FgFuncPolarity::from_range(self.range.min, self.range.max);
    }

    /// Sample outside the active span, or `None` when `time` is inside it.
    pub(crate) fn outside(&self, time: f64) -> Option<(FgPhase, f64)> {
        if time < self.time.start {
            Some((FgPhase::Pre, self.range.initial))
        } else if time >= self.time.end {
            Some((
                FgPhase::Post,
                self.range.final_ref + self.final_rate * (time - self.time.end),
            ))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polarity_from_range() {
        assert_eq!(FgFuncPolarity::from_range(0.0, 0.0), FgFuncPolarity::Zero);
        assert_eq!(FgFuncPolarity::from_range(0.0, 1.0), FgFuncPolarity::Positive);
        assert_eq!(FgFuncPolarity::from_range(-1.0, 0.0), FgFuncPolarity::Negative);
        assert_eq!(FgFuncPolarity::from_range(-1.0, 1.0), FgFuncPolarity::Both);
    }

    #[test]
    fn test_outside_phases() {
        let mut meta = FunctionMeta::new(1.0, 2.0);
        meta.set_end(3.0, 5.0, 0.5);

        assert_eq!(meta.outside(0.5), Some((FgPhase::Pre, 2.0)));
        assert_eq!(meta.outside(2.0), None);
        assert_eq!(meta.outside(3.0), Some((FgPhase::Post, 5.0)));
        assert_eq!(meta.outside(5.0), Some((FgPhase::Post, 6.0)));
        assert_eq!(meta.time.duration, 2.0);
        assert_eq!(meta.polarity, FgFuncPolarity::Positive);
    }
}
