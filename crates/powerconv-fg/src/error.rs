//! Error types for function arming.
//!
//! Every generator validates its parameters when it is armed and reports the
//! first violation it finds. The error carries an index that locates the
//! problem: the segment number for segmented functions, the point number for
//! tables, or the array number for arrays that disagree in length.

use thiserror::Error;

/// Error returned when a function cannot be armed.
///
/// The variants map one-to-one onto [`FgErrorKind`], which provides a stable
/// numeric code for reporting through the parameter surface.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum FgError {
    /// A scalar parameter is outside its legal domain.
    #[error("bad parameter {name} = {value} (index {index})")]
    BadParameter {
        /// Segment, section or point the parameter belongs to.
        index: usize,
        /// Parameter name.
        name: &'static str,
        /// Offending value.
        value: f64,
    },

    /// An array argument has the wrong number of elements.
    #[error("bad array length for {name}: {actual} elements, expected {expected} (index {index})")]
    BadArrayLength {
        /// Position of the array in the argument list.
        index: usize,
        /// Array name.
        name: &'static str,
        /// Number of elements supplied.
        actual: usize,
        /// Number of elements required.
        expected: usize,
    },

    /// A table time does not advance by at least the minimum step.
    #[error("invalid time {time} at point {index}: previous {previous}, minimum step {min_step}")]
    InvalidTime {
        /// Point index in the table.
        index: usize,
        /// Offending time.
        time: f64,
        /// Time of the preceding point.
        previous: f64,
        /// Minimum allowed spacing.
        min_step: f64,
    },

    /// The reference leaves the allowed range.
    #[error("reference {value} outside limits [{min}, {max}] (index {index})")]
    OutOfLimits {
        /// Segment or point where the violation occurs.
        index: usize,
        /// Offending reference.
        value: f64,
        /// Lower bound in force.
        min: f64,
        /// Upper bound in force.
        max: f64,
    },

    /// The rate of change exceeds the rate limit.
    #[error("rate {rate} exceeds limit {limit} (index {index})")]
    OutOfRateLimits {
        /// Segment or point where the violation occurs.
        index: usize,
        /// Offending rate.
        rate: f64,
        /// Rate limit in force.
        limit: f64,
    },

    /// The acceleration exceeds the acceleration limit.
    #[error("acceleration {acceleration} exceeds limit {limit} (index {index})")]
    OutOfAccelerationLimits {
        /// Segment where the violation occurs.
        index: usize,
        /// Offending acceleration.
        acceleration: f64,
        /// Acceleration limit in force.
        limit: f64,
    },
}

/// Error kind with a stable numeric code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FgErrorKind {
    /// See [`FgError::BadParameter`].
    BadParameter = 1,
    /// See [`FgError::BadArrayLength`].
    BadArrayLength = 2,
    /// See [`FgError::InvalidTime`].
    InvalidTime = 3,
    /// See [`FgError::OutOfLimits`].
    OutOfLimits = 4,
    /// See [`FgError::OutOfRateLimits`].
    OutOfRateLimits = 5,
    /// See [`FgError::OutOfAccelerationLimits`].
    OutOfAccelerationLimits = 6,
}

impl FgErrorKind {
    /// Numeric code of this kind.
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Convert a numeric code back into a kind.
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::BadParameter),
            2 => Some(Self::BadArrayLength),
            3 => Some(Self::InvalidTime),
            4 => Some(Self::OutOfLimits),
            5 => Some(Self::OutOfRateLimits),
            6 => Some(Self::OutOfAccelerationLimits),
            _ => None,
        }
    }
}

impl FgError {
    /// Kind of this error.
    pub const fn kind(&self) -> FgErrorKind {
        match self {
            Self::BadParameter { .. } => FgErrorKind::BadParameter,
            Self::BadArrayLength { .. } => FgErrorKind::BadArrayLength,
            Self::InvalidTime { .. } => FgErrorKind::InvalidTime,
            Self::OutOfLimits { .. } => FgErrorKind::OutOfLimits,
            Self::OutOfRateLimits { .. } => FgErrorKind::OutOfRateLimits,
            Self::OutOfAccelerationLimits { .. } => FgErrorKind::OutOfAccelerationLimits,
        }
    }

    /// Segment, point or array index carried by the error.
    pub const fn index(&self) -> usize {
        match self {
            Self::BadParameter { index, .. }
            | Self::BadArrayLength { index, .. }
            | Self::InvalidTime { index, .. }
            | Self::OutOfLimits { index, .. }
            | Self::OutOfRateLimits { index, .. }
            | Self::OutOfAccelerationLimits { index, .. } => *index,
        }
    }

    pub(crate) const fn bad_parameter(index: usize, name: &'static str, value: f64) -> Self {
        Self::BadParameter { index, name, value }
    }
}
