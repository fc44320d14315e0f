//! Error types for regulation.

use powerconv_filters::FilterError;
use thiserror::Error;

use crate::config::{Actuation, RegMode, RstSource, SignalKind};
use crate::jury::JurysResult;

/// Error returned by the regulation manager and its models.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegError {
    /// Load parameters are not physical.
    #[error("invalid load {index}: {reason}")]
    InvalidLoad {
        /// Load-select index.
        index: usize,
        /// What is wrong.
        reason: &'static str,
    },

    /// Voltage source model cannot be built.
    #[error("invalid voltage source model: {0}")]
    InvalidVs(&'static str),

    /// RST parameters cannot be built.
    #[error("invalid {signal} RST parameters: {reason}")]
    InvalidRst {
        /// Regulated signal.
        signal: SignalKind,
        /// What is wrong.
        reason: &'static str,
    },

    /// New RST parameters failed the stability test and were not activated.
    #[error("{signal} {rst_source} RST parameters rejected: {jury}")]
    RegulatorFault {
        /// Regulated signal.
        signal: SignalKind,
        /// Parameter source.
        rst_source: RstSource,
        /// Stability test result.
        jury: JurysResult,
    },

    /// The signal or voltage regulation is disabled.
    #[error("{0} regulation is not enabled")]
    ModeDisabled(RegMode),

    /// The actuation cannot regulate the requested mode.
    #[error("actuation {actuation} cannot regulate {mode}")]
    UnsupportedMode {
        /// Requested mode.
        mode: RegMode,
        /// Configured actuation.
        actuation: Actuation,
    },

    /// Period or selection parameter out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),

    /// Measurement filter or simulated measurement chain rejected its
    /// configuration.
    #[error(transparent)]
    Filter(#[from] FilterError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RegError::RegulatorFault {
            signal: SignalKind::Current,
            rst_source: RstSource::Test,
            jury: JurysResult::Unstable { stage: 2 },
        };
        insta::assert_snapshot!(err.to_string(), @"CURRENT TEST RST parameters rejected: unstable at stage 2");

        let err = RegError::UnsupportedMode {
            mode: RegMode::Field,
            actuation: Actuation::CurrentRef,
        };
        insta::assert_snapshot!(err.to_string(), @"actuation CURRENT_REF cannot regulate FIELD");
    }
}
