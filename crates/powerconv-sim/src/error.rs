//! Error types for the simulation driver

use std::path::PathBuf;

use powerconv_reg::{RegError, RegMode};
use thiserror::Error;

/// Failures of a simulation run. The variant decides the exit code.
#[derive(Error, Debug)]
pub enum SimError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid run configuration {path}: {source}")]
    Config {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("regulation manager rejected the configuration: {0}")]
    Reg(#[from] RegError),

    #[error("no function can be armed in {0} mode")]
    NoFunctionInMode(RegMode),

    #[error("function rejected: {0}")]
    Function(#[from] powerconv_fg::RegistryError),

    #[error("iteration count must be positive")]
    NoIterations,
}

impl SimError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Io { .. } | Self::Config { .. } | Self::NoIterations => 2,
            Self::Function(_) | Self::NoFunctionInMode(_) => 3,
            Self::Reg(RegError::RegulatorFault { .. }) => 4,
            Self::Reg(_) => 2,
        }
    }
}
