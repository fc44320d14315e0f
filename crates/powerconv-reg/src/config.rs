//! Manager configuration and the small enums shared by every module.
//!
//! Every struct has a `Default` and `#[serde(default)]` so that a partial
//! YAML or JSON document only needs to name what it changes.

use std::fmt;

use powerconv_filters::{MeasChainConfig, MeasSelect};
use serde::{Deserialize, Serialize};

use crate::err::ErrLimitsConfig;
use crate::lim::{MeasLimitsConfig, RefLimitsConfig, RmsLimitsConfig};
use crate::load::{LoadConfig, REG_N_LOADS};
use crate::rst::RstConfig;
use crate::vs::VsConfig;

/// Regulation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegMode {
    /// Converter off, zero voltage reference.
    #[default]
    None,
    /// Open-loop voltage reference.
    Voltage,
    /// Closed-loop current regulation.
    Current,
    /// Closed-loop field regulation.
    Field,
}

impl RegMode {
    /// All modes.
    pub const ALL: [Self; 4] = [Self::None, Self::Voltage, Self::Current, Self::Field];

    /// Signal regulated in this mode.
    pub const fn signal(self) -> Option<SignalKind> {
        match self {
            Self::Current => Some(SignalKind::Current),
            Self::Field => Some(SignalKind::Field),
            Self::None | Self::Voltage => None,
        }
    }

    /// Bit used in parameter mode masks.
    pub const fn bit(self) -> u8 {
        1 << self as u8
    }

    /// Name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Voltage => "VOLTAGE",
            Self::Current => "CURRENT",
            Self::Field => "FIELD",
        }
    }

    /// Look up a mode by name, ignoring case.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|mode| mode.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for RegMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Signal with its own RST regulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalKind {
    /// Magnetic field.
    Field,
    /// Circuit current.
    Current,
}

impl SignalKind {
    /// Both signals.
    pub const ALL: [Self; 2] = [Self::Field, Self::Current];

    /// Index into per-signal arrays.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Regulation mode for this signal.
    pub const fn mode(self) -> RegMode {
        match self {
            Self::Field => RegMode::Field,
            Self::Current => RegMode::Current,
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Field => "FIELD",
            Self::Current => "CURRENT",
        })
    }
}

/// What the manager hands to the power converter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Actuation {
    /// A voltage reference; current and field are regulated here.
    #[default]
    VoltageRef,
    /// A current reference; current is regulated by the converter.
    CurrentRef,
}

impl fmt::Display for Actuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::VoltageRef => "VOLTAGE_REF",
            Self::CurrentRef => "CURRENT_REF",
        })
    }
}

/// Which RST parameter set and load are in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RstSource {
    /// Operational parameters on the operational load.
    #[default]
    Operational,
    /// Test parameters on the test load.
    Test,
}

impl RstSource {
    /// Both sources.
    pub const ALL: [Self; 2] = [Self::Operational, Self::Test];

    /// Index into per-source arrays.
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for RstSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Operational => "OPERATIONAL",
            Self::Test => "TEST",
        })
    }
}

/// Measurement processing for one signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeasConfig {
    /// FIR stage lengths in iterations; one or less disables a stage.
    pub fir_lengths: [usize; 2],
    /// Extrapolation history length in iterations.
    pub extrapolation_len: usize,
    /// Acquisition delay of the unfiltered measurement in iterations.
    pub delay_iters: f64,
    /// Measurement fed to the regulator.
    pub reg_select: MeasSelect,
    /// Rate estimator sub-period in iterations.
    pub rate_period_iters: u32,
    /// Low and zero thresholds.
    pub limits: MeasLimitsConfig,
}

impl Default for MeasConfig {
    fn default() -> Self {
        Self {
            fir_lengths: [0, 0],
            extrapolation_len: 1,
            delay_iters: 1.0,
            reg_select: MeasSelect::Filtered,
            rate_period_iters: 1,
            limits: MeasLimitsConfig::default(),
        }
    }
}

/// Configuration of a regulated signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    /// Whether the signal can be regulated.
    pub enabled: bool,
    /// Regulation period in iterations.
    pub reg_period_iters: u32,
    /// Reflect the reference limits about zero.
    pub invert_limits: bool,
    /// Measurement processing.
    pub meas: MeasConfig,
    /// Reference limits.
    pub limits: RefLimitsConfig,
    /// Regulation error thresholds.
    pub err: ErrLimitsConfig,
    /// RST parameters indexed by [`RstSource::index`].
    pub rst: [RstConfig; 2],
}

impl SignalConfig {
    fn with_limits(pos: f64, rate: f64) -> Self {
        Self {
            enabled: true,
            reg_period_iters: 1,
            invert_limits: false,
            meas: MeasConfig::default(),
            limits: RefLimitsConfig {
                pos,
                min: 0.0,
                neg: -pos,
                rate,
                acceleration: 0.0,
                closeloop: 0.0,
            },
            err: ErrLimitsConfig {
                warning: 0.05 * pos,
                fault: 0.2 * pos,
            },
            rst: [RstConfig::default(); 2],
        }
    }

    /// Default field signal: ±500 G at 1000 G/s.
    pub fn default_field() -> Self {
        Self::with_limits(500.0, 1000.0)
    }

    /// Default current signal: ±50 A at 100 A/s.
    pub fn default_current() -> Self {
        Self::with_limits(50.0, 100.0)
    }
}

impl Default for SignalConfig {
    /// Current defaults, also used to fill fields missing from a partial
    /// field document.
    fn default() -> Self {
        Self::default_current()
    }
}

/// Voltage reference configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoltageConfig {
    /// Whether open-loop voltage mode is allowed.
    pub enabled: bool,
    /// Voltage limits.
    pub limits: RefLimitsConfig,
}

impl Default for VoltageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            limits: RefLimitsConfig {
                pos: 100.0,
                neg: -100.0,
                ..RefLimitsConfig::default()
            },
        }
    }
}

/// Simulated acquisition chains.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Field measurement chain.
    pub field: MeasChainConfig,
    /// Current measurement chain.
    pub current: MeasChainConfig,
    /// Voltage measurement chain.
    pub voltage: MeasChainConfig,
    /// Noise seed; the three chains use consecutive seeds.
    pub seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        let chain = MeasChainConfig {
            delay_iters: 1.0,
            ..MeasChainConfig::default()
        };
        Self {
            field: chain,
            current: chain,
            voltage: chain,
            seed: 0,
        }
    }
}

/// Complete manager configuration.
///
/// # Example
///
/// ```
/// use powerconv_reg::config::{Actuation, RegConfig};
///
/// let config: RegConfig = serde_json::from_str(r#"{ "actuation": "CURRENT_REF", "load_select": 2 }"#)?;
/// assert_eq!(config.actuation, Actuation::CurrentRef);
/// assert_eq!(config.load_select, 2);
/// assert_eq!(config.iter_period_us, 1000);
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegConfig {
    /// Iteration period in microseconds.
    pub iter_period_us: u32,
    /// Converter actuation.
    pub actuation: Actuation,
    /// Field signal.
    pub field: SignalConfig,
    /// Current signal.
    pub current: SignalConfig,
    /// Voltage reference.
    pub voltage: VoltageConfig,
    /// RMS limits on the circuit current.
    pub rms: RmsLimitsConfig,
    /// Load parameter sets.
    pub loads: [LoadConfig; REG_N_LOADS],
    /// Load used with [`RstSource::Operational`].
    pub load_select: usize,
    /// Load used with [`RstSource::Test`].
    pub load_test_select: usize,
    /// Voltage source model.
    pub vs: VsConfig,
    /// Simulation.
    pub sim: SimConfig,
}

impl Default for RegConfig {
    fn default() -> Self {
        Self {
            iter_period_us: 1000,
            actuation: Actuation::VoltageRef,
            field: SignalConfig::default_field(),
            current: SignalConfig::default_current(),
            voltage: VoltageConfig::default(),
            rms: RmsLimitsConfig::default(),
            loads: [LoadConfig::default(); REG_N_LOADS],
            load_select: 0,
            load_test_select: 0,
            vs: VsConfig::default(),
            sim: SimConfig::default(),
        }
    }
}

impl RegConfig {
    /// Iteration period in seconds.
    pub fn iter_period(&self) -> f64 {
        f64::from(self.iter_period_us) * 1.0e-6
    }

    /// Configuration of `signal`.
    pub fn signal(&self, signal: SignalKind) -> &SignalConfig {
        match signal {
            SignalKind::Field => &self.field,
            SignalKind::Current => &self.current,
        }
    }

    /// Mutable configuration of `signal`.
    pub fn signal_mut(&mut self, signal: SignalKind) -> &mut SignalConfig {
        match signal {
            SignalKind::Field => &mut self.field,
            SignalKind::Current => &mut self.current,
        }
    }

    /// Load index used with `source`.
    pub fn load_index(&self, source: RstSource) -> usize {
        match source {
            RstSource::Operational => self.load_select,
            RstSource::Test => self.load_test_select,
        }
    }

    /// Whether `mode` is enabled.
    pub fn mode_enabled(&self, mode: RegMode) -> bool {
        match mode {
            RegMode::None => true,
            RegMode::Voltage => self.voltage.enabled,
            RegMode::Current => self.current.enabled,
            RegMode::Field => self.field.enabled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_names_round_trip() {
        for mode in RegMode::ALL {
            assert_eq!(RegMode::from_name(&mode.name().to_lowercase()), Some(mode));
        }
        assert_eq!(RegMode::from_name("TORQUE"), None);
    }

    #[test]
    fn test_mode_bits_are_distinct() {
        let all = RegMode::ALL.iter().fold(0u8, |acc, mode| {
            assert_eq!(acc & mode.bit(), 0);
            acc | mode.bit()
        });
        assert_eq!(all, 0b1111);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() -> Result<(), serde_yaml::Error> {
        let yaml = "
field:
  enabled: false
current:
  limits:
    pos: 20.0
    neg: -20.0
load_select: 3
";
        let config: RegConfig = serde_yaml::from_str(yaml)?;
        assert!(!config.field.enabled);
        assert_eq!(config.current.limits.pos, 20.0);
        assert_eq!(config.current.limits.rate, 0.0);
        assert_eq!(config.current.reg_period_iters, 1);
        assert_eq!(config.load_index(RstSource::Operational), 3);
        assert_eq!(config.load_index(RstSource::Test), 0);
        assert_eq!(config.vs, VsConfig::default());
        Ok(())
    }
}
