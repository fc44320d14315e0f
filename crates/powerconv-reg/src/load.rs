//! Magnet load model.
//!
//! The circuit is a series resistance feeding a magnet (resistance and
//! inductance) shunted by a parallel resistance. The magnet inductance may
//! saturate between two current thresholds.

use serde::{Deserialize, Serialize};

use crate::error::RegError;

/// Number of load parameter sets.
pub const REG_N_LOADS: usize = 4;

/// Parameters of one load.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    /// Series resistance in ohms.
    pub ohms_ser: f64,
    /// Parallel resistance in ohms.
    pub ohms_par: f64,
    /// Magnet resistance in ohms.
    pub ohms_mag: f64,
    /// Unsaturated magnet inductance in henrys.
    pub henrys: f64,
    /// Fully saturated magnet inductance in henrys.
    pub henrys_sat: f64,
    /// Magnet current where saturation starts.
    pub i_sat_start: f64,
    /// Magnet current where saturation is complete.
    pub i_sat_end: f64,
    /// Field per ampere of magnet current.
    pub gauss_per_amp: f64,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            ohms_ser: 0.1,
            ohms_par: 1.0e8,
            ohms_mag: 0.9,
            henrys: 1.0,
            henrys_sat: 1.0,
            i_sat_start: 0.0,
            i_sat_end: 0.0,
            gauss_per_amp: 10.0,
        }
    }
}

/// Load with derived quantities.
///
/// # Example
///
/// ```
/// use powerconv_reg::load::{Load, LoadConfig};
///
/// let load = Load::new(&LoadConfig::default(), 0)?;
/// assert!((load.ohms() - 1.0).abs() < 1e-6);
/// assert!((load.tc() - 1.0).abs() < 1e-6);
/// # Ok::<(), powerconv_reg::RegError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Load {
    config: LoadConfig,
    k_v: f64,
    ohms: f64,
    gain: f64,
    saturates: bool,
}

impl Load {
    /// Build the load at load-select `index`.
    ///
    /// # Errors
    ///
    /// Returns [`RegError::InvalidLoad`] for non-physical parameters.
    pub fn new(config: &LoadConfig, index: usize) -> Result<Self, RegError> {
        let invalid = |reason| Err(RegError::InvalidLoad { index, reason });

        if !(config.ohms_par > 0.0) {
            return invalid("parallel resistance must be positive");
        }
        if config.ohms_ser < 0.0 || config.ohms_mag < 0.0 {
            return invalid("resistances must not be negative");
        }
        if !(config.henrys > 0.0) {
            return invalid("inductance must be positive");
        }
        if !(config.henrys_sat > 0.0) {
            return invalid("saturated inductance must be positive");
        }

        let k_v = config.ohms_par / (config.ohms_par + config.ohms_ser);
        let ohms = config.ohms_mag + k_v * config.ohms_ser;
        if !(ohms > 0.0) {
            return invalid("total resistance must be positive");
        }

        Ok(Self {
            config: *config,
            k_v,
            ohms,
            gain: k_v / ohms,
            saturates: config.henrys_sat < config.henrys && config.i_sat_end > config.i_sat_start,
        })
    }

    /// Parameters.
    pub fn config(&self) -> &LoadConfig {
        &self.config
    }

    /// Fraction of the circuit voltage across the magnet branch at zero
    /// series current.
    pub fn k_v(&self) -> f64 {
        self.k_v
    }

    /// Resistance seen by the magnet current.
    pub fn ohms(&self) -> f64 {
        self.ohms
    }

    /// Unsaturated time constant in seconds.
    pub fn tc(&self) -> f64 {
        self.config.henrys / self.ohms
    }

    /// Steady-state magnet current per circuit volt.
    pub fn gain(&self) -> f64 {
        self.gain
    }

    /// Field per ampere.
    pub fn gauss_per_amp(&self) -> f64 {
        self.config.gauss_per_amp
    }

    /// Ratio of the inductance at `i_mag` to the unsaturated inductance.
    ///
    /// Follows a smoothstep between the saturation thresholds.
    #[inline]
    pub fn sat_factor(&self, i_mag: f64) -> f64 {
        if !self.saturates {
            return 1.0;
        }
        let x = ((i_mag.abs() - self.config.i_sat_start)
            / (self.config.i_sat_end - self.config.i_sat_start))
            .clamp(0.0, 1.0);
        let blend = x * x * (3.0 - 2.0 * x);
        let sat_ratio = self.config.henrys_sat / self.config.henrys;
        1.0 - blend * (1.0 - sat_ratio)
    }

    /// Inductance at `i_mag`.
    #[inline]
    pub fn henrys_at(&self, i_mag: f64) -> f64 {
        self.config.henrys * self.sat_factor(i_mag)
    }

    /// Steady-state circuit voltage for a magnet current.
    #[inline]
    pub fn steady_voltage(&self, i_mag: f64) -> f64 {
        i_mag / self.gain
    }

    /// Compensate a voltage reference computed for the unsaturated load.
    ///
    /// Only the inductive part of the voltage is scaled by the saturation
    /// factor; the resistive part at `i_meas` is unchanged.
    #[inline]
    pub fn vref_sat(&self, i_meas: f64, v_ref: f64) -> f64 {
        let v_resistive = self.steady_voltage(i_meas);
        v_resistive + self.sat_factor(i_meas) * (v_ref - v_resistive)
    }

    /// Inverse of [`Load::vref_sat`].
    #[inline]
    pub fn vref_sat_inverse(&self, i_meas: f64, v_sat: f64) -> f64 {
        let v_resistive = self.steady_voltage(i_meas);
        v_resistive + (v_sat - v_resistive) / self.sat_factor(i_meas)
    }

    /// Circuit current for a magnet current and circuit voltage.
    #[inline]
    pub fn circuit_current(&self, i_mag: f64, v_circuit: f64) -> f64 {
        let v_mag = self.k_v * (v_circuit - self.config.ohms_ser * i_mag);
        i_mag + v_mag / self.config.ohms_par
    }

    /// First-order discrete model `i[k+1] = a·i[k] + b·v[k]` over `period`
    /// seconds, scaled by `output_gain`.
    pub fn plant(&self, period: f64, output_gain: f64) -> (f64, f64) {
        let a = (-period / self.tc()).exp();
        (a, output_gain * self.gain * (1.0 - a))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn saturating() -> Result<Load, RegError> {
        Load::new(
            &LoadConfig {
                henrys_sat: 0.5,
                i_sat_start: 10.0,
                i_sat_end: 20.0,
                ..LoadConfig::default()
            },
            1,
        )
    }

    #[test]
    fn test_sat_factor_profile() -> Result<(), RegError> {
        let load = saturating()?;
        assert_eq!(load.sat_factor(5.0), 1.0);
        assert_abs_diff_eq!(load.sat_factor(15.0), 0.75, epsilon = 1e-12);
        assert_abs_diff_eq!(load.sat_factor(-25.0), 0.5, epsilon = 1e-12);
        Ok(())
    }

    #[test]
    fn test_vref_sat_inverse() -> Result<(), RegError> {
        let load = saturating()?;
        let v_sat = load.vref_sat(17.0, 40.0);
        assert!(v_sat < 40.0);
        assert_abs_diff_eq!(load.vref_sat_inverse(17.0, v_sat), 40.0, epsilon = 1e-9);
        Ok(())
    }

    #[test]
    fn test_invalid_load() {
        let err = Load::new(
            &LoadConfig {
                henrys: 0.0,
                ..LoadConfig::default()
            },
            2,
        );
        assert_eq!(
            err,
            Err(RegError::InvalidLoad {
                index: 2,
                reason: "inductance must be positive"
            })
        );
    }

    #[test]
    fn test_plant_steady_state_gain() -> Result<(), RegError> {
        let load = Load::new(&LoadConfig::default(), 0)?;
        let (a, b) = load.plant(0.001, 10.0);
        assert_abs_diff_eq!(b / (1.0 - a), 10.0 * load.gain(), epsilon = 1e-9);
        Ok(())
    }
}
