//! Voltage source model.
//!
//! The source is either a second-order response with an optional zero,
//! discretised with the bilinear transform prewarped at its natural
//! frequency, or an explicit third-order discrete transfer function.

use std::f64::consts::TAU;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::RegError;

/// Number of coefficients of the discrete transfer function.
pub const VS_N_COEFFS: usize = 4;

/// Steady-state gain error above which the model is reported.
const VS_GAIN_TOLERANCE: f64 = 1.0e-3;

/// Voltage source parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VsConfig {
    /// Natural frequency in Hz; zero selects the explicit model.
    pub bandwidth: f64,
    /// Damping factor.
    pub z: f64,
    /// Time constant of the optional zero in seconds.
    pub tau_zero: f64,
    /// Explicit numerator coefficients in powers of `z⁻¹`.
    pub num: [f64; VS_N_COEFFS],
    /// Explicit denominator coefficients in powers of `z⁻¹`.
    pub den: [f64; VS_N_COEFFS],
}

impl Default for VsConfig {
    fn default() -> Self {
        Self {
            bandwidth: 200.0,
            z: 0.9,
            tau_zero: 0.0,
            num: [1.0, 0.0, 0.0, 0.0],
            den: [1.0, 0.0, 0.0, 0.0],
        }
    }
}

/// Discrete voltage source transfer function with `den[0] == 1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VsModel {
    num: [f64; VS_N_COEFFS],
    den: [f64; VS_N_COEFFS],
    gain: f64,
}

impl VsModel {
    /// Build the model for an iteration period of `iter_period` seconds.
    ///
    /// # Errors
    ///
    /// Returns [`RegError::InvalidVs`] when the bandwidth is at or above the
    /// Nyquist frequency, the damping is not positive, or the explicit
    /// model has a zero leading denominator or no steady state.
    pub fn new(config: &VsConfig, iter_period: f64) -> Result<Self, RegError> {
        let (num, den) = if config.bandwidth > 0.0 {
            bilinear(config, iter_period)?
        } else {
            (config.num, config.den)
        };

        if den[0] == 0.0 {
            return Err(RegError::InvalidVs("leading denominator coefficient is zero"));
        }
        let num = num.map(|c| c / den[0]);
        let den = den.map(|c| c / den[0]);

        let den_sum: f64 = den.iter().sum();
        if den_sum.abs() < f64::EPSILON {
            return Err(RegError::InvalidVs("denominator has a pole at z = 1"));
        }
        let gain = num.iter().sum::<f64>() / den_sum;
        if (gain - 1.0).abs() > VS_GAIN_TOLERANCE {
            info!(gain, "voltage source steady-state gain differs from 1");
        }

        Ok(Self { num, den, gain })
    }

    /// Numerator coefficients.
    pub fn num(&self) -> &[f64; VS_N_COEFFS] {
        &self.num
    }

    /// Denominator coefficients.
    pub fn den(&self) -> &[f64; VS_N_COEFFS] {
        &self.den
    }

    /// Steady-state gain.
    pub fn gain(&self) -> f64 {
        self.gain
    }
}

fn bilinear(
    config: &VsConfig,
    iter_period: f64,
) -> Result<([f64; VS_N_COEFFS], [f64; VS_N_COEFFS]), RegError> {
    if !(config.z > 0.0) {
        return Err(RegError::InvalidVs("damping must be positive"));
    }
    let w = TAU * config.bandwidth;
    let half_angle = 0.5 * w * iter_period;
    if half_angle >= 0.5 * std::f64::consts::PI {
        return Err(RegError::InvalidVs("bandwidth at or above the Nyquist frequency"));
    }

    let k = w / half_angle.tan();
    let k2 = k * k;
    let w2 = w * w;
    let damping = 2.0 * config.z * w * k;
    let zero = config.tau_zero * k;

    let den = [k2 + damping + w2, 2.0 * (w2 - k2), k2 - damping + w2, 0.0];
    let num = [w2 * (1.0 + zero), 2.0 * w2, w2 * (1.0 - zero), 0.0];
    Ok((num, den))
}

/// Running voltage source simulation.
///
/// # RT Safety
///
/// - No heap allocations
/// - O(1) time complexity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VsSim {
    model: VsModel,
    input: [f64; VS_N_COEFFS],
    output: [f64; VS_N_COEFFS],
}

impl VsSim {
    /// Simulation at rest.
    pub fn new(model: VsModel) -> Self {
        Self {
            model,
            input: [0.0; VS_N_COEFFS],
            output: [0.0; VS_N_COEFFS],
        }
    }

    /// Model.
    pub fn model(&self) -> &VsModel {
        &self.model
    }

    /// Set the history to the steady state producing `output`.
    pub fn init_steady(&mut self, output: f64) {
        let input = if self.model.gain == 0.0 { 0.0 } else { output / self.model.gain };
        self.input = [input; VS_N_COEFFS];
        self.output = [output; VS_N_COEFFS];
    }

    /// Advance one iteration with reference `reference`.
    #[inline]
    pub fn step(&mut self, reference: f64) -> f64 {
        self.input.copy_within(0..VS_N_COEFFS - 1, 1);
        self.output.copy_within(0..VS_N_COEFFS - 1, 1);
        self.input[0] = reference;

        let mut output = self.model.num[0] * self.input[0];
        for i in 1..VS_N_COEFFS {
            output += self.model.num[i] * self.input[i] - self.model.den[i] * self.output[i];
        }
        self.output[0] = output;
        output
    }

    /// Last output.
    pub fn output(&self) -> f64 {
        self.output[0]
    }
}
