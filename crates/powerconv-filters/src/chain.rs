//! Simulated measurement chain.
//!
//! Turns a simulated signal into what an acquisition system would report:
//! delayed, with noise and tone added, then quantised.

use serde::{Deserialize, Serialize};

use crate::delay::DelayLine;
use crate::error::FilterError;
use crate::noise::{NoiseAndTone, quantise};
use crate::state::FilterState;

/// Parameters of a simulated measurement chain.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MeasChainConfig {
    /// Acquisition delay in iterations.
    pub delay_iters: f64,
    /// Peak-to-peak uniform noise.
    pub noise_pp: f64,
    /// Square tone amplitude.
    pub tone_amp: f64,
    /// Tone half period in iterations, zero to disable.
    pub tone_half_period_iters: u32,
    /// ADC resolution, zero for none.
    pub quantisation: f64,
}

/// Delay, noise and quantisation applied to a simulated signal.
#[derive(Debug, Clone)]
pub struct SimMeasChain {
    delay: DelayLine,
    noise: NoiseAndTone,
    quantisation: f64,
}

impl SimMeasChain {
    /// Build the chain. `seed` makes the noise reproducible.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::InvalidDelay`] for an unsupported delay.
    pub fn new(config: &MeasChainConfig, seed: u64) -> Result<Self, FilterError> {
        Ok(Self {
            delay: DelayLine::new(config.delay_iters, false)?,
            noise: NoiseAndTone::new(
                config.noise_pp,
                config.tone_amp,
                config.tone_half_period_iters,
                seed,
            ),
            quantisation: config.quantisation,
        })
    }

    /// Delay of the chain in iterations.
    pub fn delay_iters(&self) -> f64 {
        self.delay.delay_iters()
    }

    /// Measurement for the current value of the simulated signal.
    #[inline]
    pub fn measure(&mut self, signal: f64) -> f64 {
        let delayed = self.delay.signal(signal);
        quantise(delayed + self.noise.next_sample(), self.quantisation)
    }
}

impl FilterState for SimMeasChain {
    fn init_history(&mut self, value: f64) {
        self.delay.init_history(value);
    }
}
