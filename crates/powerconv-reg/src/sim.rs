//! Closed-loop simulation of the voltage source, the magnet load and the
//! acquisition chains.
//!
//! # RT Safety
//!
//! - [`Simulation::step`]: no heap allocations, O(1) time complexity
//! - construction: NOT RT-safe

use powerconv_filters::{FilterState, SimMeasChain};

use crate::config::{Actuation, RegConfig};
use crate::error::RegError;
use crate::load::Load;
use crate::vs::{VsModel, VsSim};

/// Simulated measurements of one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SimMeas {
    /// Field measurement.
    pub field: f64,
    /// Circuit current measurement.
    pub current: f64,
    /// Circuit voltage measurement.
    pub voltage: f64,
}

/// Magnet load integrated one iteration at a time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadSim {
    load: Load,
    iter_period: f64,
    i_mag: f64,
    i_circuit: f64,
    voltage: f64,
}

impl LoadSim {
    /// Load at rest.
    pub fn new(load: Load, iter_period: f64) -> Self {
        Self {
            load,
            iter_period,
            i_mag: 0.0,
            i_circuit: 0.0,
            voltage: 0.0,
        }
    }

    /// Load model.
    pub fn load(&self) -> &Load {
        &self.load
    }

    /// Replace the load model, keeping the state.
    pub fn set_load(&mut self, load: Load) {
        self.load = load;
    }

    /// Steady state with magnet current `i_mag`.
    pub fn init_steady(&mut self, i_mag: f64) {
        self.i_mag = i_mag;
        self.voltage = self.load.steady_voltage(i_mag);
        self.i_circuit = self.load.circuit_current(i_mag, self.voltage);
    }

    /// Advance with circuit voltage `voltage`.
    ///
    /// The inductance for the step is taken at the previous magnet current.
    #[inline]
    pub fn step_voltage(&mut self, voltage: f64) {
        let tc = self.load.henrys_at(self.i_mag) / self.load.ohms();
        let decay = (-self.iter_period / tc).exp();
        self.i_mag = decay * self.i_mag + (1.0 - decay) * self.load.gain() * voltage;
        self.i_circuit = self.load.circuit_current(self.i_mag, voltage);
        self.voltage = voltage;
    }

    /// Advance with an imposed magnet current and derive the circuit voltage.
    #[inline]
    pub fn step_current(&mut self, i_mag: f64) {
        let di_dt = (i_mag - self.i_mag) / self.iter_period;
        let v_mag = self.load.henrys_at(self.i_mag) * di_dt + self.load.ohms() * i_mag;
        self.voltage = v_mag / self.load.k_v();
        self.i_mag = i_mag;
        self.i_circuit = self.load.circuit_current(i_mag, self.voltage);
    }

    /// Magnet current.
    pub fn magnet_current(&self) -> f64 {
        self.i_mag
    }

    /// Circuit current.
    pub fn circuit_current(&self) -> f64 {
        self.i_circuit
    }

    /// Circuit voltage.
    pub fn voltage(&self) -> f64 {
        self.voltage
    }

    /// Field.
    pub fn field(&self) -> f64 {
        self.i_mag * self.load.gauss_per_amp()
    }
}

/// Voltage source, load and measurement chains.
#[derive(Debug, Clone)]
pub struct Simulation {
    actuation: Actuation,
    vs: VsSim,
    load: LoadSim,
    chains: [SimMeasChain; 3],
    meas: SimMeas,
}

impl Simulation {
    /// Build the simulation for `config` on `load`.
    ///
    /// # Errors
    ///
    /// Returns [`RegError::InvalidVs`] for an unusable source model and
    /// [`RegError::Filter`] for an unsupported chain delay.
    pub fn new(config: &RegConfig, load: Load) -> Result<Self, RegError> {
        let iter_period = config.iter_period();
        let sim = &config.sim;
        Ok(Self {
            actuation: config.actuation,
            vs: VsSim::new(VsModel::new(&config.vs, iter_period)?),
            load: LoadSim::new(load, iter_period),
            chains: [
                SimMeasChain::new(&sim.field, sim.seed)?,
                SimMeasChain::new(&sim.current, sim.seed.wrapping_add(1))?,
                SimMeasChain::new(&sim.voltage, sim.seed.wrapping_add(2))?,
            ],
            meas: SimMeas::default(),
        })
    }

    /// Replace the load model.
    pub fn set_load(&mut self, load: Load) {
        self.load.set_load(load);
    }

    /// Load state.
    pub fn load(&self) -> &LoadSim {
        &self.load
    }

    /// Voltage source state.
    pub fn vs(&self) -> &VsSim {
        &self.vs
    }

    /// Put every model into the steady state with magnet current `i_mag`.
    pub fn init_steady(&mut self, i_mag: f64) {
        self.load.init_steady(i_mag);
        let source_output = match self.actuation {
            Actuation::VoltageRef => self.load.voltage(),
            Actuation::CurrentRef => i_mag,
        };
        self.vs.init_steady(source_output);

        self.meas = SimMeas {
            field: self.load.field(),
            current: self.load.circuit_current(),
            voltage: self.load.voltage(),
        };
        self.chains[0].init_history(self.meas.field);
        self.chains[1].init_history(self.meas.current);
        self.chains[2].init_history(self.meas.voltage);
    }

    /// Advance one iteration.
    ///
    /// `reference` is the voltage or current reference given to the source,
    /// depending on the actuation, and `perturbation` is added to the
    /// circuit voltage.
    #[inline]
    pub fn step(&mut self, reference: f64, perturbation: f64) -> SimMeas {
        let output = self.vs.step(reference);
        match self.actuation {
            Actuation::VoltageRef => self.load.step_voltage(output + perturbation),
            Actuation::CurrentRef => self.load.step_current(output),
        }

        let voltage = match self.actuation {
            Actuation::VoltageRef => self.load.voltage(),
            Actuation::CurrentRef => self.load.voltage() + perturbation,
        };
        self.meas = SimMeas {
            field: self.chains[0].measure(self.load.field()),
            current: self.chains[1].measure(self.load.circuit_current()),
            voltage: self.chains[2].measure(voltage),
        };
        self.meas
    }

    /// Measurements of the last iteration.
    pub fn meas(&self) -> SimMeas {
        self.meas
    }
}
