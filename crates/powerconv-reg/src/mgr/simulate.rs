//! Simulation driven by the manager's actuation.

use tracing::debug;

use crate::config::{Actuation, RegMode, RstSource, SignalKind};
use crate::error::RegError;
use crate::sim::SimMeas;

use super::{MeasInput, RegMgr};

impl RegMgr {
    /// Put the simulation in the steady state where the signal regulated in
    /// `mode` equals `initial_meas`, then enter `mode`.
    ///
    /// For [`RegMode::Voltage`] `initial_meas` is the circuit voltage and
    /// for [`RegMode::None`] the circuit starts at rest.
    ///
    /// # Errors
    ///
    /// See [`RegMgr::mode_set`].
    pub fn simulate_init(&mut self, mode: RegMode, initial_meas: f64) -> Result<(), RegError> {
        let load = self.loads[RstSource::Operational.index()];
        let i_mag = match mode {
            RegMode::None => 0.0,
            RegMode::Voltage => load.gain() * initial_meas,
            RegMode::Current => initial_meas,
            RegMode::Field => initial_meas / load.gauss_per_amp(),
        };

        self.sim.init_steady(i_mag);
        let meas = self.sim.meas();
        self.signals[SignalKind::Field.index()].init_meas_history(meas.field);
        self.signals[SignalKind::Current.index()].init_meas_history(meas.current);
        self.rms.init_history(meas.current);
        for state in &mut self.signals {
            state.reset();
        }

        self.input = MeasInput {
            field: meas.field,
            current: meas.current,
            voltage: meas.voltage,
            ..MeasInput::default()
        };
        self.voltage.meas = meas.voltage;
        self.mode = RegMode::None;
        self.v_ref = match self.config.actuation {
            Actuation::VoltageRef => meas.voltage,
            Actuation::CurrentRef => 0.0,
        };
        self.i_ref = meas.current;

        debug!(%mode, initial_meas, i_mag, "simulation initialised");
        self.mode_set(mode)
    }

    /// Advance the simulation by one iteration with the current actuation
    /// and a voltage `perturbation`.
    ///
    /// # RT Safety
    ///
    /// RT-safe: no heap allocations, bounded execution time.
    pub fn simulate(&mut self, perturbation: f64) -> SimMeas {
        let reference = match self.config.actuation {
            Actuation::VoltageRef => self.v_ref,
            Actuation::CurrentRef => self.i_ref,
        };
        self.sim.step(reference, perturbation)
    }
}
