//! Regulation mode transitions.

use tracing::info;

use crate::config::{Actuation, RegMode, SignalKind};
use crate::error::RegError;
use crate::rst::RstStatus;

use super::RegMgr;

/// Actuation samples averaged when handing over to voltage mode.
pub const REG_AVE_V_REF_LEN: usize = 4;

impl RegMgr {
    /// Change the regulation mode.
    ///
    /// - leaving CURRENT or FIELD resets that signal's reference histories
    ///   and error tracking
    /// - entering VOLTAGE starts from the average of the last actuations
    ///   of the signal that was regulated, with saturation compensation
    ///   when it was the current
    /// - entering CURRENT or FIELD restarts the RST histories from the
    ///   latest measurement and the voltage in force, so the first
    ///   regulation period is bumpless
    /// - entering NONE zeroes the references and both regulation errors
    ///
    /// # Errors
    ///
    /// Returns [`RegError::ModeDisabled`] for a disabled mode,
    /// [`RegError::UnsupportedMode`] when the actuation cannot regulate
    /// the mode and [`RegError::RegulatorFault`] when the active RST
    /// parameters of the signal are unstable.
    pub fn mode_set(&mut self, mode: RegMode) -> Result<(), RegError> {
        if mode == self.mode {
            return Ok(());
        }
        if !self.config.mode_enabled(mode) {
            return Err(RegError::ModeDisabled(mode));
        }
        let actuation = self.config.actuation;
        if actuation == Actuation::CurrentRef && !matches!(mode, RegMode::None | RegMode::Current) {
            return Err(RegError::UnsupportedMode { mode, actuation });
        }
        if let Some(signal) = mode.signal() {
            let pars = self.signals[signal.index()].rst(self.rst_source);
            if pars.status() == RstStatus::Fault {
                return Err(RegError::RegulatorFault {
                    signal,
                    rst_source: self.rst_source,
                    jury: pars.jury(),
                });
            }
        }

        let previous = self.mode;
        let source = self.rst_source;
        let load = self.loads[source.index()];
        let i_meas = self.signals[SignalKind::Current.index()].meas().unfiltered;

        if let Some(signal) = previous.signal() {
            let state = &mut self.signals[signal.index()];
            if mode == RegMode::Voltage {
                let act = state.vars.act.mean(state.vars.index(), REG_AVE_V_REF_LEN);
                self.v_ref = if signal == SignalKind::Current { load.vref_sat(i_meas, act) } else { act };
            }
            state.reset();
        }

        match mode {
            RegMode::None => {
                self.v_ref = 0.0;
                self.i_ref = 0.0;
                for state in &mut self.signals {
                    state.reset();
                }
            }
            RegMode::Voltage => {}
            RegMode::Current | RegMode::Field => {
                let signal = if mode == RegMode::Current { SignalKind::Current } else { SignalKind::Field };
                let state = &mut self.signals[signal.index()];
                let act = match actuation {
                    Actuation::CurrentRef => state.reg_meas(),
                    Actuation::VoltageRef if signal == SignalKind::Current => load.vref_sat_inverse(i_meas, self.v_ref),
                    Actuation::VoltageRef => self.v_ref,
                };
                state.init_regulation(source, act);
                self.i_ref = state.meas().unfiltered;
                self.iteration_counter = state.rst(source).period_iters().saturating_sub(1);
            }
        }

        info!(from = %previous, to = %mode, v_ref = self.v_ref, "regulation mode changed");
        self.mode = mode;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{Actuation, RegConfig, RegMode, RstSource, SignalKind};
    use crate::error::RegError;
    use crate::mgr::RegMgr;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_disabled_mode_rejected() -> Result<(), RegError> {
        let mut mgr = RegMgr::init(1000, false, true, true)?;
        assert_eq!(mgr.mode_set(RegMode::Field), Err(RegError::ModeDisabled(RegMode::Field)));
        assert_eq!(mgr.mode(), RegMode::None);
        Ok(())
    }

    #[test]
    fn test_current_ref_cannot_regulate_field() -> Result<(), RegError> {
        let config = RegConfig {
            actuation: Actuation::CurrentRef,
            ..RegConfig::default()
        };
        let mut mgr = RegMgr::with_config(config)?;
        assert!(matches!(mgr.mode_set(RegMode::Field), Err(RegError::UnsupportedMode { .. })));
        assert!(matches!(mgr.mode_set(RegMode::Voltage), Err(RegError::UnsupportedMode { .. })));
        mgr.mode_set(RegMode::Current)?;
        Ok(())
    }

    #[test]
    fn test_voltage_takes_over_average_actuation() -> Result<(), RegError> {
        let mut mgr = RegMgr::with_config(RegConfig::default())?;
        mgr.simulate_init(RegMode::Field, 100.0)?;
        let steady_v = mgr.v_ref();
        for _ in 0..20 {
            let mut reference = 100.0;
            mgr.measurement_intake(RstSource::Operational, true, true);
            mgr.regulate(&mut reference);
            mgr.simulate(0.0);
        }
        mgr.mode_set(RegMode::Voltage)?;
        assert_abs_diff_eq!(mgr.v_ref(), steady_v, epsilon = 1e-6);
        assert_eq!(mgr.signal(SignalKind::Field).reference(), 0.0);
        Ok(())
    }

    #[test]
    fn test_none_zeroes_references() -> Result<(), RegError> {
        let mut mgr = RegMgr::with_config(RegConfig::default())?;
        mgr.simulate_init(RegMode::Voltage, 5.0)?;
        assert!(mgr.v_ref() > 0.0);
        mgr.mode_set(RegMode::None)?;
        assert_eq!(mgr.v_ref(), 0.0);
        assert_eq!(mgr.signal(SignalKind::Current).err().max_abs_err(), 0.0);
        Ok(())
    }
}
