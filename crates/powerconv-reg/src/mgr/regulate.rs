//! Real-time measurement intake and regulation.

use crate::config::{Actuation, RegMode, RstSource, SignalKind};
use crate::lim::LimitFlags;

use super::RegMgr;

/// Result of one call to [`RegMgr::regulate`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RegulateOutcome {
    /// Whether a new actuation was computed this iteration.
    pub regulated: bool,
    /// Voltage or current reference sent to the converter.
    pub actuation: f64,
    /// Limiting applied to the reference.
    pub ref_flags: LimitFlags,
    /// Whether the actuation was clipped and the reference back-calculated.
    pub rate_limited: bool,
    /// Whether the period ran open loop.
    pub openloop: bool,
}

impl RegMgr {
    /// Take in this iteration's measurements.
    ///
    /// Activates pending RST parameters, substitutes invalid measurements,
    /// filters every signal and, when regulating, tracks the regulation
    /// error against the delayed reference. With `use_simulated` the values
    /// come from the simulation while the validity flags still come from
    /// [`RegMgr::set_meas_input`].
    ///
    /// Returns the iteration index within the regulation period; zero marks
    /// a regulation iteration.
    ///
    /// # RT Safety
    ///
    /// RT-safe: no heap allocations, bounded execution time.
    pub fn measurement_intake(&mut self, rst_source: RstSource, use_simulated: bool, max_error_tracking: bool) -> u32 {
        self.activate_pending_rst();
        self.rst_source = rst_source;

        let (field, current, voltage) = if use_simulated {
            let meas = self.sim.meas();
            (meas.field, meas.current, meas.voltage)
        } else {
            (self.input.field, self.input.current, self.input.voltage)
        };
        self.voltage.meas = voltage;

        let period_iters = self.period_iters();
        self.iteration_counter += 1;
        if self.iteration_counter >= period_iters {
            self.iteration_counter = 0;
        }
        let index = self.iteration_counter;
        let regulated = self.mode.signal();

        for (signal, raw) in [(SignalKind::Field, field), (SignalKind::Current, current)] {
            let valid = self.input.valid(signal) && raw.is_finite();
            let state = &mut self.signals[signal.index()];

            if regulated == Some(signal) {
                let (select, ref_delay) = state.err_ref_delay(rst_source);
                let elapsed = if index == 0 { period_iters } else { index };
                let age = ref_delay - f64::from(elapsed) / f64::from(period_iters);
                let delayed_ref = state.vars.reference.interpolate(state.vars.index(), age);

                state.intake(raw, valid, Some(delayed_ref), self.iter_period);
                state.track_error(delayed_ref, select, max_error_tracking);
            } else {
                state.intake(raw, valid, None, self.iter_period);
            }
        }

        let i_meas = self.signals[SignalKind::Current.index()].meas().unfiltered;
        self.rms.check(i_meas);

        index
    }

    /// Regulate with `reference`, replacing it with the reference actually
    /// applied after limits and back-calculation.
    ///
    /// Outside regulation iterations the last actuation is held.
    ///
    /// # RT Safety
    ///
    /// RT-safe: no heap allocations, bounded execution time.
    pub fn regulate(&mut self, reference: &mut f64) -> RegulateOutcome {
        match self.mode {
            RegMode::None => {
                self.v_ref = 0.0;
                self.i_ref = 0.0;
                RegulateOutcome::default()
            }
            RegMode::Voltage => {
                let (v_ref, ref_flags) = self.voltage.limits.apply(*reference, self.v_ref, self.iter_period);
                self.v_ref = v_ref;
                *reference = v_ref;
                RegulateOutcome {
                    regulated: true,
                    actuation: v_ref,
                    ref_flags,
                    ..RegulateOutcome::default()
                }
            }
            RegMode::Current | RegMode::Field => {
                let held = RegulateOutcome {
                    actuation: self.actuation_value(),
                    ..RegulateOutcome::default()
                };
                if self.iteration_counter != 0 {
                    return held;
                }
                let Some(signal) = self.mode.signal() else {
                    return held;
                };
                match self.config.actuation {
                    Actuation::CurrentRef => self.regulate_current_ref(signal, reference),
                    Actuation::VoltageRef => self.regulate_voltage_ref(signal, reference),
                }
            }
        }
    }

    fn actuation_value(&self) -> f64 {
        match self.config.actuation {
            Actuation::VoltageRef => self.v_ref,
            Actuation::CurrentRef => self.i_ref,
        }
    }

    /// The converter regulates the current; only the histories are kept.
    fn regulate_current_ref(&mut self, signal: SignalKind, reference: &mut f64) -> RegulateOutcome {
        let source = self.rst_source;
        let state = &mut self.signals[signal.index()];
        let period = state.rst(source).period();
        let meas = state.reg_meas();

        let (limited, ref_flags) = state.limits().apply(*reference, state.reference(), period);

        let vars = &mut state.vars;
        vars.advance();
        let index = vars.index();
        vars.meas.set(index, 0, meas);
        vars.reference.set(index, 0, limited);
        vars.openloop_ref.set(index, 0, limited);
        vars.act.set(index, 0, limited);

        state.set_regulation_flags(ref_flags, false, false);
        self.i_ref = limited;
        *reference = limited;

        RegulateOutcome {
            regulated: true,
            actuation: limited,
            ref_flags,
            ..RegulateOutcome::default()
        }
    }

    fn regulate_voltage_ref(&mut self, signal: SignalKind, reference: &mut f64) -> RegulateOutcome {
        let source = self.rst_source;
        let i_meas = self.signals[SignalKind::Current.index()].meas().unfiltered;
        let load = self.loads[source.index()];
        let v_limits = self.voltage.limits;
        let v_previous = self.v_ref;

        let state = &mut self.signals[signal.index()];
        let pars = *state.rst(source);
        let model = *pars.openloop();
        let meas = state.reg_meas();

        let (limited, ref_flags) = state.limits().apply(*reference, state.reference(), pars.period());
        let openloop = state.limits().below_closeloop(meas);

        state.vars.advance();
        let index = state.vars.index();
        state.vars.meas.set(index, 0, meas);
        state.vars.reference.set(index, 0, limited);
        let openloop_previous = state.vars.openloop_ref.get(index, 1);

        let act = if openloop {
            model.act(limited, openloop_previous)
        } else {
            pars.calc_act(&state.vars)
        };

        let saturating = signal == SignalKind::Current;
        let v_ref = if saturating { load.vref_sat(i_meas, act) } else { act };
        let (v_limited, v_flags) = v_limits.apply(v_ref, v_previous, pars.period());
        let rate_limited = v_flags.any();

        let applied_ref = if rate_limited {
            let act = if saturating { load.vref_sat_inverse(i_meas, v_limited) } else { v_limited };
            state.vars.act.set(index, 0, act);
            if openloop {
                model.reference(act, openloop_previous)
            } else {
                pars.calc_ref(&state.vars)
            }
        } else {
            state.vars.act.set(index, 0, act);
            limited
        };
        state.vars.reference.set(index, 0, applied_ref);

        let act = state.vars.act.get(index, 0);
        let openloop_ref = if openloop { applied_ref } else { model.previous(meas, act) };
        state.vars.openloop_ref.set(index, 0, openloop_ref);

        state.set_regulation_flags(ref_flags, openloop, rate_limited);
        self.v_ref = v_limited;
        *reference = applied_ref;

        RegulateOutcome {
            regulated: true,
            actuation: v_limited,
            ref_flags,
            rate_limited,
            openloop,
        }
    }
}
