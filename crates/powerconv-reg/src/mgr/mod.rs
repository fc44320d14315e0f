//! Regulation manager.
//!
//! [`RegMgr`] owns one [`MgrSignal`] for the field and one for the current,
//! the voltage limits, the loads, the simulation and the regulation mode.
//! It is driven by two contexts:
//!
//! - the real-time context calls [`RegMgr::measurement_intake`],
//!   [`RegMgr::regulate`] and [`RegMgr::simulate`] once per iteration
//! - the background context changes parameters and calls
//!   [`RegMgr::apply_changed_parameters`], which prepares RST parameters and
//!   publishes them through an [`RstPublisher`]
//!
//! The publisher is the only state shared between the two contexts. New RST
//! parameters are swapped in whole at the start of the next intake, so the
//! regulator never sees a half-updated coefficient set.
//!
//! # RT Safety
//!
//! - `measurement_intake()`, `regulate()`, `simulate()`: no heap
//!   allocations, no locks, no logging
//! - everything else: NOT RT-safe

mod mode;
mod regulate;
mod signal;
mod simulate;

pub use mode::REG_AVE_V_REF_LEN;
pub use regulate::RegulateOutcome;
pub use signal::{MgrSignal, REG_MEAS_EXTRAPOLATION_CAPACITY, REG_MEAS_FIR_CAPACITY, REG_MIN_ERR_REF_DELAY_PERIODS};

use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::sync::Arc;

use powerconv_atomic::{HandoffStats, ParamHandoff};
use powerconv_fg::{ArmContext, FgLimitsPolarity, FgRegistry};
use tracing::{debug, info, warn};

use crate::config::{Actuation, RegConfig, RegMode, RstSource, SignalKind};
use crate::error::RegError;
use crate::lim::{RefLimits, RmsLimits};
use crate::load::Load;
use crate::params::ParTable;
use crate::rst::{RstPars, RstStatus};
use crate::sim::Simulation;

/// Groups of parameters that changed since the last
/// [`RegMgr::apply_changed_parameters`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ChangeGroups(u8);

impl ChangeGroups {
    /// Nothing changed.
    pub const NONE: Self = Self(0);
    /// Load parameters or selection.
    pub const LOAD: Self = Self(1 << 0);
    /// Reference, voltage, error or RMS limits.
    pub const LIMITS: Self = Self(1 << 1);
    /// Measurement processing.
    pub const MEAS: Self = Self(1 << 2);
    /// RST parameters or regulation periods.
    pub const RST: Self = Self(1 << 3);
    /// Simulated measurement chains.
    pub const SIM: Self = Self(1 << 4);
    /// Voltage source model.
    pub const VS: Self = Self(1 << 5);
    /// Everything.
    pub const ALL: Self = Self(0b11_1111);

    /// Whether any group in `other` is set.
    #[inline]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Whether nothing is set.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Raw bits.
    pub const fn bits(self) -> u8 {
        self.0
    }
}

impl BitOr for ChangeGroups {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ChangeGroups {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Raw measurements from the acquisition system.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasInput {
    /// Field measurement.
    pub field: f64,
    /// Circuit current measurement.
    pub current: f64,
    /// Circuit voltage measurement.
    pub voltage: f64,
    /// Whether the field measurement can be used.
    pub field_valid: bool,
    /// Whether the current measurement can be used.
    pub current_valid: bool,
}

impl Default for MeasInput {
    fn default() -> Self {
        Self {
            field: 0.0,
            current: 0.0,
            voltage: 0.0,
            field_valid: true,
            current_valid: true,
        }
    }
}

impl MeasInput {
    fn valid(&self, signal: SignalKind) -> bool {
        match signal {
            SignalKind::Field => self.field_valid,
            SignalKind::Current => self.current_valid,
        }
    }
}

/// What [`RegMgr::apply_changed_parameters`] did.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ApplyReport {
    /// Groups that were applied.
    pub groups: ChangeGroups,
    /// RST parameter sets published.
    pub rst_published: usize,
    /// Published sets with a low modulus margin.
    pub rst_warnings: usize,
}

type RstSlots = [[ParamHandoff<RstPars>; 2]; 2];

/// Background-side handle that publishes RST parameters to the real-time
/// context.
///
/// # Example
///
/// ```
/// use powerconv_reg::config::{RegConfig, RstSource, SignalKind};
/// use powerconv_reg::mgr::{RegMgr, prepare_rst};
///
/// let mut mgr = RegMgr::with_config(RegConfig::default())?;
/// let publisher = mgr.rst_publisher();
///
/// let mut config = *mgr.config();
/// config.current.rst[0].auxpole_hz = 8.0;
/// let pars = prepare_rst(&config, SignalKind::Current, RstSource::Operational)?;
///
/// publisher.publish(SignalKind::Current, RstSource::Operational, pars)?;
/// assert!(publisher.is_pending(SignalKind::Current, RstSource::Operational));
///
/// mgr.measurement_intake(RstSource::Operational, true, false);
/// assert_eq!(*mgr.signal(SignalKind::Current).rst(RstSource::Operational), pars);
/// # Ok::<(), powerconv_reg::RegError>(())
/// ```
#[derive(Clone)]
pub struct RstPublisher {
    slots: Arc<RstSlots>,
}

impl fmt::Debug for RstPublisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RstPublisher").field("slots", &*self.slots).finish()
    }
}

impl RstPublisher {
    fn new() -> Self {
        Self {
            slots: Arc::new(Default::default()),
        }
    }

    fn slot(&self, signal: SignalKind, source: RstSource) -> &ParamHandoff<RstPars> {
        &self.slots[signal.index()][source.index()]
    }

    /// Publish `pars` for `signal` and `source`.
    ///
    /// A set that has not been taken yet is superseded.
    ///
    /// # Errors
    ///
    /// Returns [`RegError::RegulatorFault`] for a set with
    /// [`RstStatus::Fault`], which is never published.
    pub fn publish(&self, signal: SignalKind, source: RstSource, pars: RstPars) -> Result<(), RegError> {
        if pars.status() == RstStatus::Fault {
            warn!(%signal, %source, jury = %pars.jury(), "unstable RST parameters not published");
            return Err(RegError::RegulatorFault {
                signal,
                rst_source: source,
                jury: pars.jury(),
            });
        }
        if self.slot(signal, source).offer(pars).is_some() {
            debug!(%signal, %source, "pending RST parameters superseded");
        }
        Ok(())
    }

    /// Whether a set is waiting for the real-time context.
    pub fn is_pending(&self, signal: SignalKind, source: RstSource) -> bool {
        self.slot(signal, source).is_pending()
    }

    /// Hand-off statistics.
    pub fn stats(&self, signal: SignalKind, source: RstSource) -> HandoffStats {
        self.slot(signal, source).stats()
    }

    #[inline]
    fn take_into(&self, signal: SignalKind, source: RstSource, active: &mut RstPars) -> bool {
        self.slot(signal, source).swap_into(active)
    }
}

/// Build the load used with `source`.
///
/// # Errors
///
/// Returns [`RegError::InvalidConfig`] for a load index out of range and
/// [`RegError::InvalidLoad`] for non-physical parameters.
pub fn select_load(config: &RegConfig, source: RstSource) -> Result<Load, RegError> {
    let index = config.load_index(source);
    let load = config
        .loads
        .get(index)
        .ok_or(RegError::InvalidConfig("load select out of range"))?;
    Load::new(load, index)
}

/// Prepare the RST parameters of `signal` and `source` from `config`.
///
/// # Errors
///
/// Returns the load or RST construction error.
pub fn prepare_rst(config: &RegConfig, signal: SignalKind, source: RstSource) -> Result<RstPars, RegError> {
    let load = select_load(config, source)?;
    let signal_config = config.signal(signal);
    let output_gain = match signal {
        SignalKind::Field => load.gauss_per_amp(),
        SignalKind::Current => 1.0,
    };
    RstPars::init(
        signal,
        &signal_config.rst[source.index()],
        &load,
        output_gain,
        config.iter_period(),
        signal_config.reg_period_iters,
    )
}

/// Voltage reference state.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub(crate) struct VoltageReg {
    pub(crate) limits: RefLimits,
    pub(crate) meas: f64,
}

/// Regulation manager for one circuit.
///
/// # Example
///
/// ```
/// use powerconv_reg::config::{RegMode, RstSource};
/// use powerconv_reg::mgr::RegMgr;
///
/// let mut mgr = RegMgr::init(1000, true, true, true)?;
/// mgr.simulate_init(RegMode::Current, 2.0)?;
///
/// for _ in 0..100 {
///     let mut reference = 2.0;
///     mgr.measurement_intake(RstSource::Operational, true, true);
///     mgr.regulate(&mut reference);
///     mgr.simulate(0.0);
/// }
/// let current = mgr.signal(powerconv_reg::config::SignalKind::Current);
/// assert!((current.meas().unfiltered - 2.0).abs() < 1e-3);
/// # Ok::<(), powerconv_reg::RegError>(())
/// ```
#[derive(Debug)]
pub struct RegMgr {
    config: RegConfig,
    iter_period: f64,
    changed: ChangeGroups,
    loads: [Load; 2],
    signals: [MgrSignal; 2],
    voltage: VoltageReg,
    rms: RmsLimits,
    mode: RegMode,
    rst_source: RstSource,
    iteration_counter: u32,
    input: MeasInput,
    sim: Simulation,
    v_ref: f64,
    i_ref: f64,
    publisher: RstPublisher,
    pars: ParTable,
}

impl RegMgr {
    /// Manager with default parameters and the given signals enabled.
    ///
    /// # Errors
    ///
    /// See [`RegMgr::with_config`].
    pub fn init(
        iter_period_us: u32,
        field_enabled: bool,
        current_enabled: bool,
        voltage_enabled: bool,
    ) -> Result<Self, RegError> {
        let mut config = RegConfig {
            iter_period_us,
            ..RegConfig::default()
        };
        config.field.enabled = field_enabled;
        config.current.enabled = current_enabled;
        config.voltage.enabled = voltage_enabled;
        Self::with_config(config)
    }

    /// Manager for `config`, with every parameter applied and the initial
    /// RST parameters active.
    ///
    /// # Errors
    ///
    /// Returns any configuration error, including
    /// [`RegError::RegulatorFault`] when an enabled signal has unstable RST
    /// parameters.
    pub fn with_config(config: RegConfig) -> Result<Self, RegError> {
        if config.iter_period_us == 0 {
            return Err(RegError::InvalidConfig("iteration period must be positive"));
        }
        let iter_period = config.iter_period();
        let loads = [
            select_load(&config, RstSource::Operational)?,
            select_load(&config, RstSource::Test)?,
        ];

        let mut mgr = Self {
            iter_period,
            changed: ChangeGroups::NONE,
            loads,
            signals: [
                MgrSignal::new(SignalKind::Field, &config.field, iter_period)?,
                MgrSignal::new(SignalKind::Current, &config.current, iter_period)?,
            ],
            voltage: VoltageReg {
                limits: RefLimits::new(&config.voltage.limits, false),
                meas: 0.0,
            },
            rms: RmsLimits::new(&config.rms, iter_period),
            mode: RegMode::None,
            rst_source: RstSource::Operational,
            iteration_counter: 0,
            input: MeasInput::default(),
            sim: Simulation::new(&config, loads[RstSource::Operational.index()])?,
            v_ref: 0.0,
            i_ref: 0.0,
            publisher: RstPublisher::new(),
            pars: ParTable::new(),
            config,
        };

        mgr.changed = ChangeGroups::RST;
        mgr.apply_changed_parameters()?;
        mgr.activate_pending_rst();

        info!(
            iter_period_us = mgr.config.iter_period_us,
            field = mgr.config.field.enabled,
            current = mgr.config.current.enabled,
            voltage = mgr.config.voltage.enabled,
            "regulation manager initialised"
        );
        Ok(mgr)
    }

    /// Current parameters.
    pub fn config(&self) -> &RegConfig {
        &self.config
    }

    /// Replace the parameters and mark `groups` as changed.
    ///
    /// Nothing takes effect until [`RegMgr::apply_changed_parameters`].
    pub fn set_config(&mut self, config: RegConfig, groups: ChangeGroups) {
        self.config = config;
        self.changed |= groups;
    }

    pub(crate) fn config_mut(&mut self, groups: ChangeGroups) -> &mut RegConfig {
        self.changed |= groups;
        &mut self.config
    }

    /// Groups waiting to be applied.
    pub fn changed(&self) -> ChangeGroups {
        self.changed
    }

    /// Apply every changed parameter group.
    ///
    /// Loads, limits, measurement processing and the simulation are applied
    /// directly. RST parameters are prepared and published; the real-time
    /// context activates them at its next intake. A set classified
    /// [`RstStatus::Fault`] is not published and the active one stays in
    /// force.
    ///
    /// # Errors
    ///
    /// Returns the first configuration error, or [`RegError::RegulatorFault`]
    /// after publishing every set that is not faulty.
    pub fn apply_changed_parameters(&mut self) -> Result<ApplyReport, RegError> {
        let groups = self.changed;
        self.changed = ChangeGroups::NONE;
        let mut report = ApplyReport {
            groups,
            ..ApplyReport::default()
        };
        if groups.is_empty() {
            return Ok(report);
        }

        if self.config.iter_period_us == 0 {
            return Err(RegError::InvalidConfig("iteration period must be positive"));
        }
        self.iter_period = self.config.iter_period();

        if groups.intersects(ChangeGroups::LOAD) {
            self.loads = [
                select_load(&self.config, RstSource::Operational)?,
                select_load(&self.config, RstSource::Test)?,
            ];
            self.sim.set_load(self.loads[RstSource::Operational.index()]);
        }

        if groups.intersects(ChangeGroups::LIMITS) {
            for signal in SignalKind::ALL {
                self.signals[signal.index()].set_limits(self.config.signal(signal));
            }
            self.voltage.limits = RefLimits::new(&self.config.voltage.limits, false);
            self.rms = RmsLimits::new(&self.config.rms, self.iter_period);
        }

        if groups.intersects(ChangeGroups::MEAS | ChangeGroups::LIMITS) {
            for signal in SignalKind::ALL {
                self.signals[signal.index()].configure_meas(self.config.signal(signal), self.iter_period)?;
            }
        }

        if groups.intersects(ChangeGroups::SIM | ChangeGroups::VS) {
            let i_mag = self.sim.load().magnet_current();
            self.sim = Simulation::new(&self.config, self.loads[RstSource::Operational.index()])?;
            self.sim.init_steady(i_mag);
        }

        let mut fault = None;
        if groups.intersects(ChangeGroups::RST | ChangeGroups::LOAD) {
            for signal in SignalKind::ALL {
                if !self.config.signal(signal).enabled {
                    continue;
                }
                for source in RstSource::ALL {
                    let pars = prepare_rst(&self.config, signal, source)?;
                    match self.publisher.publish(signal, source, pars) {
                        Ok(()) => {
                            report.rst_published += 1;
                            if pars.status() == RstStatus::Warning {
                                report.rst_warnings += 1;
                            }
                        }
                        Err(err) => {
                            fault.get_or_insert(err);
                        }
                    }
                }
            }
        }

        debug!(
            groups = groups.bits(),
            rst_published = report.rst_published,
            rst_warnings = report.rst_warnings,
            "parameters applied"
        );

        match fault {
            Some(err) => Err(err),
            None => Ok(report),
        }
    }

    /// Named parameters of this manager.
    pub fn par_table(&self) -> &ParTable {
        &self.pars
    }

    /// Handle for publishing RST parameters from another thread.
    pub fn rst_publisher(&self) -> RstPublisher {
        self.publisher.clone()
    }

    #[inline]
    fn activate_pending_rst(&mut self) {
        for signal in SignalKind::ALL {
            let state = &mut self.signals[signal.index()];
            for source in RstSource::ALL {
                self.publisher.take_into(signal, source, state.rst_mut(source));
            }
        }
    }

    /// Registry whose functions are checked against the limits of the
    /// current mode.
    ///
    /// Returns `None` in [`RegMode::None`].
    pub fn fg_registry(&self) -> Option<(FgRegistry, ArmContext)> {
        let (limits, inverted) = match self.mode {
            RegMode::None => return None,
            RegMode::Voltage => (self.voltage.limits, false),
            RegMode::Current | RegMode::Field => {
                let signal = self.mode.signal()?;
                let limits = *self.signals[signal.index()].limits();
                (limits, limits.inverted())
            }
        };
        let fg_limits = limits.fg_limits();
        let registry = FgRegistry::new().with_limits_source(move |_| Some(fg_limits));
        let polarity = if inverted { FgLimitsPolarity::Negative } else { FgLimitsPolarity::Normal };
        let ctx = ArmContext::from_initial_ref(self.reference()).with_polarity(polarity);
        Some((registry, ctx))
    }

    /// Regulation mode.
    pub fn mode(&self) -> RegMode {
        self.mode
    }

    /// RST source used by the last intake.
    pub fn rst_source(&self) -> RstSource {
        self.rst_source
    }

    /// State of `signal`.
    pub fn signal(&self, signal: SignalKind) -> &MgrSignal {
        &self.signals[signal.index()]
    }

    /// Load used with `source`.
    pub fn load(&self, source: RstSource) -> &Load {
        &self.loads[source.index()]
    }

    /// Voltage reference sent to the converter.
    pub fn v_ref(&self) -> f64 {
        self.v_ref
    }

    /// Current reference sent to a current-controlled converter.
    pub fn i_ref(&self) -> f64 {
        self.i_ref
    }

    /// Reference of the current mode after limits.
    pub fn reference(&self) -> f64 {
        match self.mode {
            RegMode::None => 0.0,
            RegMode::Voltage => self.v_ref,
            RegMode::Current | RegMode::Field => self
                .mode
                .signal()
                .map_or(0.0, |signal| self.signals[signal.index()].reference()),
        }
    }

    /// Voltage limiter.
    pub fn voltage_limits(&self) -> &RefLimits {
        &self.voltage.limits
    }

    /// Last voltage measurement.
    pub fn voltage_meas(&self) -> f64 {
        self.voltage.meas
    }

    /// RMS current limits.
    pub fn rms(&self) -> &RmsLimits {
        &self.rms
    }

    /// Iteration within the regulation period, zero on regulation
    /// iterations.
    pub fn iteration_index(&self) -> u32 {
        self.iteration_counter
    }

    /// Provide the measurements for the next intake.
    pub fn set_meas_input(&mut self, input: MeasInput) {
        self.input = input;
    }

    /// Simulation.
    pub fn simulation(&self) -> &Simulation {
        &self.sim
    }

    /// Actuation in force.
    pub fn actuation(&self) -> Actuation {
        self.config.actuation
    }

    fn period_iters(&self) -> u32 {
        self.mode.signal().map_or(1, |signal| {
            self.signals[signal.index()].rst(self.rst_source).period_iters()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load::REG_N_LOADS;

    #[test]
    fn test_change_groups() {
        let mut groups = ChangeGroups::NONE;
        assert!(groups.is_empty());
        groups |= ChangeGroups::LOAD | ChangeGroups::VS;
        assert!(groups.intersects(ChangeGroups::LOAD));
        assert!(!groups.intersects(ChangeGroups::RST | ChangeGroups::MEAS));
        assert!(ChangeGroups::ALL.intersects(ChangeGroups::SIM));
    }

    #[test]
    fn test_init_activates_rst() -> Result<(), RegError> {
        let mgr = RegMgr::init(1000, true, true, true)?;
        for signal in SignalKind::ALL {
            for source in RstSource::ALL {
                assert_eq!(mgr.signal(signal).rst(source).status(), RstStatus::Ok);
                assert!(!mgr.rst_publisher().is_pending(signal, source));
            }
        }
        Ok(())
    }

    #[test]
    fn test_disabled_signal_keeps_placeholder() -> Result<(), RegError> {
        let mgr = RegMgr::init(1000, false, true, true)?;
        let field = mgr.signal(SignalKind::Field).rst(RstSource::Operational);
        assert_eq!(field.status(), RstStatus::Fault);
        Ok(())
    }

    #[test]
    fn test_zero_period_rejected() {
        assert!(matches!(RegMgr::init(0, true, true, true), Err(RegError::InvalidConfig(_))));
    }

    #[test]
    fn test_bad_load_select_rejected() {
        let config = RegConfig {
            load_select: REG_N_LOADS,
            ..RegConfig::default()
        };
        assert!(matches!(RegMgr::with_config(config), Err(RegError::InvalidConfig(_))));
    }
}
