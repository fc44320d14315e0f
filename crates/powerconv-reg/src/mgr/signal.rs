//! Per-signal regulation state.

use powerconv_atomic::RegCounters;
use powerconv_filters::{FilterState, MeasFilter, MeasRate, MeasSelect, MeasValues};

use crate::config::{RstSource, SignalConfig, SignalKind};
use crate::err::RegErrTracker;
use crate::error::RegError;
use crate::lim::{LimitFlags, MeasFlags, MeasLimits, RefLimits};
use crate::rst::{RstPars, RstVars};

/// Shortest reference delay, in regulation periods, for which the
/// unfiltered measurement can be compared with the reference history.
pub const REG_MIN_ERR_REF_DELAY_PERIODS: f64 = 1.0;

/// FIR buffer capacity shared by both filter stages.
pub const REG_MEAS_FIR_CAPACITY: usize = 256;

/// Extrapolation buffer capacity.
pub const REG_MEAS_EXTRAPOLATION_CAPACITY: usize = 64;

/// Measurement, limits, RST parameters and histories of one signal.
#[derive(Debug)]
pub struct MgrSignal {
    kind: SignalKind,
    enabled: bool,
    filter: MeasFilter,
    rate: MeasRate,
    reg_select: MeasSelect,
    meas: MeasValues,
    meas_rate: f64,
    meas_valid: bool,
    meas_flags: MeasFlags,
    lim_ref: RefLimits,
    lim_meas: MeasLimits,
    ref_flags: LimitFlags,
    err: RegErrTracker,
    err_select: MeasSelect,
    ref_delayed: f64,
    rst: [RstPars; 2],
    pub(crate) vars: RstVars,
    openloop: bool,
    rate_limited: bool,
    counters: RegCounters,
}

impl MgrSignal {
    pub(crate) fn new(kind: SignalKind, config: &SignalConfig, iter_period: f64) -> Result<Self, RegError> {
        let mut signal = Self {
            kind,
            enabled: config.enabled,
            filter: MeasFilter::new(REG_MEAS_FIR_CAPACITY, REG_MEAS_EXTRAPOLATION_CAPACITY),
            rate: MeasRate::new(iter_period, config.meas.rate_period_iters)?,
            reg_select: config.meas.reg_select,
            meas: MeasValues::default(),
            meas_rate: 0.0,
            meas_valid: true,
            meas_flags: MeasFlags::default(),
            lim_ref: RefLimits::default(),
            lim_meas: MeasLimits::default(),
            ref_flags: LimitFlags::default(),
            err: RegErrTracker::new(&config.err),
            err_select: MeasSelect::Filtered,
            ref_delayed: 0.0,
            rst: [RstPars::default(); 2],
            vars: RstVars::default(),
            openloop: false,
            rate_limited: false,
            counters: RegCounters::new(),
        };
        signal.set_limits(config);
        signal.configure_meas(config, iter_period)?;
        Ok(signal)
    }

    pub(crate) fn set_limits(&mut self, config: &SignalConfig) {
        self.enabled = config.enabled;
        self.lim_ref = RefLimits::new(&config.limits, config.invert_limits);
        let (low, high) = self.lim_ref.bounds();
        self.lim_meas = MeasLimits::new(high, low, &config.meas.limits);
        self.err.set_limits(&config.err);
    }

    pub(crate) fn configure_meas(&mut self, config: &SignalConfig, iter_period: f64) -> Result<(), RegError> {
        let (low, high) = self.lim_ref.bounds();
        let meas = &config.meas;
        self.filter
            .init(meas.fir_lengths, meas.extrapolation_len, high, low, meas.delay_iters)?;
        self.rate = MeasRate::new(iter_period, meas.rate_period_iters)?;
        self.rate.init_history(self.meas.unfiltered);
        self.reg_select = meas.reg_select;
        Ok(())
    }

    /// Restart the measurement processing from a steady `value`.
    pub(crate) fn init_meas_history(&mut self, value: f64) {
        self.filter.init_history(value);
        self.rate.init_history(value);
        self.meas = MeasValues::splat(value);
        self.meas_rate = 0.0;
        self.lim_meas.check(value);
    }

    /// Forget the reference histories and errors.
    pub(crate) fn reset(&mut self) {
        self.err.reset();
        self.vars.reset_refs();
        self.ref_delayed = 0.0;
        self.openloop = false;
        self.rate_limited = false;
        self.ref_flags = LimitFlags::default();
    }

    /// Start regulating from the latest measurement with actuation `act`.
    pub(crate) fn init_regulation(&mut self, source: RstSource, act: f64) {
        let meas = self.reg_meas();
        let pars = self.rst[source.index()];
        self.vars.init_history(meas, act, pars.openloop());
        self.err.reset();
        self.ref_delayed = meas;
        self.openloop = self.lim_ref.below_closeloop(meas);
    }

    /// Measurement used for regulation error, and its reference delay in
    /// periods.
    #[inline]
    pub(crate) fn err_ref_delay(&self, source: RstSource) -> (MeasSelect, f64) {
        let pars = &self.rst[source.index()];
        let period_iters = f64::from(pars.period_iters());
        let reg_delay = self.filter.delay_iters(self.reg_select);
        let delay = |select| pars.track_delay_periods() + (self.filter.delay_iters(select) - reg_delay) / period_iters;

        let unfiltered = delay(MeasSelect::Unfiltered);
        if unfiltered >= REG_MIN_ERR_REF_DELAY_PERIODS {
            (MeasSelect::Unfiltered, unfiltered)
        } else {
            (MeasSelect::Filtered, delay(MeasSelect::Filtered))
        }
    }

    /// Process one raw measurement.
    ///
    /// When regulating, `delayed_ref` is the reference the measurement is
    /// expected to follow and is used to substitute an invalid measurement.
    #[inline]
    pub(crate) fn intake(&mut self, raw: f64, valid: bool, delayed_ref: Option<f64>, iter_period: f64) {
        self.counters.inc_iteration();
        self.counters.record_meas(valid);
        self.meas_valid = valid;

        let unfiltered = if valid {
            raw
        } else {
            match delayed_ref {
                Some(reference) => reference - self.err.err(),
                None => self.meas.unfiltered + self.meas_rate * iter_period,
            }
        };

        self.meas = self.filter.filter(unfiltered);
        self.meas_rate = self.rate.update(self.meas.filtered);
        self.meas_flags = self.lim_meas.check(unfiltered);
    }

    /// Compare the measurement with the delayed reference.
    #[inline]
    pub(crate) fn track_error(&mut self, delayed_ref: f64, select: MeasSelect, track_max: bool) {
        self.ref_delayed = delayed_ref;
        self.err_select = select;
        self.err.check(delayed_ref - self.meas.select(select), track_max);
    }

    pub(crate) fn rst_mut(&mut self, source: RstSource) -> &mut RstPars {
        &mut self.rst[source.index()]
    }

    pub(crate) fn set_regulation_flags(&mut self, ref_flags: LimitFlags, openloop: bool, rate_limited: bool) {
        self.ref_flags = ref_flags;
        self.openloop = openloop;
        self.rate_limited = rate_limited;
        self.counters.inc_reg_iteration();
        self.counters.record_ref_limited(ref_flags.clip, ref_flags.rate);
    }

    /// Signal.
    pub fn kind(&self) -> SignalKind {
        self.kind
    }

    /// Whether the signal can be regulated.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Latest measurement values.
    pub fn meas(&self) -> MeasValues {
        self.meas
    }

    /// Measurement fed to the regulator.
    #[inline]
    pub fn reg_meas(&self) -> f64 {
        self.meas.select(self.reg_select)
    }

    /// Which measurement is fed to the regulator.
    pub fn reg_select(&self) -> MeasSelect {
        self.reg_select
    }

    /// Estimated rate of change.
    pub fn meas_rate(&self) -> f64 {
        self.meas_rate
    }

    /// Whether the latest raw measurement was valid.
    pub fn meas_valid(&self) -> bool {
        self.meas_valid
    }

    /// Measurement limit flags.
    pub fn meas_flags(&self) -> MeasFlags {
        self.meas_flags
    }

    /// Measurement filter.
    pub fn filter(&self) -> &MeasFilter {
        &self.filter
    }

    /// Reference limiter.
    pub fn limits(&self) -> &RefLimits {
        &self.lim_ref
    }

    /// Limiting applied to the latest reference.
    pub fn ref_flags(&self) -> LimitFlags {
        self.ref_flags
    }

    /// Regulation error tracker.
    pub fn err(&self) -> &RegErrTracker {
        &self.err
    }

    /// Measurement compared with the delayed reference.
    pub fn err_select(&self) -> MeasSelect {
        self.err_select
    }

    /// Reference delayed to line up with the measurement.
    pub fn ref_delayed(&self) -> f64 {
        self.ref_delayed
    }

    /// Active RST parameters for `source`.
    pub fn rst(&self, source: RstSource) -> &RstPars {
        &self.rst[source.index()]
    }

    /// RST histories.
    pub fn vars(&self) -> &RstVars {
        &self.vars
    }

    /// Latest reference after limits and back-calculation.
    pub fn reference(&self) -> f64 {
        self.vars.reference.get(self.vars.index(), 0)
    }

    /// Whether the latest period ran open loop.
    pub fn openloop(&self) -> bool {
        self.openloop
    }

    /// Whether the actuation was limited in the latest period.
    pub fn rate_limited(&self) -> bool {
        self.rate_limited
    }

    /// Measurement and reference limiting counters.
    pub fn counters(&self) -> &RegCounters {
        &self.counters
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MeasConfig;
    use approx::assert_abs_diff_eq;

    fn signal(meas: MeasConfig) -> Result<MgrSignal, RegError> {
        let config = SignalConfig {
            meas,
            ..SignalConfig::default_current()
        };
        MgrSignal::new(SignalKind::Current, &config, 0.001)
    }

    #[test]
    fn test_invalid_meas_extrapolated_with_rate() -> Result<(), RegError> {
        let mut s = signal(MeasConfig::default())?;
        for i in 0..10 {
            s.intake(f64::from(i) * 0.1, true, None, 0.001);
        }
        let before = s.meas().unfiltered;
        s.intake(f64::NAN, false, None, 0.001);
        assert_abs_diff_eq!(s.meas().unfiltered, before + 0.1, epsilon = 1e-9);
        assert!(!s.meas_valid());
        assert_eq!(s.counters().snapshot().invalid_meas, 1);
        Ok(())
    }

    #[test]
    fn test_invalid_meas_follows_reference_when_regulating() -> Result<(), RegError> {
        let mut s = signal(MeasConfig::default())?;
        s.intake(1.0, true, Some(1.0), 0.001);
        s.track_error(1.2, MeasSelect::Unfiltered, true);
        s.intake(f64::NAN, false, Some(1.5), 0.001);
        assert_abs_diff_eq!(s.meas().unfiltered, 1.3, epsilon = 1e-12);
        Ok(())
    }

    #[test]
    fn test_err_select_prefers_unfiltered_with_enough_delay() -> Result<(), RegError> {
        let mut s = signal(MeasConfig {
            fir_lengths: [9, 0],
            ..MeasConfig::default()
        })?;
        // Placeholder parameters report one period of track delay
        let (select, delay) = s.err_ref_delay(RstSource::Operational);
        assert_eq!(select, MeasSelect::Filtered);
        assert_abs_diff_eq!(delay, 1.0, epsilon = 1e-12);

        s.reg_select = MeasSelect::Unfiltered;
        let (select, delay) = s.err_ref_delay(RstSource::Operational);
        assert_eq!(select, MeasSelect::Unfiltered);
        assert_abs_diff_eq!(delay, 1.0, epsilon = 1e-12);
        Ok(())
    }
}
