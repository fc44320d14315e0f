//! Closed-loop run of the regulation manager against its simulated load

use std::path::Path;

use powerconv_fg::{ArmedFunction, FgConfigSet, FgPhase};
use powerconv_reg::{RegConfig, RegMgr, RegMode, RstSource, RstStatus};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::SimError;

/// Run description loaded from YAML.
///
/// Every field is optional; missing ones take the defaults below and the
/// regulation parameters are completed from [`RegConfig::default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Mode entered by `simulate_init`.
    pub mode: RegMode,
    /// Initial measurement of the regulated signal, or voltage in VOLTAGE.
    pub initial: f64,
    /// Iterations to simulate.
    pub iterations: u32,
    /// Parameter set used for regulation.
    pub rst_source: RstSource,
    /// Function played as the reference, by registry name.
    pub function: Option<String>,
    /// Reference held when no function is played; defaults to the reference
    /// left by `simulate_init`.
    pub reference: Option<f64>,
    /// Regulation manager parameters.
    pub reg: RegConfig,
    /// Function generator parameters.
    pub functions: FgConfigSet,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            mode: RegMode::Current,
            initial: 0.0,
            iterations: 10_000,
            rst_source: RstSource::Operational,
            function: None,
            reference: None,
            reg: RegConfig::default(),
            functions: FgConfigSet::default(),
        }
    }
}

impl RunConfig {
    /// Load a run description from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Io`] when the file cannot be read and
    /// [`SimError::Config`] when it does not parse.
    pub fn load(path: &Path) -> Result<Self, SimError> {
        let text = std::fs::read_to_string(path).map_err(|source| SimError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&text).map_err(|source| SimError::Config {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Outcome of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub mode: RegMode,
    pub function: Option<String>,
    pub iterations: u32,
    pub function_end: Option<f64>,
    pub function_finished: bool,
    pub final_ref: f64,
    pub final_meas: f64,
    pub max_abs_err: f64,
    pub err_fault: bool,
    pub limited_iterations: u32,
    pub rst_status: Option<RstStatus>,
    pub invalid_meas: u64,
}

/// Run the manager in closed loop with its own simulation.
///
/// Each iteration performs measurement intake, samples the function on
/// regulation iterations, regulates and advances the simulation.
///
/// # Errors
///
/// Returns [`SimError::Reg`] when the manager rejects the parameters or the
/// mode, [`SimError::NoFunctionInMode`] when a function is requested in
/// NONE and [`SimError::Function`] when the function fails its checks.
pub fn run(config: &RunConfig) -> Result<Summary, SimError> {
    if config.iterations == 0 {
        return Err(SimError::NoIterations);
    }

    let mut mgr = RegMgr::with_config(config.reg)?;
    mgr.simulate_init(config.mode, config.initial)?;

    let mut function = config
        .function
        .as_deref()
        .map(|name| arm(&mgr, name, &config.functions))
        .transpose()?;

    let period = mgr.config().iter_period();
    let mut reference = config.reference.unwrap_or_else(|| mgr.reference());
    let mut phase = None;
    let mut limited_iterations = 0;

    for k in 0..config.iterations {
        let time = f64::from(k) * period;
        let index = mgr.measurement_intake(config.rst_source, true, true);

        if let Some(function) = function.as_mut().filter(|_| index == 0) {
            let (next_phase, value) = function.generate_with_feedback(time, reference);
            if phase != Some(next_phase) {
                debug!(time, ?next_phase, "function phase");
            }
            phase = Some(next_phase);
            reference = value;
        }

        let outcome = mgr.regulate(&mut reference);
        if outcome.ref_flags.any() || outcome.rate_limited {
            limited_iterations += 1;
        }
        mgr.simulate(0.0);
    }

    let summary = summarize(&mgr, config, function.as_ref(), phase, limited_iterations);
    if summary.err_fault {
        warn!(max_abs_err = summary.max_abs_err, "regulation error exceeded the fault limit");
    }
    info!(
        iterations = summary.iterations,
        final_ref = summary.final_ref,
        final_meas = summary.final_meas,
        "run complete"
    );
    Ok(summary)
}

fn arm(mgr: &RegMgr, name: &str, set: &FgConfigSet) -> Result<ArmedFunction, SimError> {
    let (registry, ctx) = mgr.fg_registry().ok_or(SimError::NoFunctionInMode(mgr.mode()))?;
    let function = registry.arm_by_name(name, set, &ctx)?;
    info!(
        function = %function.kind(),
        start = function.meta().time.start,
        end = function.meta().time.end,
        "function armed"
    );
    Ok(function)
}

fn summarize(
    mgr: &RegMgr,
    config: &RunConfig,
    function: Option<&ArmedFunction>,
    phase: Option<FgPhase>,
    limited_iterations: u32,
) -> Summary {
    let signal = mgr.mode().signal().map(|kind| mgr.signal(kind));
    let final_meas = signal.map_or_else(|| mgr.voltage_meas(), |s| s.meas().unfiltered);

    Summary {
        mode: mgr.mode(),
        function: function.map(|f| f.kind().to_string()),
        iterations: config.iterations,
        function_end: function.map(|f| f.meta().time.end),
        function_finished: phase == Some(FgPhase::Post),
        final_ref: mgr.reference(),
        final_meas,
        max_abs_err: signal.map_or(0.0, |s| s.err().max_abs_err()),
        err_fault: signal.is_some_and(|s| s.err().flags().fault),
        limited_iterations,
        rst_status: signal.map(|s| s.rst(config.rst_source).status()),
        invalid_meas: signal.map_or(0, |s| s.counters().snapshot().invalid_meas),
    }
}
