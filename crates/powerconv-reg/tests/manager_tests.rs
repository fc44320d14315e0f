//! End-to-end tests of the regulation manager in closed-loop simulation.

use std::thread;

use approx::assert_abs_diff_eq;
use powerconv_fg::{FgConfigSet, FgPhase};
use powerconv_reg::config::{Actuation, RegConfig, RegMode, RstSource, SignalKind};
use powerconv_reg::mgr::{MeasInput, RegMgr, prepare_rst};
use powerconv_reg::params::ParValue;
use powerconv_reg::rst::{REG_N_RST_COEFFS, RstStatus};
use powerconv_reg::RegError;

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn run(mgr: &mut RegMgr, iterations: usize, reference: f64) {
    for _ in 0..iterations {
        let mut reference = reference;
        mgr.measurement_intake(RstSource::Operational, true, true);
        mgr.regulate(&mut reference);
        mgr.simulate(0.0);
    }
}

#[test]
fn test_field_regulation_rides_through_invalid_measurements() -> TestResult {
    let mut config = RegConfig::default();
    config.field.limits.rate = 200.0;
    let max_step = config.field.limits.rate * config.iter_period();
    let mut mgr = RegMgr::with_config(config)?;
    mgr.simulate_init(RegMode::Field, 0.0)?;

    let mut previous = mgr.reference();
    for k in 0..1500 {
        mgr.set_meas_input(MeasInput {
            field_valid: !(200..205).contains(&k),
            ..MeasInput::default()
        });
        mgr.measurement_intake(RstSource::Operational, true, true);

        let mut reference = if k >= 10 { 100.0 } else { 0.0 };
        let outcome = mgr.regulate(&mut reference);
        assert!(outcome.regulated);
        assert!((reference - previous).abs() <= max_step + 1e-9, "step at {k}");
        previous = reference;

        let field = mgr.signal(SignalKind::Field);
        assert!(!field.err().flags().fault, "error fault at {k}");
        mgr.simulate(0.0);
    }

    let field = mgr.signal(SignalKind::Field);
    assert_abs_diff_eq!(field.meas().unfiltered, 100.0, epsilon = 1e-3);
    assert!(field.err().max_abs_err() < 1.0);
    let counters = field.counters().snapshot();
    assert_eq!(counters.invalid_meas, 5);
    assert_eq!(counters.max_consecutive_invalid_meas, 5);
    assert!(counters.ref_rate_limited > 0);
    Ok(())
}

#[test]
fn test_rst_handoff_from_background_thread() -> TestResult {
    let mut mgr = RegMgr::with_config(RegConfig::default())?;
    mgr.simulate_init(RegMode::Current, 1.0)?;
    let publisher = mgr.rst_publisher();

    let mut config = *mgr.config();
    let background = thread::spawn(move || -> Result<_, RegError> {
        let mut last = None;
        for hz in [6.0, 7.0, 8.0] {
            config.current.rst[0].auxpole_hz = hz;
            let pars = prepare_rst(&config, SignalKind::Current, RstSource::Operational)?;
            publisher.publish(SignalKind::Current, RstSource::Operational, pars)?;
            last = Some(pars);
        }
        Ok(last)
    });
    let last = background.join().map_err(|panic| format!("publisher panicked: {panic:?}"))??;
    let last = last.ok_or("nothing published")?;

    let before = *mgr.signal(SignalKind::Current).rst(RstSource::Operational);
    assert_ne!(before, last);

    mgr.measurement_intake(RstSource::Operational, true, false);
    assert_eq!(*mgr.signal(SignalKind::Current).rst(RstSource::Operational), last);
    let stats = mgr.rst_publisher().stats(SignalKind::Current, RstSource::Operational);
    assert!(stats.superseded >= 2);
    Ok(())
}

#[test]
fn test_apply_then_intake_activates_prepared_parameters() -> TestResult {
    let mut mgr = RegMgr::with_config(RegConfig::default())?;
    mgr.par_set("REG_I_AUXPOLE_HZ", &ParValue::Float(9.0))?;
    mgr.par_set("REG_I_PURE_DELAY_PERIODS", &ParValue::Float(1.0))?;
    let report = mgr.apply_changed_parameters()?;
    assert_eq!(report.rst_published, 4);

    let expected = prepare_rst(mgr.config(), SignalKind::Current, RstSource::Operational)?;
    mgr.measurement_intake(RstSource::Operational, true, false);
    let active = mgr.signal(SignalKind::Current).rst(RstSource::Operational);
    assert_eq!(*active, expected);
    assert_abs_diff_eq!(active.track_delay_periods(), 2.0, epsilon = 1e-9);
    Ok(())
}

#[test]
fn test_unstable_parameters_keep_last_good_set() -> TestResult {
    let mut mgr = RegMgr::with_config(RegConfig::default())?;
    mgr.simulate_init(RegMode::Current, 2.0)?;
    let good = *mgr.signal(SignalKind::Current).rst(RstSource::Operational);

    let mut r = vec![0.0; REG_N_RST_COEFFS];
    let mut s = vec![0.0; REG_N_RST_COEFFS];
    let mut t = vec![0.0; REG_N_RST_COEFFS];
    r[0] = 5000.0;
    s[0] = 1.0;
    s[1] = -1.0;
    t[0] = 5000.0;
    mgr.par_set("REG_I_ALGORITHM", &ParValue::Enum("MANUAL".into()))?;
    mgr.par_set("REG_I_MANUAL_R", &ParValue::Floats(r))?;
    mgr.par_set("REG_I_MANUAL_S", &ParValue::Floats(s))?;
    mgr.par_set("REG_I_MANUAL_T", &ParValue::Floats(t))?;

    let err = mgr.apply_changed_parameters();
    assert!(matches!(
        err,
        Err(RegError::RegulatorFault {
            signal: SignalKind::Current,
            rst_source: RstSource::Operational,
            ..
        })
    ));
    assert!(!mgr.rst_publisher().is_pending(SignalKind::Current, RstSource::Operational));

    run(&mut mgr, 200, 2.0);
    let active = mgr.signal(SignalKind::Current).rst(RstSource::Operational);
    assert_eq!(*active, good);
    assert_eq!(active.status(), RstStatus::Ok);
    assert_abs_diff_eq!(mgr.signal(SignalKind::Current).meas().unfiltered, 2.0, epsilon = 1e-3);
    Ok(())
}

#[test]
fn test_ramp_played_through_manager_limits() -> TestResult {
    let mut mgr = RegMgr::with_config(RegConfig::default())?;
    mgr.simulate_init(RegMode::Current, 0.0)?;

    let (registry, ctx) = mgr.fg_registry().ok_or("no registry outside NONE")?;
    let mut set = FgConfigSet::default();
    set.ramp.final_ref = 10.0;
    set.ramp.acceleration = 50.0;
    set.ramp.deceleration = 50.0;
    set.ramp.linear_rate = 20.0;
    let mut function = registry.arm_by_name("RAMP", &set, &ctx)?;
    let end = function.meta().time.end;

    let period = mgr.config().iter_period();
    let mut applied = mgr.reference();
    let mut phase = FgPhase::Pre;
    for k in 0..2000_u32 {
        let time = f64::from(k) * period;
        mgr.measurement_intake(RstSource::Operational, true, true);
        let (next_phase, mut reference) = function.generate_with_feedback(time, applied);
        phase = next_phase;
        mgr.regulate(&mut reference);
        applied = reference;
        assert!(!mgr.signal(SignalKind::Current).err().flags().fault, "error fault at {k}");
        mgr.simulate(0.0);
    }

    assert!(end < 2.0);
    assert_eq!(phase, FgPhase::Post);
    assert_abs_diff_eq!(mgr.reference(), 10.0, epsilon = 1e-9);
    assert_abs_diff_eq!(mgr.signal(SignalKind::Current).meas().unfiltered, 10.0, epsilon = 1e-3);
    Ok(())
}

#[test]
fn test_ramp_beyond_limits_is_rejected() -> TestResult {
    let mut mgr = RegMgr::with_config(RegConfig::default())?;
    assert!(mgr.fg_registry().is_none());
    mgr.simulate_init(RegMode::Current, 0.0)?;

    let (registry, ctx) = mgr.fg_registry().ok_or("no registry outside NONE")?;
    let mut set = FgConfigSet::default();
    set.ramp.final_ref = 80.0;
    assert!(registry.arm_by_name("RAMP", &set, &ctx).is_err());
    Ok(())
}

#[test]
fn test_current_ref_actuation_follows_reference() -> TestResult {
    let config = RegConfig {
        actuation: Actuation::CurrentRef,
        ..RegConfig::default()
    };
    let mut mgr = RegMgr::with_config(config)?;
    mgr.simulate_init(RegMode::Current, 1.0)?;
    run(&mut mgr, 500, 5.0);

    assert_abs_diff_eq!(mgr.i_ref(), 5.0, epsilon = 1e-9);
    assert_abs_diff_eq!(mgr.signal(SignalKind::Current).meas().unfiltered, 5.0, epsilon = 1e-3);
    Ok(())
}

#[test]
fn test_test_source_uses_test_load() -> TestResult {
    let mut config = RegConfig::default();
    config.loads[1].henrys = 0.2;
    config.load_test_select = 1;
    let mut mgr = RegMgr::with_config(config)?;

    assert_abs_diff_eq!(mgr.load(RstSource::Test).config().henrys, 0.2);
    let operational = *mgr.signal(SignalKind::Current).rst(RstSource::Operational);
    let test = *mgr.signal(SignalKind::Current).rst(RstSource::Test);
    assert_ne!(operational.coeffs(), test.coeffs());

    mgr.simulate_init(RegMode::Current, 1.0)?;
    for _ in 0..10 {
        let mut reference = 1.0;
        mgr.measurement_intake(RstSource::Test, true, false);
        mgr.regulate(&mut reference);
        mgr.simulate(0.0);
    }
    assert_eq!(mgr.rst_source(), RstSource::Test);
    Ok(())
}

#[test]
fn test_voltage_mode_runs_open_loop() -> TestResult {
    let mut mgr = RegMgr::with_config(RegConfig::default())?;
    mgr.simulate_init(RegMode::Voltage, 0.0)?;
    run(&mut mgr, 20_000, 10.0);

    let expected = mgr.load(RstSource::Operational).gain() * 10.0;
    assert_abs_diff_eq!(mgr.v_ref(), 10.0, epsilon = 1e-9);
    assert_abs_diff_eq!(mgr.signal(SignalKind::Current).meas().unfiltered, expected, epsilon = 1e-3);
    Ok(())
}
