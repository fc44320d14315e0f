//! Manager behaviour through the public API.

use approx::assert_abs_diff_eq;
use powerconv_reg::config::{RegConfig, RegMode, RstSource, SignalKind};
use powerconv_reg::lim::RmsLimitsConfig;
use powerconv_reg::mgr::{ChangeGroups, MeasInput, RegMgr};
use powerconv_reg::params::{ParTable, ParType, ParValue};
use powerconv_reg::{REG_N_LOADS, RegError};

type TestResult = Result<(), Box<dyn std::error::Error>>;

#[test]
fn test_partial_yaml_configures_manager() -> TestResult {
    let yaml = r"
iter_period_us: 500
field:
  enabled: false
current:
  limits:
    pos: 20
    neg: -20
    rate: 50
";
    let config: RegConfig = serde_yaml::from_str(yaml)?;
    let mut mgr = RegMgr::with_config(config)?;

    assert_abs_diff_eq!(mgr.config().iter_period(), 0.0005);
    assert_eq!(mgr.mode_set(RegMode::Field), Err(RegError::ModeDisabled(RegMode::Field)));
    assert_eq!(mgr.signal(SignalKind::Current).limits().bounds(), (-20.0, 20.0));
    // A partial signal document is completed from the current defaults
    assert_abs_diff_eq!(mgr.config().field.limits.pos, 50.0);
    Ok(())
}

#[test]
fn test_measurement_trip_outside_limits() -> TestResult {
    let mut mgr = RegMgr::with_config(RegConfig::default())?;
    mgr.set_meas_input(MeasInput {
        field: 600.0,
        ..MeasInput::default()
    });
    mgr.measurement_intake(RstSource::Operational, false, false);
    assert!(mgr.signal(SignalKind::Field).meas_flags().trip);
    assert!(!mgr.signal(SignalKind::Current).meas_flags().trip);

    mgr.set_meas_input(MeasInput {
        field: 540.0,
        ..MeasInput::default()
    });
    mgr.measurement_intake(RstSource::Operational, false, false);
    assert!(!mgr.signal(SignalKind::Field).meas_flags().trip);
    Ok(())
}

#[test]
fn test_non_finite_measurement_counted_invalid() -> TestResult {
    let mut mgr = RegMgr::with_config(RegConfig::default())?;
    for current in [1.0, 1.0, f64::NAN, f64::INFINITY, 1.0] {
        mgr.set_meas_input(MeasInput {
            current,
            ..MeasInput::default()
        });
        mgr.measurement_intake(RstSource::Operational, false, false);
        assert!(mgr.signal(SignalKind::Current).meas().unfiltered.is_finite());
    }
    let counters = mgr.signal(SignalKind::Current).counters().snapshot();
    assert_eq!(counters.iterations, 5);
    assert_eq!(counters.invalid_meas, 2);
    assert_eq!(counters.consecutive_invalid_meas, 0);
    assert_eq!(counters.max_consecutive_invalid_meas, 2);
    Ok(())
}

#[test]
fn test_rms_warning_through_manager() -> TestResult {
    let config = RegConfig {
        rms: RmsLimitsConfig {
            warning: 3.0,
            fault: 10.0,
            filter_tc: 0.1,
        },
        ..RegConfig::default()
    };
    let mut mgr = RegMgr::with_config(config)?;
    mgr.simulate_init(RegMode::Current, 4.0)?;
    for _ in 0..10 {
        let mut reference = 4.0;
        mgr.measurement_intake(RstSource::Operational, true, false);
        mgr.regulate(&mut reference);
        mgr.simulate(0.0);
    }
    assert_abs_diff_eq!(mgr.rms().rms(), 4.0, epsilon = 1e-3);
    assert!(mgr.rms().flags().warning);
    assert!(!mgr.rms().flags().fault);
    Ok(())
}

#[test]
fn test_limits_change_waits_for_apply() -> TestResult {
    let mut mgr = RegMgr::with_config(RegConfig::default())?;
    mgr.par_set("LIMITS_I_POS", &ParValue::Float(5.0))?;
    assert_eq!(mgr.signal(SignalKind::Current).limits().bounds().1, 50.0);

    let report = mgr.apply_changed_parameters()?;
    assert_eq!(report.groups, ChangeGroups::LIMITS);
    assert_eq!(report.rst_published, 0);
    assert_eq!(mgr.signal(SignalKind::Current).limits().bounds().1, 5.0);

    let report = mgr.apply_changed_parameters()?;
    assert!(report.groups.is_empty());
    Ok(())
}

#[test]
fn test_parameter_table_shape() {
    let table = ParTable::new();
    let load_indexed: Vec<_> = table.iter().filter(|par| par.load_select).collect();
    assert_eq!(load_indexed.len(), 8);
    assert!(load_indexed.iter().all(|par| par.len == REG_N_LOADS && par.par_type == ParType::Float));

    let read_only = table.iter().filter(|par| par.read_only()).count();
    assert!(read_only >= 20);
    assert!(table.iter().any(|par| par.name == "REG_B_TEST_AUXPOLE_HZ"));
}
