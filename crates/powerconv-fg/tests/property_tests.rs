//! Property-based tests for the function generators.
//!
//! These tests check properties that hold for every armed function: the
//! value at the start and end times, continuity, and exact table points.

use powerconv_fg::{
    ArmContext, FgErrorKind, FgFuncPolarity, FgPhase, Plep, PlepConfig, Ramp, RampConfig, Table,
    TableConfig, Trim, TrimConfig, TrimKind,
};
use quickcheck_macros::quickcheck;

fn sanitize(v: f64, lo: f64, hi: f64) -> f64 {
    if v.is_finite() { v.clamp(lo, hi) } else { lo }
}

#[quickcheck]
fn prop_error_kind_codes_round_trip(code: u8) -> bool {
    match FgErrorKind::from_code(code) {
        Some(kind) => kind.code() == code,
        None => !(1..=6).contains(&code),
    }
}

#[quickcheck]
fn prop_polarity_matches_range(a: f64, b: f64) -> bool {
    let (a, b) = (sanitize(a, -1e6, 1e6), sanitize(b, -1e6, 1e6));
    let (min, max) = (a.min(b), a.max(b));
    match FgFuncPolarity::from_range(min, max) {
        FgFuncPolarity::Zero => min >= 0.0 && max <= 0.0,
        FgFuncPolarity::Positive => min >= 0.0 && max > 0.0,
        FgFuncPolarity::Negative => min < 0.0 && max <= 0.0,
        FgFuncPolarity::Both => min < 0.0 && max > 0.0,
    }
}

mod proptest_tests {
    use super::*;
    use proptest::prelude::*;

    fn fail(e: impl std::fmt::Display) -> TestCaseError {
        TestCaseError::fail(e.to_string())
    }

    proptest! {
        #[test]
        fn plep_reaches_final_and_is_continuous(
            initial in -10.0f64..10.0,
            final_ref in -10.0f64..10.0,
            acceleration in 0.5f64..10.0,
            linear_rate in 0.5f64..10.0,
        ) {
            let config = PlepConfig {
                final_ref,
                acceleration,
                linear_rate,
                ..PlepConfig::default()
            };
            let mut f = Plep::arm(&ArmContext::from_initial_ref(initial), &config).map_err(fail)?;
            let start = f.meta().time.start;
            let end = f.meta().time.end;

            prop_assert_eq!(f.generate(end), (FgPhase::Post, final_ref));
            prop_assert!((f.generate(start).1 - initial).abs() < 1e-9);

            let steps = 500;
            let dt = (end - start) / f64::from(steps);
            let mut previous = f.generate(start).1;
            for i in 1..=steps {
                let value = f.generate(start + dt * f64::from(i)).1;
                prop_assert!((value - previous).abs() <= linear_rate * dt * 1.000_001 + 1e-9);
                previous = value;
            }
        }

        #[test]
        fn plep_post_phase_extrapolates_final_rate(
            initial in -10.0f64..10.0,
            final_ref in -10.0f64..10.0,
            final_rate in -5.0f64..5.0,
            acceleration in 0.5f64..10.0,
            after in 0.0f64..100.0,
        ) {
            let config = PlepConfig {
                final_ref,
                final_rate,
                acceleration,
                linear_rate: 1.0,
                ..PlepConfig::default()
            };
            let mut f = Plep::arm(&ArmContext::from_initial_ref(initial), &config).map_err(fail)?;
            let end = f.meta().time.end;

            let (phase, value) = f.generate(end + after);
            prop_assert_eq!(phase, FgPhase::Post);
            let expected = final_ref + final_rate * after;
            prop_assert!((value - expected).abs() <= 1e-9 * (1.0 + expected.abs()));
        }

        #[test]
        fn ramp_reaches_final_monotonically(
            initial in -10.0f64..10.0,
            final_ref in -10.0f64..10.0,
            acceleration in 0.5f64..10.0,
            deceleration in 0.5f64..10.0,
            linear_rate in 0.0f64..5.0,
        ) {
            let config = RampConfig { final_ref, acceleration, linear_rate, deceleration };
            let mut f = Ramp::arm(&ArmContext::from_initial_ref(initial), &config).map_err(fail)?;
            let end = f.meta().time.end;
            prop_assert_eq!(f.generate(end), (FgPhase::Post, final_ref));
            prop_assert_eq!(f.generate(end + 10.0), (FgPhase::Post, final_ref));

            let direction = (final_ref - initial).signum();
            let mut previous = initial;
            for i in 0..=200 {
                let value = f.generate(end * f64::from(i) / 200.0).1;
                prop_assert!(direction * (value - previous) >= -1e-9);
                previous = value;
            }
        }

        #[test]
        fn table_points_are_exact(
            deltas in proptest::collection::vec(0.01f64..1.0, 2..20),
            refs in proptest::collection::vec(-100.0f64..100.0, 20),
        ) {
            let mut time = vec![0.0];
            for d in &deltas {
                let last = time[time.len() - 1];
                time.push(last + d);
            }
            let reference = refs[..time.len()].to_vec();
            let config = TableConfig { time: time.clone(), reference: reference.clone(), ..TableConfig::default() };
            let mut f = Table::arm(&ArmContext::default(), &config).map_err(fail)?;

            for (t, r) in time.iter().zip(&reference) {
                prop_assert_eq!(f.generate(*t).1, *r);
            }
            for (t, r) in time.iter().zip(&reference).rev() {
                prop_assert_eq!(f.generate(*t).1, *r);
            }
        }

        #[test]
        fn trims_start_and_end_on_their_references(
            initial in -10.0f64..10.0,
            final_ref in -10.0f64..10.0,
            duration in 0.01f64..10.0,
            cubic in any::<bool>(),
        ) {
            let kind = if cubic { TrimKind::Cubic } else { TrimKind::Linear };
            let config = TrimConfig { final_ref, duration };
            let mut f = Trim::arm(kind, &ArmContext::from_initial_ref(initial), &config).map_err(fail)?;
            prop_assert!((f.generate(0.0).1 - initial).abs() < 1e-9);
            prop_assert_eq!(f.generate(duration), (FgPhase::Post, final_ref));
            let mid = f.generate(0.5 * duration).1;
            prop_assert!((mid - 0.5 * (initial + final_ref)).abs() < 1e-9);
        }
    }
}
