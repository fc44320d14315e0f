//! Jury's stability test for discrete characteristic polynomials.
//!
//! The polynomial is given in powers of `z⁻¹`, `p[0] + p[1]·z⁻¹ + …`, which
//! is the polynomial `p[0]·zⁿ + p[1]·zⁿ⁻¹ + …` in `z`. The necessary
//! conditions are checked first, then the reflection coefficients of the
//! Jury table.

use std::fmt;

/// Outcome of Jury's test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JurysResult {
    /// All roots strictly inside the unit circle.
    #[default]
    Ok,
    /// The leading coefficient is zero.
    ZeroLeadingCoeff,
    /// `P(1)` is not positive.
    P1NotPositive,
    /// `(-1)ⁿ·P(-1)` is not positive.
    PMinus1Sign,
    /// A reflection coefficient has magnitude of one or more.
    Unstable {
        /// Row of the Jury table where the test failed.
        stage: u8,
    },
}

impl fmt::Display for JurysResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => f.write_str("stable"),
            Self::ZeroLeadingCoeff => f.write_str("zero leading coefficient"),
            Self::P1NotPositive => f.write_str("P(1) not positive"),
            Self::PMinus1Sign => f.write_str("(-1)^n P(-1) not positive"),
            Self::Unstable { stage } => write!(f, "unstable at stage {stage}"),
        }
    }
}

/// Run Jury's test on `poly`. Trailing zero coefficients are ignored.
///
/// # Example
///
/// ```
/// use powerconv_reg::jury::{JurysResult, jurys_test};
///
/// // (1 - 0.5 z⁻¹)(1 - 0.2 z⁻¹)
/// assert_eq!(jurys_test(&[1.0, -0.7, 0.1]), JurysResult::Ok);
/// // Root at z = 2
/// assert_ne!(jurys_test(&[1.0, -2.0]), JurysResult::Ok);
/// ```
pub fn jurys_test(poly: &[f64]) -> JurysResult {
    let order = poly.iter().rposition(|&c| c != 0.0).unwrap_or(0);
    let Some(&leading) = poly.first() else {
        return JurysResult::ZeroLeadingCoeff;
    };
    if leading == 0.0 {
        return JurysResult::ZeroLeadingCoeff;
    }

    let sign = leading.signum();
    let mut row: Vec<f64> = poly[..=order].iter().map(|c| sign * c).collect();

    if row.iter().sum::<f64>() <= 0.0 {
        return JurysResult::P1NotPositive;
    }
    let p_minus_1: f64 = row
        .iter()
        .enumerate()
        .map(|(i, c)| if i % 2 == 0 { *c } else { -*c })
        .sum();
    if p_minus_1 <= 0.0 {
        return JurysResult::PMinus1Sign;
    }

    let mut stage = 0u8;
    while row.len() > 1 {
        stage = stage.saturating_add(1);
        let n = row.len() - 1;
        let k = row[n] / row[0];
        if k.abs() >= 1.0 {
            return JurysResult::Unstable { stage };
        }
        let next: Vec<f64> = (0..n).map(|i| row[i] - k * row[n - i]).collect();
        row = next;
    }

    JurysResult::Ok
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_roots(roots: &[f64]) -> Vec<f64> {
        roots.iter().fold(vec![1.0], |poly, root| {
            let mut next = vec![0.0; poly.len() + 1];
            for (i, c) in poly.iter().enumerate() {
                next[i] += c;
                next[i + 1] -= root * c;
            }
            next
        })
    }

    #[test]
    fn test_stable_roots() {
        assert_eq!(jurys_test(&from_roots(&[0.9, -0.5, 0.3, 0.0])), JurysResult::Ok);
    }

    #[test]
    fn test_root_outside() {
        assert_eq!(jurys_test(&from_roots(&[1.5])), JurysResult::P1NotPositive);
        assert_eq!(jurys_test(&from_roots(&[-1.5])), JurysResult::PMinus1Sign);
        assert!(matches!(
            jurys_test(&from_roots(&[0.5, 1.2, -1.1])),
            JurysResult::P1NotPositive | JurysResult::PMinus1Sign | JurysResult::Unstable { .. }
        ));
    }

    #[test]
    fn test_complex_pair_outside_unit_circle() {
        // z² - 0.2z + 1.21: roots of magnitude 1.1
        assert!(matches!(jurys_test(&[1.0, -0.2, 1.21]), JurysResult::Unstable { .. }));
        // z² - 0.2z + 0.81: roots of magnitude 0.9
        assert_eq!(jurys_test(&[1.0, -0.2, 0.81]), JurysResult::Ok);
    }

    #[test]
    fn test_negative_leading_coefficient_is_normalised() {
        assert_eq!(jurys_test(&[-1.0, 0.7, -0.1]), JurysResult::Ok);
        assert_eq!(jurys_test(&[0.0, 1.0]), JurysResult::ZeroLeadingCoeff);
        assert_eq!(jurys_test(&[]), JurysResult::ZeroLeadingCoeff);
    }
}
