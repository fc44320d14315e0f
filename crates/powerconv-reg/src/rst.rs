//! RST regulator.
//!
//! The control law is `S·act = T·ref − R·meas`, with every polynomial in
//! powers of `z⁻¹`. Coefficients are either given directly or synthesised
//! by pole placement for the first-order load model with an integer pure
//! delay. Synthesis puts an integrator in `S` so the static error is zero
//! and places two dominant poles from an auxiliary natural frequency and
//! damping; the remaining closed-loop poles sit at the origin. `T` cancels
//! the closed-loop poles, so a reference reaches the measurement after the
//! pure delay plus one period while disturbances are rejected at the
//! auxiliary pole bandwidth.
//!
//! Every parameter set passes Jury's test on the closed-loop
//! characteristic polynomial and has its modulus margin evaluated before it
//! can be activated.
//!
//! # RT Safety
//!
//! - [`RstPars::calc_act`] and [`RstPars::calc_ref`]: no heap allocations,
//!   O(1) time complexity
//! - [`RstPars::init`]: NOT RT-safe, runs in the background

use std::f64::consts::{PI, TAU};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::SignalKind;
use crate::error::RegError;
use crate::jury::{JurysResult, jurys_test};
use crate::load::Load;
use crate::ring::{HistoryRing, RST_HISTORY_LEN};

/// Number of coefficients in each of R, S and T.
pub const REG_N_RST_COEFFS: usize = 10;

/// Longest pure delay supported by synthesis, in regulation periods.
pub const REG_MAX_PURE_DELAY_PERIODS: usize = REG_N_RST_COEFFS - 2;

/// Modulus margin below which parameters are flagged [`RstStatus::Warning`].
pub const REG_MM_WARNING_THRESHOLD: f64 = 0.4;

/// Frequency points used to evaluate the modulus margin.
pub const REG_MM_FREQ_POINTS: usize = 200;

/// R, S and T coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RstCoeffs {
    /// Measurement polynomial.
    pub r: [f64; REG_N_RST_COEFFS],
    /// Actuation polynomial.
    pub s: [f64; REG_N_RST_COEFFS],
    /// Reference polynomial.
    pub t: [f64; REG_N_RST_COEFFS],
}

/// How the coefficients are obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RstAlgorithm {
    /// Pole placement on the load model.
    #[default]
    Synthesised,
    /// Coefficients taken from [`RstConfig::manual`].
    Manual,
}

/// RST parameters for one signal and source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RstConfig {
    /// Coefficient source.
    pub algorithm: RstAlgorithm,
    /// Coefficients used by [`RstAlgorithm::Manual`].
    pub manual: RstCoeffs,
    /// Natural frequency of the dominant closed-loop poles in Hz.
    pub auxpole_hz: f64,
    /// Damping of the dominant closed-loop poles.
    pub auxpole_z: f64,
    /// Delay between actuation and measurement in regulation periods.
    pub pure_delay_periods: f64,
    /// Reference to measurement delay; zero to derive it from the
    /// closed-loop response.
    pub track_delay_periods: f64,
}

impl Default for RstConfig {
    fn default() -> Self {
        Self {
            algorithm: RstAlgorithm::Synthesised,
            manual: RstCoeffs::default(),
            auxpole_hz: 5.0,
            auxpole_z: 0.8,
            pure_delay_periods: 2.0,
            track_delay_periods: 0.0,
        }
    }
}

/// Health of a parameter set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RstStatus {
    /// Stable with adequate margin.
    #[default]
    Ok,
    /// Stable but with a low modulus margin.
    Warning,
    /// Unstable, must not be activated.
    Fault,
}

impl RstStatus {
    /// Parameter-table name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Warning => "WARNING",
            Self::Fault => "FAULT",
        }
    }
}

impl fmt::Display for RstStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Discrete first-order model `y[k+1] = a·y[k] + b·act[k]`, used for
/// synthesis and open-loop regulation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OpenLoop {
    /// Pole.
    pub a: f64,
    /// Input gain.
    pub b: f64,
}

impl OpenLoop {
    /// Actuation that takes the model from `previous` to `reference`.
    #[inline]
    pub fn act(&self, reference: f64, previous: f64) -> f64 {
        (reference - self.a * previous) / self.b
    }

    /// Model output reached from `previous` with `act`.
    #[inline]
    pub fn reference(&self, act: f64, previous: f64) -> f64 {
        self.b * act + self.a * previous
    }

    /// Previous output for which `act` keeps the model at `meas`.
    #[inline]
    pub fn previous(&self, meas: f64, act: f64) -> f64 {
        (meas - self.b * act) / self.a
    }
}

/// RST histories, sharing one index.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RstVars {
    index: usize,
    /// Actuation history.
    pub act: HistoryRing,
    /// Measurement history.
    pub meas: HistoryRing,
    /// Reference history.
    pub reference: HistoryRing,
    /// Open-loop reference history.
    pub openloop_ref: HistoryRing,
}

impl RstVars {
    /// Index of the newest sample.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Start a new regulation period.
    #[inline]
    pub fn advance(&mut self) {
        self.index = (self.index + 1) % RST_HISTORY_LEN;
    }

    /// Fill every history as if the signal had been steady at `meas` with
    /// actuation `act`.
    pub fn init_history(&mut self, meas: f64, act: f64, openloop: &OpenLoop) {
        self.act.fill(act);
        self.meas.fill(meas);
        self.reference.fill(meas);
        self.openloop_ref.fill(if openloop.a == 0.0 { meas } else { openloop.previous(meas, act) });
    }

    /// Reset the reference histories to zero.
    pub fn reset_refs(&mut self) {
        self.reference.fill(0.0);
        self.openloop_ref.fill(0.0);
    }
}

/// Validated RST parameters.
///
/// # Example
///
/// ```
/// use powerconv_reg::config::SignalKind;
/// use powerconv_reg::load::{Load, LoadConfig};
/// use powerconv_reg::rst::{RstConfig, RstPars, RstStatus};
///
/// let load = Load::new(&LoadConfig::default(), 0)?;
/// let pars = RstPars::init(SignalKind::Current, &RstConfig::default(), &load, 1.0, 0.001, 1)?;
/// assert_eq!(pars.status(), RstStatus::Ok);
/// assert!((pars.track_delay_periods() - 3.0).abs() < 1e-9);
/// # Ok::<(), powerconv_reg::RegError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RstPars {
    coeffs: RstCoeffs,
    period_iters: u32,
    period: f64,
    pure_delay_periods: f64,
    track_delay_periods: f64,
    openloop: OpenLoop,
    status: RstStatus,
    jury: JurysResult,
    modulus_margin: f64,
    modulus_margin_freq: f64,
}

impl Default for RstPars {
    /// Placeholder that cannot be activated.
    fn default() -> Self {
        Self {
            coeffs: RstCoeffs::default(),
            period_iters: 1,
            period: 0.0,
            pure_delay_periods: 0.0,
            track_delay_periods: 1.0,
            openloop: OpenLoop::default(),
            status: RstStatus::Fault,
            jury: JurysResult::ZeroLeadingCoeff,
            modulus_margin: 0.0,
            modulus_margin_freq: 0.0,
        }
    }
}

impl RstPars {
    /// Build and check parameters for `signal` on `load`.
    ///
    /// `output_gain` converts magnet current to the regulated signal.
    ///
    /// # Errors
    ///
    /// Returns [`RegError::InvalidRst`] when the parameters cannot be
    /// computed at all. An unstable but computable set is returned with
    /// [`RstStatus::Fault`] so the caller can report it.
    pub fn init(
        signal: SignalKind,
        config: &RstConfig,
        load: &Load,
        output_gain: f64,
        iter_period: f64,
        period_iters: u32,
    ) -> Result<Self, RegError> {
        let invalid = |reason| RegError::InvalidRst { signal, reason };

        if period_iters == 0 {
            return Err(invalid("regulation period must be at least one iteration"));
        }
        let period = iter_period * f64::from(period_iters);
        let (a, b) = load.plant(period, output_gain);
        if b == 0.0 {
            return Err(invalid("load model has zero gain"));
        }
        let openloop = OpenLoop { a, b };

        let pure_delay = config.pure_delay_periods.round();
        if !(0.0..=REG_MAX_PURE_DELAY_PERIODS as f64).contains(&pure_delay) {
            return Err(invalid("pure delay out of range"));
        }
        let delay_periods = pure_delay as usize;

        let coeffs = match config.algorithm {
            RstAlgorithm::Synthesised => {
                if !(config.auxpole_hz > 0.0 && config.auxpole_z > 0.0) {
                    return Err(invalid("auxiliary pole frequency and damping must be positive"));
                }
                let poles = dominant_poles(config.auxpole_hz, config.auxpole_z, period);
                synthesise(openloop, delay_periods, poles).ok_or_else(|| invalid("synthesis is singular"))?
            }
            RstAlgorithm::Manual => config.manual,
        };

        if coeffs.s[0] == 0.0 || coeffs.t[0] == 0.0 {
            return Err(invalid("s0 and t0 must be non-zero"));
        }

        let plant_a = [1.0, -a];
        let mut plant_b = vec![0.0; delay_periods + 2];
        plant_b[delay_periods + 1] = b;

        let closed_loop = poly_add(&poly_mul(&plant_a, &coeffs.s), &poly_mul(&plant_b, &coeffs.r));
        let jury = jurys_test(&closed_loop);
        let (modulus_margin, mm_omega) = modulus_margin(&plant_a, &coeffs.s, &closed_loop);

        let track_delay_periods = if config.track_delay_periods > 0.0 {
            config.track_delay_periods
        } else {
            let forward = poly_mul(&plant_b, &coeffs.t);
            match (dc_group_delay(&forward), dc_group_delay(&closed_loop)) {
                (Some(num), Some(den)) => num - den,
                _ => pure_delay + 1.0,
            }
        };

        let status = if jury != JurysResult::Ok {
            RstStatus::Fault
        } else if modulus_margin < REG_MM_WARNING_THRESHOLD {
            RstStatus::Warning
        } else {
            RstStatus::Ok
        };

        let pars = Self {
            coeffs,
            period_iters,
            period,
            pure_delay_periods: config.pure_delay_periods,
            track_delay_periods,
            openloop,
            status,
            jury,
            modulus_margin,
            modulus_margin_freq: mm_omega / (TAU * period),
        };

        match status {
            RstStatus::Ok => debug!(%signal, modulus_margin, track_delay_periods, "RST parameters ready"),
            RstStatus::Warning | RstStatus::Fault => {
                warn!(%signal, %status, %jury, modulus_margin, "RST parameters degraded");
            }
        }

        Ok(pars)
    }

    /// Coefficients.
    pub fn coeffs(&self) -> &RstCoeffs {
        &self.coeffs
    }

    /// Regulation period in iterations.
    pub fn period_iters(&self) -> u32 {
        self.period_iters
    }

    /// Regulation period in seconds.
    pub fn period(&self) -> f64 {
        self.period
    }

    /// Configured pure delay in periods.
    pub fn pure_delay_periods(&self) -> f64 {
        self.pure_delay_periods
    }

    /// Delay between a reference and its effect on the regulated
    /// measurement, in periods.
    pub fn track_delay_periods(&self) -> f64 {
        self.track_delay_periods
    }

    /// Open-loop model.
    pub fn openloop(&self) -> &OpenLoop {
        &self.openloop
    }

    /// Health classification.
    pub fn status(&self) -> RstStatus {
        self.status
    }

    /// Jury's test result.
    pub fn jury(&self) -> JurysResult {
        self.jury
    }

    /// Modulus margin.
    pub fn modulus_margin(&self) -> f64 {
        self.modulus_margin
    }

    /// Frequency of the modulus margin in Hz.
    pub fn modulus_margin_freq(&self) -> f64 {
        self.modulus_margin_freq
    }

    /// Actuation for the newest reference and measurement.
    #[inline]
    pub fn calc_act(&self, vars: &RstVars) -> f64 {
        let index = vars.index();
        let c = &self.coeffs;
        let mut act = c.t[0] * vars.reference.get(index, 0) - c.r[0] * vars.meas.get(index, 0);
        for age in 1..REG_N_RST_COEFFS {
            act += c.t[age] * vars.reference.get(index, age)
                - c.r[age] * vars.meas.get(index, age)
                - c.s[age] * vars.act.get(index, age);
        }
        act / c.s[0]
    }

    /// Reference that would have produced the newest actuation.
    #[inline]
    pub fn calc_ref(&self, vars: &RstVars) -> f64 {
        let index = vars.index();
        let c = &self.coeffs;
        let mut reference = c.s[0] * vars.act.get(index, 0) + c.r[0] * vars.meas.get(index, 0);
        for age in 1..REG_N_RST_COEFFS {
            reference += c.s[age] * vars.act.get(index, age) + c.r[age] * vars.meas.get(index, age)
                - c.t[age] * vars.reference.get(index, age);
        }
        reference / c.t[0]
    }
}

/// Characteristic polynomial `1 + p1·z⁻¹ + p2·z⁻²` of the dominant poles.
fn dominant_poles(freq_hz: f64, damping: f64, period: f64) -> [f64; 2] {
    let w = TAU * freq_hz;
    if damping < 1.0 {
        let decay = (-damping * w * period).exp();
        let angle = w * period * (1.0 - damping * damping).sqrt();
        [-2.0 * decay * angle.cos(), decay * decay]
    } else {
        let spread = (damping * damping - 1.0).sqrt();
        let z1 = (-w * (damping - spread) * period).exp();
        let z2 = (-w * (damping + spread) * period).exp();
        [-(z1 + z2), z1 * z2]
    }
}

/// Solve `A·(1 − z⁻¹)·S' + B·R = P` for a first-order `A` and
/// `B = b·z^-(delay+1)`, with `T = P / b`.
fn synthesise(plant: OpenLoop, delay: usize, poles: [f64; 2]) -> Option<RstCoeffs> {
    let alpha = [1.0, -(1.0 + plant.a), plant.a];
    let coeff = |k: isize| if (0..3).contains(&k) { alpha[k as usize] } else { 0.0 };
    let target = |k: usize| match k {
        1 => poles[0],
        2 => poles[1],
        _ => 0.0,
    };

    let n = delay + 2;
    let mut matrix = vec![vec![0.0; n]; n];
    let mut rhs = vec![0.0; n];
    for k in 1..=n {
        let row = &mut matrix[k - 1];
        for j in 1..=delay {
            row[j - 1] = coeff(k as isize - j as isize);
        }
        if k == delay + 1 {
            row[delay] = plant.b;
        }
        if k == delay + 2 {
            row[delay + 1] = plant.b;
        }
        rhs[k - 1] = target(k) - coeff(k as isize);
    }

    let x = solve(matrix, rhs)?;

    let mut s_prime = vec![1.0];
    s_prime.extend_from_slice(&x[..delay]);
    let mut coeffs = RstCoeffs::default();
    coeffs.s[0] = 1.0;
    for k in 1..=delay {
        coeffs.s[k] = s_prime[k] - s_prime[k - 1];
    }
    coeffs.s[delay + 1] = -s_prime[delay];

    coeffs.r[0] = x[delay];
    coeffs.r[1] = x[delay + 1];

    // T = P / b makes the reference response a pure delay
    coeffs.t[0] = 1.0 / plant.b;
    coeffs.t[1] = poles[0] / plant.b;
    coeffs.t[2] = poles[1] / plant.b;
    Some(coeffs)
}

/// Gaussian elimination with partial pivoting.
fn solve(mut matrix: Vec<Vec<f64>>, mut rhs: Vec<f64>) -> Option<Vec<f64>> {
    let n = rhs.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| matrix[i][col].abs().total_cmp(&matrix[j][col].abs()))?;
        if matrix[pivot][col].abs() < 1.0e-15 {
            return None;
        }
        matrix.swap(col, pivot);
        rhs.swap(col, pivot);

        for row in col + 1..n {
            let factor = matrix[row][col] / matrix[col][col];
            if factor != 0.0 {
                for k in col..n {
                    matrix[row][k] -= factor * matrix[col][k];
                }
                rhs[row] -= factor * rhs[col];
            }
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| matrix[row][k] * x[k]).sum();
        x[row] = (rhs[row] - tail) / matrix[row][row];
    }
    Some(x)
}

fn poly_mul(a: &[f64], b: &[f64]) -> Vec<f64> {
    let mut out = vec![0.0; a.len() + b.len() - 1];
    for (i, x) in a.iter().enumerate() {
        for (j, y) in b.iter().enumerate() {
            out[i + j] += x * y;
        }
    }
    out
}

fn poly_add(a: &[f64], b: &[f64]) -> Vec<f64> {
    let mut out = vec![0.0; a.len().max(b.len())];
    for (i, x) in a.iter().enumerate() {
        out[i] += x;
    }
    for (i, y) in b.iter().enumerate() {
        out[i] += y;
    }
    out
}

/// Value of `poly(z⁻¹)` at `z = e^{jω}` as `(re, im)`.
fn poly_at(poly: &[f64], omega: f64) -> (f64, f64) {
    poly.iter().enumerate().fold((0.0, 0.0), |(re, im), (k, c)| {
        let angle = -(k as f64) * omega;
        (re + c * angle.cos(), im + c * angle.sin())
    })
}

/// Minimum of `|P / (A·S)|` over the frequency grid and where it occurs.
fn modulus_margin(plant_a: &[f64], s: &[f64], closed_loop: &[f64]) -> (f64, f64) {
    let a_s = poly_mul(plant_a, s);
    (1..=REG_MM_FREQ_POINTS)
        .map(|k| {
            let omega = PI * k as f64 / REG_MM_FREQ_POINTS as f64;
            let (p_re, p_im) = poly_at(closed_loop, omega);
            let (d_re, d_im) = poly_at(&a_s, omega);
            let denominator = d_re.hypot(d_im);
            let ratio = if denominator > 0.0 { p_re.hypot(p_im) / denominator } else { f64::INFINITY };
            (ratio, omega)
        })
        .fold((f64::INFINITY, 0.0), |best, point| if point.0 < best.0 { point } else { best })
}

/// Group delay at DC in samples, `None` when the DC gain is zero.
fn dc_group_delay(poly: &[f64]) -> Option<f64> {
    let sum: f64 = poly.iter().sum();
    if sum.abs() < 1.0e-12 {
        return None;
    }
    let moment: f64 = poly.iter().enumerate().map(|(k, c)| k as f64 * c).sum();
    Some(moment / sum)
}
