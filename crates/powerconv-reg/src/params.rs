//! Named parameter surface.
//!
//! Every tunable is described once in a [`ParTable`]: its name, value type,
//! array length, whether it is read-only or indexed by load select, the
//! regulation modes it applies to and the [`ChangeGroups`] it dirties.
//! A configuration layer can enumerate, print and persist the table without
//! knowing the manager's internals, and change values through
//! [`RegMgr::par_set`]. Each manager builds its own table when it is created;
//! [`RegMgr::par_table`] lends it out. Nothing takes effect until
//! [`RegMgr::apply_changed_parameters`].
//!
//! Load parameters are arrays of [`REG_N_LOADS`] values. Setting one with a
//! scalar changes only the element selected by `LOAD_SELECT`.
//!
//! # Example
//!
//! ```
//! use powerconv_reg::config::RegConfig;
//! use powerconv_reg::mgr::{ChangeGroups, RegMgr};
//! use powerconv_reg::params::ParValue;
//!
//! let mut mgr = RegMgr::with_config(RegConfig::default())?;
//! mgr.par_set("LIMITS_I_POS", &ParValue::Float(20.0))?;
//! assert!(mgr.changed().intersects(ChangeGroups::LIMITS));
//!
//! mgr.apply_changed_parameters()?;
//! assert_eq!(mgr.par_get("LIMITS_I_POS")?, ParValue::Float(20.0));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::fmt;

use powerconv_filters::MeasSelect;
use thiserror::Error;
use tracing::debug;

use crate::config::{Actuation, RegConfig, RegMode, SignalKind};
use crate::load::{LoadConfig, REG_N_LOADS};
use crate::mgr::{ChangeGroups, REG_MEAS_FIR_CAPACITY, RegMgr};
use crate::rst::{REG_N_RST_COEFFS, RstAlgorithm};
use crate::vs::VS_N_COEFFS;

/// Type of a parameter's elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParType {
    /// 64-bit float.
    Float,
    /// Signed integer.
    Int,
    /// Boolean.
    Bool,
    /// Symbolic value.
    Enum,
}

impl fmt::Display for ParType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Float => "float",
            Self::Int => "int",
            Self::Bool => "bool",
            Self::Enum => "enum",
        })
    }
}

/// Value of a parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ParValue {
    /// Scalar float.
    Float(f64),
    /// Float array.
    Floats(Vec<f64>),
    /// Scalar integer.
    Int(i64),
    /// Integer array.
    Ints(Vec<i64>),
    /// Boolean.
    Bool(bool),
    /// Symbolic value such as `FILTERED`.
    Enum(String),
}

/// Why a value cannot be stored in a parameter.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValueError {
    /// Wrong element type.
    #[error("expected {expected}, got {got}")]
    TypeMismatch {
        /// Parameter type.
        expected: ParType,
        /// Type of the value.
        got: ParType,
    },

    /// Wrong number of elements.
    #[error("expected {expected} elements, got {got}")]
    ArrayLength {
        /// Parameter length.
        expected: usize,
        /// Length of the value.
        got: usize,
    },

    /// Value outside the legal range.
    #[error("{value} out of range: {reason}")]
    OutOfRange {
        /// Offending value.
        value: f64,
        /// Legal range.
        reason: &'static str,
    },

    /// Unknown symbol for an enum parameter.
    #[error("unknown symbol {0}")]
    UnknownSymbol(String),
}

/// Error returned by [`RegMgr::par_get`] and [`RegMgr::par_set`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParError {
    /// No parameter has this name.
    #[error("unknown parameter {0}")]
    Unknown(String),

    /// The parameter reports state and cannot be set.
    #[error("parameter {0} is read-only")]
    ReadOnly(&'static str),

    /// The value does not fit the parameter.
    #[error("parameter {name}: {source}")]
    Value {
        /// Parameter name.
        name: &'static str,
        /// What is wrong with the value.
        source: ValueError,
    },
}

impl ParValue {
    /// Element type.
    pub fn par_type(&self) -> ParType {
        match self {
            Self::Float(_) | Self::Floats(_) => ParType::Float,
            Self::Int(_) | Self::Ints(_) => ParType::Int,
            Self::Bool(_) => ParType::Bool,
            Self::Enum(_) => ParType::Enum,
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        match self {
            Self::Floats(values) => values.len(),
            Self::Ints(values) => values.len(),
            _ => 1,
        }
    }

    /// Whether the value is an empty array.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn mismatch(&self, expected: ParType) -> ValueError {
        ValueError::TypeMismatch {
            expected,
            got: self.par_type(),
        }
    }

    /// Finite scalar float. Integers are accepted.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError`] for another type or a non-finite value.
    pub fn as_float(&self) -> Result<f64, ValueError> {
        let value = match self {
            Self::Float(value) => *value,
            Self::Int(value) => *value as f64,
            _ => return Err(self.mismatch(ParType::Float)),
        };
        finite(value)
    }

    /// Finite float array of exactly `N` elements.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError`] for another type, another length or a
    /// non-finite element.
    pub fn as_floats<const N: usize>(&self) -> Result<[f64; N], ValueError> {
        let Self::Floats(values) = self else {
            return Err(self.mismatch(ParType::Float));
        };
        if values.len() != N {
            return Err(ValueError::ArrayLength {
                expected: N,
                got: values.len(),
            });
        }
        let mut array = [0.0; N];
        for (slot, &value) in array.iter_mut().zip(values) {
            *slot = finite(value)?;
        }
        Ok(array)
    }

    /// Scalar integer.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::TypeMismatch`] for another type.
    pub fn as_int(&self) -> Result<i64, ValueError> {
        match self {
            Self::Int(value) => Ok(*value),
            _ => Err(self.mismatch(ParType::Int)),
        }
    }

    /// Non-negative integer that fits `T`.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError`] for another type or a value out of range.
    pub fn as_count<T: TryFrom<i64>>(&self) -> Result<T, ValueError> {
        let value = self.as_int()?;
        T::try_from(value).ok().ok_or_else(|| not_a_count(value))
    }

    /// Integer array of exactly `N` non-negative elements.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError`] for another type, another length or a
    /// negative element.
    pub fn as_counts<const N: usize>(&self) -> Result<[usize; N], ValueError> {
        let Self::Ints(values) = self else {
            return Err(self.mismatch(ParType::Int));
        };
        if values.len() != N {
            return Err(ValueError::ArrayLength {
                expected: N,
                got: values.len(),
            });
        }
        let mut array = [0; N];
        for (slot, &value) in array.iter_mut().zip(values) {
            *slot = usize::try_from(value).ok().ok_or_else(|| not_a_count(value))?;
        }
        Ok(array)
    }

    /// Boolean.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::TypeMismatch`] for another type.
    pub fn as_bool(&self) -> Result<bool, ValueError> {
        match self {
            Self::Bool(value) => Ok(*value),
            _ => Err(self.mismatch(ParType::Bool)),
        }
    }

    /// Symbol of an enum value.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::TypeMismatch`] for another type.
    pub fn as_symbol(&self) -> Result<&str, ValueError> {
        match self {
            Self::Enum(symbol) => Ok(symbol),
            _ => Err(self.mismatch(ParType::Enum)),
        }
    }
}

impl fmt::Display for ParValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, values: &[T]) -> fmt::Result {
            for (i, value) in values.iter().enumerate() {
                if i > 0 {
                    f.write_str(",")?;
                }
                write!(f, "{value}")?;
            }
            Ok(())
        }
        match self {
            Self::Float(value) => write!(f, "{value}"),
            Self::Floats(values) => list(f, values),
            Self::Int(value) => write!(f, "{value}"),
            Self::Ints(values) => list(f, values),
            Self::Bool(value) => f.write_str(if *value { "ENABLED" } else { "DISABLED" }),
            Self::Enum(symbol) => f.write_str(symbol),
        }
    }
}

fn finite(value: f64) -> Result<f64, ValueError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ValueError::OutOfRange {
            value,
            reason: "must be finite",
        })
    }
}

fn not_a_count(value: i64) -> ValueError {
    ValueError::OutOfRange {
        value: value as f64,
        reason: "must be a non-negative count",
    }
}

fn positive(value: f64) -> Result<f64, ValueError> {
    if value > 0.0 {
        Ok(value)
    } else {
        Err(ValueError::OutOfRange {
            value,
            reason: "must be positive",
        })
    }
}

fn at_most(value: usize, max: usize, reason: &'static str) -> Result<usize, ValueError> {
    if value <= max {
        Ok(value)
    } else {
        Err(ValueError::OutOfRange {
            value: value as f64,
            reason,
        })
    }
}

fn count(value: impl TryInto<i64>) -> i64 {
    value.try_into().unwrap_or(i64::MAX)
}

fn counts(values: &[usize]) -> Vec<i64> {
    values.iter().map(|&value| count(value)).collect()
}

/// Reads a parameter from the manager.
pub type ParGetter = fn(&RegMgr) -> ParValue;

/// Writes a parameter into a configuration.
pub type ParSetter = fn(&mut RegConfig, &ParValue) -> Result<(), ValueError>;

/// Description of one parameter.
#[derive(Clone, Copy)]
pub struct ParDescriptor {
    /// Name, upper case.
    pub name: &'static str,
    /// Element type.
    pub par_type: ParType,
    /// Number of elements, one for scalars.
    pub len: usize,
    /// Array indexed by the load select.
    pub load_select: bool,
    /// Regulation modes the parameter applies to, as [`RegMode::bit`]s.
    pub modes: u8,
    /// Groups re-applied after a change.
    pub group: ChangeGroups,
    get: ParGetter,
    set: Option<ParSetter>,
}

impl fmt::Debug for ParDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParDescriptor")
            .field("name", &self.name)
            .field("par_type", &self.par_type)
            .field("len", &self.len)
            .field("load_select", &self.load_select)
            .field("modes", &self.modes)
            .field("group", &self.group)
            .field("read_only", &self.read_only())
            .finish()
    }
}

impl ParDescriptor {
    fn new(name: &'static str, par_type: ParType, len: usize, modes: u8, get: ParGetter) -> Self {
        Self {
            name,
            par_type,
            len,
            load_select: false,
            modes,
            group: ChangeGroups::NONE,
            get,
            set: None,
        }
    }

    fn settable(mut self, group: ChangeGroups, set: ParSetter) -> Self {
        self.group = group;
        self.set = Some(set);
        self
    }

    fn load_indexed(mut self) -> Self {
        self.load_select = true;
        self
    }

    /// Whether the parameter reports state and cannot be set.
    pub fn read_only(&self) -> bool {
        self.set.is_none()
    }

    /// Whether the parameter matters in `mode`.
    pub fn applies_to(&self, mode: RegMode) -> bool {
        self.modes & mode.bit() != 0
    }

    /// Current value.
    pub fn get(&self, mgr: &RegMgr) -> ParValue {
        (self.get)(mgr)
    }
}

const FIELD: u8 = RegMode::Field.bit();
const CURRENT: u8 = RegMode::Current.bit();
const VOLTAGE: u8 = RegMode::Voltage.bit();
const REGULATED: u8 = FIELD | CURRENT | VOLTAGE;
const ANY: u8 = REGULATED | RegMode::None.bit();

fn meas_select_name(select: MeasSelect) -> &'static str {
    match select {
        MeasSelect::Unfiltered => "UNFILTERED",
        MeasSelect::Filtered => "FILTERED",
        MeasSelect::Extrapolated => "EXTRAPOLATED",
    }
}

fn parse_meas_select(value: &ParValue) -> Result<MeasSelect, ValueError> {
    let symbol = value.as_symbol()?;
    [MeasSelect::Unfiltered, MeasSelect::Filtered, MeasSelect::Extrapolated]
        .into_iter()
        .find(|select| meas_select_name(*select).eq_ignore_ascii_case(symbol))
        .ok_or_else(|| ValueError::UnknownSymbol(symbol.to_owned()))
}

fn algorithm_name(algorithm: RstAlgorithm) -> &'static str {
    match algorithm {
        RstAlgorithm::Synthesised => "SYNTHESISED",
        RstAlgorithm::Manual => "MANUAL",
    }
}

fn parse_algorithm(value: &ParValue) -> Result<RstAlgorithm, ValueError> {
    let symbol = value.as_symbol()?;
    [RstAlgorithm::Synthesised, RstAlgorithm::Manual]
        .into_iter()
        .find(|algorithm| algorithm_name(*algorithm).eq_ignore_ascii_case(symbol))
        .ok_or_else(|| ValueError::UnknownSymbol(symbol.to_owned()))
}

fn parse_actuation(value: &ParValue) -> Result<Actuation, ValueError> {
    let symbol = value.as_symbol()?;
    [Actuation::VoltageRef, Actuation::CurrentRef]
        .into_iter()
        .find(|actuation| actuation.to_string().eq_ignore_ascii_case(symbol))
        .ok_or_else(|| ValueError::UnknownSymbol(symbol.to_owned()))
}

fn set_load_field(
    config: &mut RegConfig,
    value: &ParValue,
    field: impl Fn(&mut LoadConfig) -> &mut f64,
) -> Result<(), ValueError> {
    if let ParValue::Floats(_) = value {
        let values: [f64; REG_N_LOADS] = value.as_floats()?;
        for (load, value) in config.loads.iter_mut().zip(values) {
            *field(load) = value;
        }
        return Ok(());
    }
    let value = value.as_float()?;
    let select = config.load_select;
    let load = config.loads.get_mut(select).ok_or(ValueError::OutOfRange {
        value: select as f64,
        reason: "load select out of range",
    })?;
    *field(load) = value;
    Ok(())
}

fn set_load_select(value: &ParValue) -> Result<usize, ValueError> {
    let select = value.as_count::<usize>()?;
    at_most(select, REG_N_LOADS - 1, "load select out of range")
}

macro_rules! load_par {
    ($table:ident, $name:literal, $field:ident) => {
        $table.push(
            ParDescriptor::new($name, ParType::Float, REG_N_LOADS, REGULATED, |mgr| {
                ParValue::Floats(mgr.config().loads.iter().map(|load| load.$field).collect())
            })
            .settable(ChangeGroups::LOAD, |config, value| {
                set_load_field(config, value, |load| &mut load.$field)
            })
            .load_indexed(),
        );
    };
}

macro_rules! float_par {
    ($table:ident, $name:expr, $modes:expr, $group:expr, $($path:tt)+) => {
        $table.push(
            ParDescriptor::new($name, ParType::Float, 1, $modes, |mgr| {
                ParValue::Float(mgr.config().$($path)+)
            })
            .settable($group, |config, value| {
                config.$($path)+ = value.as_float()?;
                Ok(())
            }),
        );
    };
}

macro_rules! rst_pars {
    ($table:ident, $b:literal, $set:literal, $signal:ident, $modes:expr, $source:literal) => {
        $table.push(
            ParDescriptor::new(concat!("REG_", $b, $set, "ALGORITHM"), ParType::Enum, 1, $modes, |mgr| {
                ParValue::Enum(algorithm_name(mgr.config().$signal.rst[$source].algorithm).to_owned())
            })
            .settable(ChangeGroups::RST, |config, value| {
                config.$signal.rst[$source].algorithm = parse_algorithm(value)?;
                Ok(())
            }),
        );
        $table.push(
            ParDescriptor::new(concat!("REG_", $b, $set, "AUXPOLE_HZ"), ParType::Float, 1, $modes, |mgr| {
                ParValue::Float(mgr.config().$signal.rst[$source].auxpole_hz)
            })
            .settable(ChangeGroups::RST, |config, value| {
                config.$signal.rst[$source].auxpole_hz = positive(value.as_float()?)?;
                Ok(())
            }),
        );
        float_par!($table, concat!("REG_", $b, $set, "AUXPOLE_Z"), $modes, ChangeGroups::RST, $signal.rst[$source].auxpole_z);
        float_par!(
            $table,
            concat!("REG_", $b, $set, "PURE_DELAY_PERIODS"),
            $modes,
            ChangeGroups::RST,
            $signal.rst[$source].pure_delay_periods
        );
        float_par!(
            $table,
            concat!("REG_", $b, $set, "TRACK_DELAY_PERIODS"),
            $modes,
            ChangeGroups::RST,
            $signal.rst[$source].track_delay_periods
        );
        $table.push(
            ParDescriptor::new(concat!("REG_", $b, $set, "MANUAL_R"), ParType::Float, REG_N_RST_COEFFS, $modes, |mgr| {
                ParValue::Floats(mgr.config().$signal.rst[$source].manual.r.to_vec())
            })
            .settable(ChangeGroups::RST, |config, value| {
                config.$signal.rst[$source].manual.r = value.as_floats()?;
                Ok(())
            }),
        );
        $table.push(
            ParDescriptor::new(concat!("REG_", $b, $set, "MANUAL_S"), ParType::Float, REG_N_RST_COEFFS, $modes, |mgr| {
                ParValue::Floats(mgr.config().$signal.rst[$source].manual.s.to_vec())
            })
            .settable(ChangeGroups::RST, |config, value| {
                config.$signal.rst[$source].manual.s = value.as_floats()?;
                Ok(())
            }),
        );
        $table.push(
            ParDescriptor::new(concat!("REG_", $b, $set, "MANUAL_T"), ParType::Float, REG_N_RST_COEFFS, $modes, |mgr| {
                ParValue::Floats(mgr.config().$signal.rst[$source].manual.t.to_vec())
            })
            .settable(ChangeGroups::RST, |config, value| {
                config.$signal.rst[$source].manual.t = value.as_floats()?;
                Ok(())
            }),
        );
    };
}

macro_rules! signal_pars {
    ($table:ident, $b:literal, $signal:ident, $kind:expr, $modes:expr) => {
        $table.push(
            ParDescriptor::new(concat!("REG_", $b, "_ENABLED"), ParType::Bool, 1, ANY, |mgr| {
                ParValue::Bool(mgr.config().$signal.enabled)
            })
            .settable(ChangeGroups::LIMITS | ChangeGroups::RST, |config, value| {
                config.$signal.enabled = value.as_bool()?;
                Ok(())
            }),
        );
        $table.push(
            ParDescriptor::new(concat!("REG_", $b, "_PERIOD_ITERS"), ParType::Int, 1, $modes, |mgr| {
                ParValue::Int(i64::from(mgr.config().$signal.reg_period_iters))
            })
            .settable(ChangeGroups::RST, |config, value| {
                let iters: u32 = value.as_count()?;
                if iters == 0 {
                    return Err(ValueError::OutOfRange {
                        value: 0.0,
                        reason: "must be at least one iteration",
                    });
                }
                config.$signal.reg_period_iters = iters;
                Ok(())
            }),
        );
        $table.push(
            ParDescriptor::new(concat!("LIMITS_", $b, "_INVERT"), ParType::Bool, 1, $modes, |mgr| {
                ParValue::Bool(mgr.config().$signal.invert_limits)
            })
            .settable(ChangeGroups::LIMITS, |config, value| {
                config.$signal.invert_limits = value.as_bool()?;
                Ok(())
            }),
        );
        float_par!($table, concat!("LIMITS_", $b, "_POS"), $modes, ChangeGroups::LIMITS, $signal.limits.pos);
        float_par!($table, concat!("LIMITS_", $b, "_MIN"), $modes, ChangeGroups::LIMITS, $signal.limits.min);
        float_par!($table, concat!("LIMITS_", $b, "_NEG"), $modes, ChangeGroups::LIMITS, $signal.limits.neg);
        float_par!($table, concat!("LIMITS_", $b, "_RATE"), $modes, ChangeGroups::LIMITS, $signal.limits.rate);
        float_par!(
            $table,
            concat!("LIMITS_", $b, "_ACCELERATION"),
            $modes,
            ChangeGroups::LIMITS,
            $signal.limits.acceleration
        );
        float_par!(
            $table,
            concat!("LIMITS_", $b, "_CLOSELOOP"),
            $modes,
            ChangeGroups::LIMITS,
            $signal.limits.closeloop
        );
        float_par!($table, concat!("LIMITS_", $b, "_LOW"), $modes, ChangeGroups::LIMITS, $signal.meas.limits.low);
        float_par!($table, concat!("LIMITS_", $b, "_ZERO"), $modes, ChangeGroups::LIMITS, $signal.meas.limits.zero);
        float_par!(
            $table,
            concat!("LIMITS_", $b, "_ERR_WARNING"),
            $modes,
            ChangeGroups::LIMITS,
            $signal.err.warning
        );
        float_par!($table, concat!("LIMITS_", $b, "_ERR_FAULT"), $modes, ChangeGroups::LIMITS, $signal.err.fault);

        $table.push(
            ParDescriptor::new(concat!("MEAS_", $b, "_FIR_LENGTHS"), ParType::Int, 2, $modes, |mgr| {
                ParValue::Ints(counts(&mgr.config().$signal.meas.fir_lengths))
            })
            .settable(ChangeGroups::MEAS, |config, value| {
                let lengths: [usize; 2] = value.as_counts()?;
                for length in lengths {
                    at_most(length, REG_MEAS_FIR_CAPACITY, "longer than the FIR buffer")?;
                }
                config.$signal.meas.fir_lengths = lengths;
                Ok(())
            }),
        );
        $table.push(
            ParDescriptor::new(concat!("MEAS_", $b, "_EXTRAPOLATION_LEN"), ParType::Int, 1, $modes, |mgr| {
                ParValue::Int(count(mgr.config().$signal.meas.extrapolation_len))
            })
            .settable(ChangeGroups::MEAS, |config, value| {
                config.$signal.meas.extrapolation_len = value.as_count()?;
                Ok(())
            }),
        );
        float_par!(
            $table,
            concat!("MEAS_", $b, "_DELAY_ITERS"),
            $modes,
            ChangeGroups::MEAS,
            $signal.meas.delay_iters
        );
        $table.push(
            ParDescriptor::new(concat!("MEAS_", $b, "_REG_SELECT"), ParType::Enum, 1, $modes, |mgr| {
                ParValue::Enum(meas_select_name(mgr.config().$signal.meas.reg_select).to_owned())
            })
            .settable(ChangeGroups::MEAS, |config, value| {
                config.$signal.meas.reg_select = parse_meas_select(value)?;
                Ok(())
            }),
        );
        $table.push(
            ParDescriptor::new(concat!("MEAS_", $b, "_RATE_PERIOD_ITERS"), ParType::Int, 1, $modes, |mgr| {
                ParValue::Int(i64::from(mgr.config().$signal.meas.rate_period_iters))
            })
            .settable(ChangeGroups::MEAS, |config, value| {
                let iters: u32 = value.as_count()?;
                if iters == 0 {
                    return Err(ValueError::OutOfRange {
                        value: 0.0,
                        reason: "must be at least one iteration",
                    });
                }
                config.$signal.meas.rate_period_iters = iters;
                Ok(())
            }),
        );

        rst_pars!($table, $b, "_", $signal, $modes, 0);
        rst_pars!($table, $b, "_TEST_", $signal, $modes, 1);

        $table.push(ParDescriptor::new(
            concat!("MEAS_", $b, "_UNFILTERED"),
            ParType::Float,
            1,
            ANY,
            |mgr| ParValue::Float(mgr.signal($kind).meas().unfiltered),
        ));
        $table.push(ParDescriptor::new(
            concat!("MEAS_", $b, "_FILTERED"),
            ParType::Float,
            1,
            ANY,
            |mgr| ParValue::Float(mgr.signal($kind).meas().filtered),
        ));
        $table.push(ParDescriptor::new(
            concat!("MEAS_", $b, "_EXTRAPOLATED"),
            ParType::Float,
            1,
            ANY,
            |mgr| ParValue::Float(mgr.signal($kind).meas().extrapolated),
        ));
        $table.push(ParDescriptor::new(concat!("MEAS_", $b, "_RATE"), ParType::Float, 1, ANY, |mgr| {
            ParValue::Float(mgr.signal($kind).meas_rate())
        }));
        $table.push(ParDescriptor::new(
            concat!("MEAS_", $b, "_INVALID_COUNT"),
            ParType::Int,
            1,
            ANY,
            |mgr| ParValue::Int(count(mgr.signal($kind).counters().snapshot().invalid_meas)),
        ));
        $table.push(ParDescriptor::new(concat!("REG_", $b, "_ERR"), ParType::Float, 1, $modes, |mgr| {
            ParValue::Float(mgr.signal($kind).err().err())
        }));
        $table.push(ParDescriptor::new(
            concat!("REG_", $b, "_MAX_ABS_ERR"),
            ParType::Float,
            1,
            $modes,
            |mgr| ParValue::Float(mgr.signal($kind).err().max_abs_err()),
        ));
        $table.push(ParDescriptor::new(concat!("REG_", $b, "_STATUS"), ParType::Enum, 1, $modes, |mgr| {
            ParValue::Enum(mgr.signal($kind).rst(mgr.rst_source()).status().name().to_owned())
        }));
        $table.push(ParDescriptor::new(
            concat!("REG_", $b, "_MODULUS_MARGIN"),
            ParType::Float,
            1,
            $modes,
            |mgr| ParValue::Float(mgr.signal($kind).rst(mgr.rst_source()).modulus_margin()),
        ));
        $table.push(ParDescriptor::new(
            concat!("REG_", $b, "_ACTIVE_TRACK_DELAY"),
            ParType::Float,
            1,
            $modes,
            |mgr| ParValue::Float(mgr.signal($kind).rst(mgr.rst_source()).track_delay_periods()),
        ));
        $table.push(ParDescriptor::new(
            concat!("REG_", $b, "_R"),
            ParType::Float,
            REG_N_RST_COEFFS,
            $modes,
            |mgr| ParValue::Floats(mgr.signal($kind).rst(mgr.rst_source()).coeffs().r.to_vec()),
        ));
        $table.push(ParDescriptor::new(
            concat!("REG_", $b, "_S"),
            ParType::Float,
            REG_N_RST_COEFFS,
            $modes,
            |mgr| ParValue::Floats(mgr.signal($kind).rst(mgr.rst_source()).coeffs().s.to_vec()),
        ));
        $table.push(ParDescriptor::new(
            concat!("REG_", $b, "_T"),
            ParType::Float,
            REG_N_RST_COEFFS,
            $modes,
            |mgr| ParValue::Floats(mgr.signal($kind).rst(mgr.rst_source()).coeffs().t.to_vec()),
        ));
    };
}

macro_rules! sim_chain_pars {
    ($table:ident, $b:literal, $chain:ident) => {
        float_par!($table, concat!("SIM_", $b, "_DELAY_ITERS"), ANY, ChangeGroups::SIM, sim.$chain.delay_iters);
        float_par!($table, concat!("SIM_", $b, "_NOISE_PP"), ANY, ChangeGroups::SIM, sim.$chain.noise_pp);
        float_par!($table, concat!("SIM_", $b, "_TONE_AMP"), ANY, ChangeGroups::SIM, sim.$chain.tone_amp);
        $table.push(
            ParDescriptor::new(concat!("SIM_", $b, "_TONE_HALF_PERIOD_ITERS"), ParType::Int, 1, ANY, |mgr| {
                ParValue::Int(i64::from(mgr.config().sim.$chain.tone_half_period_iters))
            })
            .settable(ChangeGroups::SIM, |config, value| {
                config.sim.$chain.tone_half_period_iters = value.as_count()?;
                Ok(())
            }),
        );
        float_par!(
            $table,
            concat!("SIM_", $b, "_QUANTISATION"),
            ANY,
            ChangeGroups::SIM,
            sim.$chain.quantisation
        );
    };
}

fn build_table() -> Vec<ParDescriptor> {
    let mut table = Vec::new();

    table.push(
        ParDescriptor::new("ITER_PERIOD_US", ParType::Int, 1, ANY, |mgr| {
            ParValue::Int(i64::from(mgr.config().iter_period_us))
        })
        .settable(ChangeGroups::ALL, |config, value| {
            let period: u32 = value.as_count()?;
            if period == 0 {
                return Err(ValueError::OutOfRange {
                    value: 0.0,
                    reason: "must be positive",
                });
            }
            config.iter_period_us = period;
            Ok(())
        }),
    );
    table.push(
        ParDescriptor::new("REG_ACTUATION", ParType::Enum, 1, ANY, |mgr| {
            ParValue::Enum(mgr.config().actuation.to_string())
        })
        .settable(ChangeGroups::SIM, |config, value| {
            config.actuation = parse_actuation(value)?;
            Ok(())
        }),
    );
    table.push(ParDescriptor::new("REG_MODE", ParType::Enum, 1, ANY, |mgr| {
        ParValue::Enum(mgr.mode().name().to_owned())
    }));
    table.push(ParDescriptor::new("REG_RST_SOURCE", ParType::Enum, 1, ANY, |mgr| {
        ParValue::Enum(mgr.rst_source().to_string())
    }));

    table.push(
        ParDescriptor::new("LOAD_SELECT", ParType::Int, 1, REGULATED, |mgr| {
            ParValue::Int(count(mgr.config().load_select))
        })
        .settable(ChangeGroups::LOAD, |config, value| {
            config.load_select = set_load_select(value)?;
            Ok(())
        }),
    );
    table.push(
        ParDescriptor::new("LOAD_TEST_SELECT", ParType::Int, 1, REGULATED, |mgr| {
            ParValue::Int(count(mgr.config().load_test_select))
        })
        .settable(ChangeGroups::LOAD, |config, value| {
            config.load_test_select = set_load_select(value)?;
            Ok(())
        }),
    );
    load_par!(table, "LOAD_OHMS_SER", ohms_ser);
    load_par!(table, "LOAD_OHMS_PAR", ohms_par);
    load_par!(table, "LOAD_OHMS_MAG", ohms_mag);
    load_par!(table, "LOAD_HENRYS", henrys);
    load_par!(table, "LOAD_HENRYS_SAT", henrys_sat);
    load_par!(table, "LOAD_I_SAT_START", i_sat_start);
    load_par!(table, "LOAD_I_SAT_END", i_sat_end);
    load_par!(table, "LOAD_GAUSS_PER_AMP", gauss_per_amp);

    table.push(
        ParDescriptor::new("REG_V_ENABLED", ParType::Bool, 1, ANY, |mgr| {
            ParValue::Bool(mgr.config().voltage.enabled)
        })
        .settable(ChangeGroups::LIMITS, |config, value| {
            config.voltage.enabled = value.as_bool()?;
            Ok(())
        }),
    );
    float_par!(table, "LIMITS_V_POS", REGULATED, ChangeGroups::LIMITS, voltage.limits.pos);
    float_par!(table, "LIMITS_V_NEG", REGULATED, ChangeGroups::LIMITS, voltage.limits.neg);
    float_par!(table, "LIMITS_V_RATE", REGULATED, ChangeGroups::LIMITS, voltage.limits.rate);
    float_par!(table, "LIMITS_I_RMS_WARNING", ANY, ChangeGroups::LIMITS, rms.warning);
    float_par!(table, "LIMITS_I_RMS_FAULT", ANY, ChangeGroups::LIMITS, rms.fault);
    float_par!(table, "LIMITS_I_RMS_TC", ANY, ChangeGroups::LIMITS, rms.filter_tc);
    table.push(ParDescriptor::new("MEAS_V_UNFILTERED", ParType::Float, 1, ANY, |mgr| {
        ParValue::Float(mgr.voltage_meas())
    }));
    table.push(ParDescriptor::new("MEAS_I_RMS", ParType::Float, 1, ANY, |mgr| {
        ParValue::Float(mgr.rms().rms())
    }));

    signal_pars!(table, "B", field, SignalKind::Field, FIELD);
    signal_pars!(table, "I", current, SignalKind::Current, CURRENT);

    float_par!(table, "VS_BANDWIDTH", ANY, ChangeGroups::VS, vs.bandwidth);
    float_par!(table, "VS_Z", ANY, ChangeGroups::VS, vs.z);
    float_par!(table, "VS_TAU_ZERO", ANY, ChangeGroups::VS, vs.tau_zero);
    table.push(
        ParDescriptor::new("VS_NUM", ParType::Float, VS_N_COEFFS, ANY, |mgr| {
            ParValue::Floats(mgr.config().vs.num.to_vec())
        })
        .settable(ChangeGroups::VS, |config, value| {
            config.vs.num = value.as_floats()?;
            Ok(())
        }),
    );
    table.push(
        ParDescriptor::new("VS_DEN", ParType::Float, VS_N_COEFFS, ANY, |mgr| {
            ParValue::Floats(mgr.config().vs.den.to_vec())
        })
        .settable(ChangeGroups::VS, |config, value| {
            config.vs.den = value.as_floats()?;
            Ok(())
        }),
    );

    sim_chain_pars!(table, "B", field);
    sim_chain_pars!(table, "I", current);
    sim_chain_pars!(table, "V", voltage);
    table.push(
        ParDescriptor::new("SIM_SEED", ParType::Int, 1, ANY, |mgr| {
            ParValue::Int(count(mgr.config().sim.seed))
        })
        .settable(ChangeGroups::SIM, |config, value| {
            config.sim.seed = value.as_count()?;
            Ok(())
        }),
    );

    debug!(parameters = table.len(), "parameter table built");
    table
}

/// Every parameter, in declaration order.
pub struct ParTable {
    pars: Vec<ParDescriptor>,
}

impl ParTable {
    /// Build the table.
    pub fn new() -> Self {
        Self { pars: build_table() }
    }

    /// Descriptor of the parameter called `name`, ignoring case.
    pub fn find(&self, name: &str) -> Option<&ParDescriptor> {
        self.pars.iter().find(|par| par.name.eq_ignore_ascii_case(name))
    }

    /// Descriptors in declaration order.
    pub fn iter(&self) -> std::slice::Iter<'_, ParDescriptor> {
        self.pars.iter()
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.pars.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.pars.is_empty()
    }
}

impl Default for ParTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ParTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParTable").field("len", &self.pars.len()).finish()
    }
}

impl<'a> IntoIterator for &'a ParTable {
    type Item = &'a ParDescriptor;
    type IntoIter = std::slice::Iter<'a, ParDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.pars.iter()
    }
}

impl RegMgr {
    /// Value of the parameter called `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ParError::Unknown`] for an unknown name.
    pub fn par_get(&self, name: &str) -> Result<ParValue, ParError> {
        let par = self.par_table().find(name).ok_or_else(|| ParError::Unknown(name.to_owned()))?;
        Ok(par.get(self))
    }

    /// Set the parameter called `name` and mark its change group.
    ///
    /// The configuration is left untouched when the value is rejected.
    ///
    /// # Errors
    ///
    /// Returns [`ParError::Unknown`], [`ParError::ReadOnly`] or
    /// [`ParError::Value`] when the value does not fit.
    pub fn par_set(&mut self, name: &str, value: &ParValue) -> Result<(), ParError> {
        let par = *self.par_table().find(name).ok_or_else(|| ParError::Unknown(name.to_owned()))?;
        let set = par.set.ok_or(ParError::ReadOnly(par.name))?;

        let mut config = *self.config();
        set(&mut config, value).map_err(|source| ParError::Value { name: par.name, source })?;
        *self.config_mut(par.group) = config;
        debug!(name = par.name, %value, "parameter set");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RstSource;
    use crate::error::RegError;
    use std::collections::HashSet;

    #[test]
    fn test_names_are_unique_and_upper_case() {
        let table = ParTable::new();
        let mut names = HashSet::new();
        for par in &table {
            assert!(names.insert(par.name), "duplicate {}", par.name);
            assert_eq!(par.name, par.name.to_ascii_uppercase());
        }
        assert!(table.len() > 100);
    }

    #[test]
    fn test_every_getter_matches_its_descriptor() -> Result<(), RegError> {
        let mgr = RegMgr::with_config(RegConfig::default())?;
        for par in mgr.par_table() {
            let value = par.get(&mgr);
            assert_eq!(value.par_type(), par.par_type, "{}", par.name);
            assert_eq!(value.len(), par.len, "{}", par.name);
            assert_eq!(par.read_only(), par.group.is_empty(), "{}", par.name);
        }
        Ok(())
    }

    #[test]
    fn test_every_settable_parameter_accepts_its_own_value() -> Result<(), Box<dyn std::error::Error>> {
        let mut mgr = RegMgr::with_config(RegConfig::default())?;
        let table = ParTable::new();
        for par in table.iter().filter(|par| !par.read_only()) {
            let value = par.get(&mgr);
            mgr.par_set(par.name, &value)?;
        }
        assert_eq!(*mgr.config(), RegConfig::default());
        assert_eq!(mgr.changed(), ChangeGroups::ALL);
        Ok(())
    }

    #[test]
    fn test_load_parameter_scalar_sets_selected_load() -> Result<(), Box<dyn std::error::Error>> {
        let mut mgr = RegMgr::with_config(RegConfig::default())?;
        mgr.par_set("LOAD_SELECT", &ParValue::Int(2))?;
        mgr.par_set("load_henrys", &ParValue::Float(0.5))?;

        let henrys = mgr.par_get("LOAD_HENRYS")?;
        let default = LoadConfig::default().henrys;
        assert_eq!(henrys, ParValue::Floats(vec![default, default, 0.5, default]));
        assert!(mgr.par_table().find("LOAD_HENRYS").is_some_and(|par| par.load_select));
        Ok(())
    }

    #[test]
    fn test_rejected_value_leaves_config_unchanged() -> Result<(), RegError> {
        let mut mgr = RegMgr::with_config(RegConfig::default())?;
        let err = mgr.par_set("MEAS_I_FIR_LENGTHS", &ParValue::Ints(vec![4]));
        assert_eq!(
            err,
            Err(ParError::Value {
                name: "MEAS_I_FIR_LENGTHS",
                source: ValueError::ArrayLength { expected: 2, got: 1 },
            })
        );
        assert!(matches!(
            mgr.par_set("LOAD_SELECT", &ParValue::Int(4)),
            Err(ParError::Value { .. })
        ));
        assert!(matches!(
            mgr.par_set("LIMITS_I_POS", &ParValue::Bool(true)),
            Err(ParError::Value {
                source: ValueError::TypeMismatch { .. },
                ..
            })
        ));
        assert!(mgr.changed().is_empty());
        assert_eq!(*mgr.config(), RegConfig::default());
        Ok(())
    }

    #[test]
    fn test_read_only_and_unknown() -> Result<(), RegError> {
        let mut mgr = RegMgr::with_config(RegConfig::default())?;
        assert_eq!(
            mgr.par_set("REG_I_STATUS", &ParValue::Enum("OK".into())),
            Err(ParError::ReadOnly("REG_I_STATUS"))
        );
        assert_eq!(
            mgr.par_get("NO_SUCH_PAR"),
            Err(ParError::Unknown("NO_SUCH_PAR".into()))
        );
        assert_eq!(mgr.par_get("REG_I_STATUS"), Ok(ParValue::Enum("OK".into())));
        Ok(())
    }

    #[test]
    fn test_rst_parameter_change_is_published() -> Result<(), Box<dyn std::error::Error>> {
        let mut mgr = RegMgr::with_config(RegConfig::default())?;
        mgr.par_set("REG_I_TEST_AUXPOLE_HZ", &ParValue::Float(12.0))?;
        mgr.par_set("MEAS_I_REG_SELECT", &ParValue::Enum("unfiltered".into()))?;
        assert!(mgr.changed().intersects(ChangeGroups::RST | ChangeGroups::MEAS));

        let report = mgr.apply_changed_parameters()?;
        assert_eq!(report.rst_published, 4);
        assert!(mgr.rst_publisher().is_pending(SignalKind::Current, RstSource::Test));
        assert_eq!(mgr.signal(SignalKind::Current).reg_select(), MeasSelect::Unfiltered);
        Ok(())
    }

    #[test]
    fn test_mode_masks() {
        let table = ParTable::new();
        let field_pos = table.find("LIMITS_B_POS");
        assert!(field_pos.is_some_and(|par| par.applies_to(RegMode::Field) && !par.applies_to(RegMode::Current)));
        let v_pos = table.find("LIMITS_V_POS");
        assert!(v_pos.is_some_and(|par| par.applies_to(RegMode::Voltage) && !par.applies_to(RegMode::None)));
    }

    #[test]
    fn test_tables_are_independent_and_complete() -> Result<(), RegError> {
        let first = ParTable::new();
        let second = ParTable::default();
        assert_eq!(first.len(), second.len());
        assert!(first.iter().zip(&second).all(|(a, b)| a.name == b.name));

        let mgr = RegMgr::with_config(RegConfig::default())?;
        assert_eq!(mgr.par_table().len(), first.len());
        assert!(first.find("iter_period_us").is_some());
        assert!(first.find("NO_SUCH_PARAMETER").is_none());
        assert_eq!(format!("{first:?}"), format!("ParTable {{ len: {} }}", first.len()));
        Ok(())
    }

    #[test]
    fn test_value_display() {
        insta::assert_snapshot!(ParValue::Floats(vec![1.0, 2.5]).to_string(), @"1,2.5");
        insta::assert_snapshot!(ParValue::Bool(true).to_string(), @"ENABLED");
        let err = ParError::Value {
            name: "LIMITS_I_POS",
            source: ValueError::TypeMismatch {
                expected: ParType::Float,
                got: ParType::Bool,
            },
        };
        insta::assert_snapshot!(err.to_string(), @"parameter LIMITS_I_POS: expected float, got bool");
    }
}
