//! Name-keyed registry of function types.
//!
//! The registry maps every function name to an arming routine that reads its
//! parameters from a [`FgConfigSet`]. Limits can be supplied per call through
//! the [`ArmContext`] or injected once through a limits source, which lets
//! the owner of the limits (the regulation manager) stay decoupled from the
//! generator.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::FgError;
use crate::function::{ArmContext, ArmedFunction, FunctionKind};
use crate::limits::FgLimits;
use crate::plep::{Plep, PlepConfig};
use crate::pppl::{Pppl, PpplConfig};
use crate::pulse::{Pulse, PulseConfig};
use crate::ramp::{Ramp, RampConfig};
use crate::table::{Table, TableConfig};
use crate::test_wave::{TestConfig, TestKind, TestWave};
use crate::trim::{Trim, TrimConfig, TrimKind};

/// Parameters for every function type.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FgConfigSet {
    /// PLEP parameters.
    pub plep: PlepConfig,
    /// RAMP parameters.
    pub ramp: RampConfig,
    /// PPPL parameters.
    pub pppl: PpplConfig,
    /// TABLE parameters.
    pub table: TableConfig,
    /// LTRIM and CTRIM parameters.
    pub trim: TrimConfig,
    /// PULSE parameters.
    pub pulse: PulseConfig,
    /// STEPS, SQUARE, SINE and COSINE parameters.
    pub test: TestConfig,
}

/// Error returned when arming by name.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistryError {
    /// No function type has this name.
    #[error("unknown function type: {0}")]
    UnknownFunction(String),

    /// The function rejected its parameters.
    #[error(transparent)]
    Arm(#[from] FgError),
}

type ArmFn = fn(&ArmContext, &FgConfigSet) -> Result<ArmedFunction, FgError>;

/// One registered function type.
#[derive(Debug, Clone, Copy)]
pub struct FgRegistryEntry {
    /// Function type.
    pub kind: FunctionKind,
    arm: ArmFn,
}

impl FgRegistryEntry {
    /// Registry name.
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }
}

/// Entries in [`FunctionKind::ALL`] order.
static ENTRIES: [FgRegistryEntry; 11] = [
    FgRegistryEntry {
        kind: FunctionKind::Plep,
        arm: |ctx, set| Plep::arm(ctx, &set.plep),
    },
    FgRegistryEntry {
        kind: FunctionKind::Ramp,
        arm: |ctx, set| Ramp::arm(ctx, &set.ramp),
    },
    FgRegistryEntry {
        kind: FunctionKind::Pppl,
        arm: |ctx, set| Pppl::arm(ctx, &set.pppl),
    },
    FgRegistryEntry {
        kind: FunctionKind::Table,
        arm: |ctx, set| Table::arm(ctx, &set.table),
    },
    FgRegistryEntry {
        kind: FunctionKind::Ltrim,
        arm: |ctx, set| Trim::arm(TrimKind::Linear, ctx, &set.trim),
    },
    FgRegistryEntry {
        kind: FunctionKind::Ctrim,
        arm: |ctx, set| Trim::arm(TrimKind::Cubic, ctx, &set.trim),
    },
    FgRegistryEntry {
        kind: FunctionKind::Pulse,
        arm: |ctx, set| Pulse::arm(ctx, &set.pulse),
    },
    FgRegistryEntry {
        kind: FunctionKind::Steps,
        arm: |ctx, set| TestWave::arm(TestKind::Steps, ctx, &set.test),
    },
    FgRegistryEntry {
        kind: FunctionKind::Square,
        arm: |ctx, set| TestWave::arm(TestKind::Square, ctx, &set.test),
    },
    FgRegistryEntry {
        kind: FunctionKind::Sine,
        arm: |ctx, set| TestWave::arm(TestKind::Sine, ctx, &set.test),
    },
    FgRegistryEntry {
        kind: FunctionKind::Cosine,
        arm: |ctx, set| TestWave::arm(TestKind::Cosine, ctx, &set.test),
    },
];

/// Source of limits for functions armed without explicit limits.
pub type LimitsSource = Box<dyn Fn(FunctionKind) -> Option<FgLimits> + Send + Sync>;

/// Registry of function types.
///
/// # Example
///
/// ```
/// use powerconv_fg::{ArmContext, FgConfigSet, FgLimits, FgRegistry};
///
/// let registry = FgRegistry::new()
///     .with_limits_source(|_| Some(FgLimits::new(10.0, 0.0, -10.0, 0.0, 0.0)));
///
/// let mut set = FgConfigSet::default();
/// set.trim.final_ref = 20.0;
/// set.trim.duration = 1.0;
///
/// // 20 is outside the injected limits
/// assert!(registry.arm_by_name("ltrim", &set, &ArmContext::default()).is_err());
/// ```
#[derive(Default)]
pub struct FgRegistry {
    limits_source: Option<LimitsSource>,
}

impl std::fmt::Debug for FgRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FgRegistry")
            .field("entries", &ENTRIES.len())
            .field("limits_source", &self.limits_source.is_some())
            .finish()
    }
}

impl FgRegistry {
    /// Registry without a limits source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inject a limits source used when the context carries no limits.
    pub fn with_limits_source<F>(mut self, source: F) -> Self
    where
        F: Fn(FunctionKind) -> Option<FgLimits> + Send + Sync + 'static,
    {
        self.limits_source = Some(Box::new(source));
        self
    }

    /// All registered function types.
    pub fn entries(&self) -> &'static [FgRegistryEntry] {
        &ENTRIES
    }

    /// Find a function type by name, ignoring case.
    pub fn lookup(&self, name: &str) -> Option<&'static FgRegistryEntry> {
        ENTRIES
            .iter()
            .find(|entry| entry.name().eq_ignore_ascii_case(name))
    }

    /// Arm a function of the given type.
    ///
    /// # Errors
    ///
    /// Returns the arming error of the function type.
    pub fn arm(
        &self,
        kind: FunctionKind,
        set: &FgConfigSet,
        ctx: &ArmContext,
    ) -> Result<ArmedFunction, FgError> {
        let mut ctx = *ctx;
        if ctx.limits.is_none() {
            if let Some(source) = &self.limits_source {
                ctx.limits = source(kind);
            }
        }

        let entry = &ENTRIES[kind as usize];

        match (entry.arm)(&ctx, set) {
            Ok(function) => {
                debug!(
                    function = %kind,
                    start = function.meta().time.start,
                    duration = function.meta().time.duration,
                    final_ref = function.meta().range.final_ref,
                    "function armed"
                );
                Ok(function)
            }
            Err(error) => {
                warn!(function = %kind, code = error.kind().code(), index = error.index(), %error, "function rejected");
                Err(error)
            }
        }
    }

    /// Arm a function by registry name.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownFunction`] for an unknown name and
    /// [`RegistryError::Arm`] when the function rejects its parameters.
    pub fn arm_by_name(
        &self,
        name: &str,
        set: &FgConfigSet,
        ctx: &ArmContext,
    ) -> Result<ArmedFunction, RegistryError> {
        let entry = self
            .lookup(name)
            .ok_or_else(|| RegistryError::UnknownFunction(name.to_string()))?;
        Ok(self.arm(entry.kind, set, ctx)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::FgPhase;

    #[test]
    fn test_every_kind_is_registered_once() {
        let registry = FgRegistry::new();
        for kind in FunctionKind::ALL {
            let matches = registry.entries().iter().filter(|e| e.kind == kind).count();
            assert_eq!(matches, 1, "{kind}");
            assert_eq!(registry.lookup(&kind.name().to_lowercase()).map(|e| e.kind), Some(kind));
        }
    }

    #[test]
    fn test_entries_follow_kind_order() {
        for (entry, kind) in ENTRIES.iter().zip(FunctionKind::ALL) {
            assert_eq!(entry.kind, kind);
        }
    }

    #[test]
    fn test_unknown_name() {
        let err = FgRegistry::new().arm_by_name("TRIANGLE", &FgConfigSet::default(), &ArmContext::default());
        assert_eq!(err.map(|_| ()), Err(RegistryError::UnknownFunction("TRIANGLE".into())));
    }

    #[test]
    fn test_default_parameters_arm_every_kind() -> Result<(), RegistryError> {
        let registry = FgRegistry::new();
        let set = FgConfigSet::default();
        for entry in registry.entries() {
            let mut function = registry.arm_by_name(entry.name(), &set, &ArmContext::default())?;
            let end = function.meta().time.end;
            assert_eq!(function.generate(end + 1.0).0, FgPhase::Post);
        }
        Ok(())
    }

    #[test]
    fn test_context_limits_override_source() -> Result<(), RegistryError> {
        let registry = FgRegistry::new()
            .with_limits_source(|_| Some(FgLimits::new(0.5, 0.0, -0.5, 0.0, 0.0)));
        let mut set = FgConfigSet::default();
        set.pulse.reference = 1.0;
        set.pulse.duration = 1.0;

        assert!(registry.arm_by_name("PULSE", &set, &ArmContext::default()).is_err());

        let ctx = ArmContext::default().with_limits(FgLimits::new(2.0, 0.0, -2.0, 0.0, 0.0));
        registry.arm_by_name("PULSE", &set, &ctx)?;
        Ok(())
    }
}
