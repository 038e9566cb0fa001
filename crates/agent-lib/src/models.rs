//! Core data models for the limits agent

use crate::memory::{parse_memory, MemoryParseError};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

/// CPU accounting period used for every quota the agent writes (microseconds)
pub const CPU_PERIOD_MICROS: i64 = 100_000;

/// Smallest CPU quota the runtime accepts (microseconds)
pub const MIN_CPU_QUOTA_MICROS: i64 = 1_000;

/// Desired limit declaration for one container, as stored in the document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSpec {
    /// Memory size token, e.g. `512m`; empty leaves memory unmanaged
    #[serde(default, deserialize_with = "string_or_number")]
    pub memory: String,
    /// Decimal number of CPU cores, e.g. `0.5`
    #[serde(default, deserialize_with = "string_or_number")]
    pub cpus: String,
}

/// Accept `"0.5"` as well as `0.5`.
///
/// Any other JSON value is kept as its text so that it fails validation for
/// its own entry instead of failing the whole document.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

impl ResourceSpec {
    pub fn new(memory: impl Into<String>, cpus: impl Into<String>) -> Self {
        Self {
            memory: memory.into(),
            cpus: cpus.into(),
        }
    }

    /// Parse both fields into the values the runtime is given
    pub fn desired_limits(&self) -> Result<DesiredLimits, SpecError> {
        let memory_bytes = parse_memory(&self.memory)?;
        if i64::try_from(memory_bytes).is_err() {
            return Err(SpecError::MemoryOutOfRange {
                memory: self.memory.clone(),
            });
        }

        let cpus = parse_cpus(&self.cpus)?;
        let cpu_quota = (cpus * CPU_PERIOD_MICROS as f64).round();
        if cpu_quota < MIN_CPU_QUOTA_MICROS as f64 || cpu_quota >= i64::MAX as f64 {
            return Err(SpecError::InvalidCpus {
                cpus: self.cpus.clone(),
            });
        }

        Ok(DesiredLimits {
            memory_bytes,
            cpus,
            cpu_quota: cpu_quota as i64,
            cpu_period: CPU_PERIOD_MICROS,
        })
    }
}

/// Parse a CPU share; it must be a finite decimal greater than zero
pub fn parse_cpus(input: &str) -> Result<f64, SpecError> {
    match input.trim().parse::<f64>() {
        Ok(cpus) if cpus.is_finite() && cpus > 0.0 => Ok(cpus),
        _ => Err(SpecError::InvalidCpus {
            cpus: input.to_string(),
        }),
    }
}

/// Reasons a `ResourceSpec` is rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpecError {
    #[error(transparent)]
    Memory(#[from] MemoryParseError),

    #[error("memory size {memory:?} exceeds the runtime limit")]
    MemoryOutOfRange { memory: String },

    #[error("invalid cpu share {cpus:?}")]
    InvalidCpus { cpus: String },
}

/// Container name -> desired limits
///
/// Keys are operator-chosen container names, not runtime ids.
pub type DesiredState = BTreeMap<String, ResourceSpec>;

/// Parsed desired values for one container
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DesiredLimits {
    pub memory_bytes: u64,
    pub cpus: f64,
    pub cpu_quota: i64,
    pub cpu_period: i64,
}

impl DesiredLimits {
    /// False when no memory limit was declared
    pub fn manages_memory(&self) -> bool {
        self.memory_bytes > 0
    }

    /// Update that brings a container to these limits; swap is capped at memory.
    ///
    /// Unmanaged memory is left out of the update, since the runtime ignores
    /// a zero limit on update.
    pub fn to_update(&self) -> LimitUpdate {
        // desired_limits() guarantees the byte count fits
        let memory = self
            .manages_memory()
            .then(|| i64::try_from(self.memory_bytes).unwrap_or(i64::MAX));
        LimitUpdate {
            memory_bytes: memory,
            memory_swap_bytes: memory,
            cpu_quota: self.cpu_quota,
            cpu_period: self.cpu_period,
        }
    }
}

/// Live resource configuration read from the runtime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveLimits {
    /// Memory limit in bytes (0 = unlimited)
    pub memory_bytes: i64,
    /// CPU CFS period in microseconds
    pub cpu_period: i64,
    /// CPU CFS quota in microseconds
    pub cpu_quota: i64,
}

impl LiveLimits {
    /// Effective CPU cores granted by quota/period
    pub fn effective_cpus(&self) -> f64 {
        if self.cpu_period <= 0 {
            return 0.0;
        }
        self.cpu_quota as f64 / self.cpu_period as f64
    }
}

/// Resource update sent to the runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitUpdate {
    /// `None` leaves the memory limit untouched
    pub memory_bytes: Option<i64>,
    pub memory_swap_bytes: Option<i64>,
    pub cpu_quota: i64,
    pub cpu_period: i64,
}

/// Running container as listed by the runtime
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSummary {
    pub id: String,
    pub name: String,
    pub image: Option<String>,
    pub status: Option<String>,
}

/// Per-container result of one reconcile cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReconcileOutcome {
    AlreadyCorrect,
    Corrected,
    ResolveFailed,
    ApplyFailed,
    InvalidSpec,
}

impl ReconcileOutcome {
    pub const ALL: [ReconcileOutcome; 5] = [
        ReconcileOutcome::AlreadyCorrect,
        ReconcileOutcome::Corrected,
        ReconcileOutcome::ResolveFailed,
        ReconcileOutcome::ApplyFailed,
        ReconcileOutcome::InvalidSpec,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcileOutcome::AlreadyCorrect => "already-correct",
            ReconcileOutcome::Corrected => "corrected",
            ReconcileOutcome::ResolveFailed => "resolve-failed",
            ReconcileOutcome::ApplyFailed => "apply-failed",
            ReconcileOutcome::InvalidSpec => "invalid-spec",
        }
    }

    /// True if the runtime was asked to write new limits
    pub fn attempted_write(&self) -> bool {
        matches!(
            self,
            ReconcileOutcome::Corrected | ReconcileOutcome::ApplyFailed
        )
    }
}

impl std::fmt::Display for ReconcileOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome for one desired-state entry, with the values that were compared
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryReport {
    pub name: String,
    pub outcome: ReconcileOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<LiveLimits>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub desired: Option<DesiredLimits>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// The name did not resolve to a running container
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub not_found: bool,
}

/// Result of one full reconcile cycle
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub entries: Vec<EntryReport>,
    pub duration: Duration,
    /// Why the desired-state document was ignored, if it was
    pub state_error: Option<String>,
}

impl CycleReport {
    pub fn count(&self, outcome: ReconcileOutcome) -> usize {
        self.entries.iter().filter(|e| e.outcome == outcome).count()
    }

    /// Number of update calls issued to the runtime
    pub fn writes(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.outcome.attempted_write())
            .count()
    }

    pub fn get(&self, name: &str) -> Option<&EntryReport> {
        self.entries.iter().find(|e| e.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_desired_limits() {
        let limits = ResourceSpec::new("128m", "0.5").desired_limits().unwrap();
        assert_eq!(limits.memory_bytes, 128 * (1 << 20));
        assert_eq!(limits.cpu_quota, 50_000);
        assert_eq!(limits.cpu_period, 100_000);
    }

    #[test]
    fn test_desired_quota_rounds() {
        // 0.3 * 100000 is 29999.999999999996 in floating point
        let limits = ResourceSpec::new("64m", "0.3").desired_limits().unwrap();
        assert_eq!(limits.cpu_quota, 30_000);
    }

    #[test]
    fn test_invalid_cpus() {
        for cpus in ["", "abc", "0", "-1", "NaN", "inf"] {
            let err = ResourceSpec::new("64m", cpus).desired_limits().unwrap_err();
            assert!(matches!(err, SpecError::InvalidCpus { .. }), "{cpus:?}");
        }
    }

    #[test]
    fn test_invalid_memory() {
        let err = ResourceSpec::new("lots", "1.0").desired_limits().unwrap_err();
        assert!(matches!(err, SpecError::Memory(_)));

        let err = ResourceSpec::new("10000000000g", "1.0")
            .desired_limits()
            .unwrap_err();
        assert!(matches!(err, SpecError::MemoryOutOfRange { .. }));
    }

    #[test]
    fn test_update_caps_swap_at_memory() {
        let update = ResourceSpec::new("256m", "1.0")
            .desired_limits()
            .unwrap()
            .to_update();
        assert_eq!(update.memory_bytes, Some(256 * (1 << 20)));
        assert_eq!(update.memory_swap_bytes, update.memory_bytes);
        assert_eq!(update.cpu_quota, 100_000);
    }

    #[test]
    fn test_update_leaves_unmanaged_memory_alone() {
        let limits = ResourceSpec::new("", "0.5").desired_limits().unwrap();
        assert!(!limits.manages_memory());

        let update = limits.to_update();
        assert_eq!(update.memory_bytes, None);
        assert_eq!(update.memory_swap_bytes, None);
        assert_eq!(update.cpu_quota, 50_000);
    }

    #[test]
    fn test_quota_below_runtime_minimum_is_invalid() {
        for cpus in ["0.000001", "0.001", "0.0099"] {
            let err = ResourceSpec::new("64m", cpus).desired_limits().unwrap_err();
            assert!(matches!(err, SpecError::InvalidCpus { .. }), "{cpus:?}");
        }
        let limits = ResourceSpec::new("64m", "0.01").desired_limits().unwrap();
        assert_eq!(limits.cpu_quota, MIN_CPU_QUOTA_MICROS);
    }

    #[test]
    fn test_effective_cpus() {
        let live = LiveLimits {
            memory_bytes: 0,
            cpu_period: 100_000,
            cpu_quota: 150_000,
        };
        assert!((live.effective_cpus() - 1.5).abs() < f64::EPSILON);

        let unset = LiveLimits::default();
        assert_eq!(unset.effective_cpus(), 0.0);
    }

    #[test]
    fn test_spec_deserialize_document() {
        let doc = r#"{
            "web-app": {"memory": "512m", "cpus": "1.0"},
            "cache":   {"memory": "256m", "cpus": "0.5"}
        }"#;
        let state: DesiredState = serde_json::from_str(doc).unwrap();
        assert_eq!(state.len(), 2);
        assert_eq!(state["cache"], ResourceSpec::new("256m", "0.5"));
    }

    #[test]
    fn test_spec_accepts_numbers_and_isolates_odd_values() {
        let doc = r#"{
            "numeric": {"memory": 1048576, "cpus": 0.5},
            "flagged": {"memory": "64m", "cpus": true},
            "nulled":  {"memory": null, "cpus": "1.0"}
        }"#;
        let state: DesiredState = serde_json::from_str(doc).unwrap();

        assert_eq!(state["numeric"], ResourceSpec::new("1048576", "0.5"));
        assert!(state["numeric"].desired_limits().is_ok());

        let err = state["flagged"].desired_limits().unwrap_err();
        assert!(matches!(err, SpecError::InvalidCpus { .. }));

        assert_eq!(state["nulled"].memory, "");
        assert!(state["nulled"].desired_limits().is_ok());
    }

    #[test]
    fn test_outcome_serializes_kebab_case() {
        let json = serde_json::to_string(&ReconcileOutcome::AlreadyCorrect).unwrap();
        assert_eq!(json, "\"already-correct\"");
    }
}
