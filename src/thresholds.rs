use std::collections::BTreeMap;
use std::fmt;

use crate::error::AnalysisError;

/// Identifies one named threshold in the policy.
///
/// Enum-keyed so a mistyped name is a compile error, not a silent no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum ThresholdId {
    ImbalanceOperations = 0,
    SmallBytes = 1,
    SmallRequests = 2,
    SmallRequestsAbsolute = 3,
    MisalignedRequests = 4,
    MetadataTimeRank = 5,
    RandomOperations = 6,
    RandomOperationsAbsolute = 7,
    ImbalanceStragglers = 8,
    ImbalanceSize = 9,
    InterfaceStdio = 10,
    CollectiveOperations = 11,
    CollectiveOperationsAbsolute = 12,
}

/// Number of thresholds in the policy.
pub const THRESHOLD_COUNT: usize = 13;

/// Value domain of a threshold, used for override validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdKind {
    /// Fraction in [0, 1].
    Ratio,
    /// Absolute byte size, >= 0.
    Bytes,
    /// Absolute operation count, >= 0.
    Count,
    /// Time in seconds, >= 0.
    Seconds,
}

impl ThresholdId {
    /// All thresholds in index order.
    pub const ALL: [ThresholdId; THRESHOLD_COUNT] = [
        Self::ImbalanceOperations,
        Self::SmallBytes,
        Self::SmallRequests,
        Self::SmallRequestsAbsolute,
        Self::MisalignedRequests,
        Self::MetadataTimeRank,
        Self::RandomOperations,
        Self::RandomOperationsAbsolute,
        Self::ImbalanceStragglers,
        Self::ImbalanceSize,
        Self::InterfaceStdio,
        Self::CollectiveOperations,
        Self::CollectiveOperationsAbsolute,
    ];

    /// Returns the configuration key for this threshold.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ImbalanceOperations => "imbalance_operations",
            Self::SmallBytes => "small_bytes",
            Self::SmallRequests => "small_requests",
            Self::SmallRequestsAbsolute => "small_requests_absolute",
            Self::MisalignedRequests => "misaligned_requests",
            Self::MetadataTimeRank => "metadata_time_rank",
            Self::RandomOperations => "random_operations",
            Self::RandomOperationsAbsolute => "random_operations_absolute",
            Self::ImbalanceStragglers => "imbalance_stragglers",
            Self::ImbalanceSize => "imbalance_size",
            Self::InterfaceStdio => "interface_stdio",
            Self::CollectiveOperations => "collective_operations",
            Self::CollectiveOperationsAbsolute => "collective_operations_absolute",
        }
    }

    /// Convert from a configuration key.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|id| id.as_str() == name)
    }

    /// Value domain of this threshold.
    pub const fn kind(self) -> ThresholdKind {
        match self {
            Self::ImbalanceOperations
            | Self::SmallRequests
            | Self::MisalignedRequests
            | Self::RandomOperations
            | Self::ImbalanceStragglers
            | Self::ImbalanceSize
            | Self::InterfaceStdio
            | Self::CollectiveOperations => ThresholdKind::Ratio,
            Self::SmallBytes => ThresholdKind::Bytes,
            Self::SmallRequestsAbsolute
            | Self::RandomOperationsAbsolute
            | Self::CollectiveOperationsAbsolute => ThresholdKind::Count,
            Self::MetadataTimeRank => ThresholdKind::Seconds,
        }
    }

    /// Default value of this threshold.
    pub const fn default_value(self) -> f64 {
        match self {
            Self::ImbalanceOperations => 0.1,
            Self::SmallBytes => 1_048_576.0,
            Self::SmallRequests => 0.1,
            Self::SmallRequestsAbsolute => 1000.0,
            Self::MisalignedRequests => 0.1,
            Self::MetadataTimeRank => 30.0,
            Self::RandomOperations => 0.2,
            Self::RandomOperationsAbsolute => 1000.0,
            Self::ImbalanceStragglers => 0.15,
            Self::ImbalanceSize => 0.3,
            Self::InterfaceStdio => 0.1,
            Self::CollectiveOperations => 0.5,
            Self::CollectiveOperationsAbsolute => 1000.0,
        }
    }
}

impl fmt::Display for ThresholdId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One threshold entry: the configured value and whether any rule fired
/// using it during the run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Threshold {
    pub value: f64,
    pub triggered: bool,
}

/// Table of named thresholds gating every rule.
///
/// Values are mutable only through `apply_overrides` before the run starts;
/// `triggered` flags transition false to true the first time a rule fires
/// using that threshold, for reporting which thresholds mattered.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdPolicy {
    entries: [Threshold; THRESHOLD_COUNT],
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        let mut entries = [Threshold {
            value: 0.0,
            triggered: false,
        }; THRESHOLD_COUNT];
        for id in ThresholdId::ALL {
            entries[id as usize].value = id.default_value();
        }
        Self { entries }
    }
}

impl ThresholdPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of a threshold.
    pub fn value(&self, id: ThresholdId) -> f64 {
        self.entries[id as usize].value
    }

    /// Value of a count-domain threshold as an integer floor.
    pub fn count(&self, id: ThresholdId) -> u64 {
        self.value(id) as u64
    }

    /// Whether any rule fired using this threshold.
    pub fn triggered(&self, id: ThresholdId) -> bool {
        self.entries[id as usize].triggered
    }

    /// Mark a threshold as having gated a fired finding.
    pub fn mark_triggered(&mut self, id: ThresholdId) {
        self.entries[id as usize].triggered = true;
    }

    /// Iterate all entries with their ids, in index order.
    pub fn iter(&self) -> impl Iterator<Item = (ThresholdId, Threshold)> + '_ {
        ThresholdId::ALL.into_iter().map(|id| (id, self.entries[id as usize]))
    }

    /// Apply a flat `name -> value` override mapping, validating each value
    /// against its threshold's domain. Any violation is a configuration
    /// error surfaced before ingestion.
    pub fn apply_overrides(
        &mut self,
        overrides: &BTreeMap<String, f64>,
    ) -> Result<(), AnalysisError> {
        for (name, &value) in overrides {
            let id = ThresholdId::from_name(name).ok_or_else(|| {
                AnalysisError::Configuration(format!("unknown threshold '{name}'"))
            })?;

            match id.kind() {
                ThresholdKind::Ratio => {
                    if !(0.0..=1.0).contains(&value) {
                        return Err(AnalysisError::Configuration(format!(
                            "threshold '{name}' must be in [0, 1], got {value}"
                        )));
                    }
                }
                ThresholdKind::Bytes | ThresholdKind::Count | ThresholdKind::Seconds => {
                    if value < 0.0 {
                        return Err(AnalysisError::Configuration(format!(
                            "threshold '{name}' must be >= 0, got {value}"
                        )));
                    }
                }
            }

            self.entries[id as usize].value = value;
        }

        Ok(())
    }
}
