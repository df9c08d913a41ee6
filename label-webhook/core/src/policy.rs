use crate::workload::Labels;
use thiserror::Error;

/// Requires that a workload's `key` label, when set, has exactly `value`.
///
/// Workloads that omit the label entirely are compliant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LabelPolicy {
    pub key: String,
    pub value: String,
}

/// Indicates that a workload carries a label value the policy forbids.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{kind} contains an unwanted label")]
pub struct Violation {
    pub kind: String,
}

// === impl LabelPolicy ===

impl Default for LabelPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_KEY, Self::DEFAULT_VALUE)
    }
}

impl LabelPolicy {
    pub const DEFAULT_KEY: &'static str = "team";
    pub const DEFAULT_VALUE: &'static str = "ops";

    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn check(&self, kind: &str, labels: Option<&Labels>) -> Result<(), Violation> {
        match labels.and_then(|l| l.get(&self.key)) {
            Some(v) if *v != self.value => Err(Violation {
                kind: kind.to_string(),
            }),
            _ => Ok(()),
        }
    }
}
