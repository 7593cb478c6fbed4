//! Moderail-Gate: Engine Configuration

use crate::rules::DEFAULT_TOXICITY_THRESHOLD;
use serde::{Deserialize, Serialize};

/// What to do when the toxicity model errors or times out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ToxicityFailurePolicy {
    /// Treat the rule as not triggered (the failure is still counted)
    #[default]
    FailOpen,
    /// Treat the rule as triggered and blocking
    FailClosed,
}

/// Engine configuration. Every field has a production default; deployments
/// typically override only the SLA ceiling and the audit queue capacity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Latency ceiling in milliseconds; crossings increment the SLA counter
    pub sla_ms: u64,
    /// Threshold for TOXICITY rules that do not set one
    pub default_toxicity_threshold: f64,
    /// Behavior on toxicity model failure
    pub toxicity_failure_policy: ToxicityFailurePolicy,
    /// Soft budget for one toxicity inference, in milliseconds
    pub toxicity_timeout_ms: u64,
    /// Bounded audit queue capacity (see `QueueAuditSink`)
    pub audit_queue_capacity: usize,
    /// Minimum interval between snapshot rebuilds, in milliseconds
    pub refresh_floor_ms: u64,
    /// Compiled-size ceiling for administrator-supplied regex patterns
    pub regex_size_limit: usize,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            sla_ms: 100,
            default_toxicity_threshold: DEFAULT_TOXICITY_THRESHOLD,
            toxicity_failure_policy: ToxicityFailurePolicy::FailOpen,
            toxicity_timeout_ms: 20,
            audit_queue_capacity: 4096,
            refresh_floor_ms: 250,
            regex_size_limit: 1 << 20,
        }
    }
}

impl GateConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }
}
