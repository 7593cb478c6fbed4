//! Moderail-Gate: Production Metrics
//!
//! Per-invocation counters and the latency histogram that make the
//! interception and latency guarantees auditable. All storage is fixed-size
//! atomic arrays: a steady-state write is one index plus one `fetch_add`,
//! with no allocation and no lock.
//!
//! The exporter is constructed explicitly and shared by `Arc`; there is no
//! process-global registry, so embedders and tests get isolated counters.

use crate::types::{Region, RuleKind};
use std::array;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};

/// Histogram bucket upper edges, in milliseconds. A tenth bucket catches
/// everything above the last edge.
pub const LATENCY_BUCKETS_MS: [u64; 9] = [10, 25, 50, 75, 100, 150, 200, 500, 1000];

const BUCKET_COUNT: usize = LATENCY_BUCKETS_MS.len() + 1;

/// Terminal outcome of one moderation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Allowed,
    Flagged,
    Blocked,
}

impl Outcome {
    pub const ALL: [Outcome; 3] = [Outcome::Allowed, Outcome::Flagged, Outcome::Blocked];

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Allowed => "allowed",
            Outcome::Flagged => "flagged",
            Outcome::Blocked => "blocked",
        }
    }

    fn index(&self) -> usize {
        match self {
            Outcome::Allowed => 0,
            Outcome::Flagged => 1,
            Outcome::Blocked => 2,
        }
    }
}

/// Detector failure classes tracked separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorFailure {
    /// Pattern rejected at rule compile
    RegexCompile,
    /// Toxicity model returned an error
    Model,
    /// Toxicity inference exceeded its soft budget
    Timeout,
    /// Any other per-rule evaluation failure
    RuleEval,
}

impl DetectorFailure {
    pub const ALL: [DetectorFailure; 4] = [
        DetectorFailure::RegexCompile,
        DetectorFailure::Model,
        DetectorFailure::Timeout,
        DetectorFailure::RuleEval,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DetectorFailure::RegexCompile => "regex_compile",
            DetectorFailure::Model => "model",
            DetectorFailure::Timeout => "timeout",
            DetectorFailure::RuleEval => "rule_eval",
        }
    }

    fn index(&self) -> usize {
        match self {
            DetectorFailure::RegexCompile => 0,
            DetectorFailure::Model => 1,
            DetectorFailure::Timeout => 2,
            DetectorFailure::RuleEval => 3,
        }
    }
}

/// Gate metrics exporter.
pub struct GateMetrics {
    invocations: AtomicU64,
    latency_buckets: [AtomicU64; BUCKET_COUNT],
    latency_sum_ns: AtomicU64,
    outcomes: [[AtomicU64; 3]; 5],
    sla_violations: AtomicU64,
    intercepted: [AtomicU64; 2],
    rule_triggers: [AtomicU64; 6],
    detector_errors: [AtomicU64; 4],
    audit_submitted: AtomicU64,
    audit_dropped: AtomicU64,
    audit_failures: AtomicU64,
    store_failures: AtomicU64,
}

impl GateMetrics {
    pub fn new() -> Self {
        Self {
            invocations: AtomicU64::new(0),
            latency_buckets: array::from_fn(|_| AtomicU64::new(0)),
            latency_sum_ns: AtomicU64::new(0),
            outcomes: array::from_fn(|_| array::from_fn(|_| AtomicU64::new(0))),
            sla_violations: AtomicU64::new(0),
            intercepted: array::from_fn(|_| AtomicU64::new(0)),
            rule_triggers: array::from_fn(|_| AtomicU64::new(0)),
            detector_errors: array::from_fn(|_| AtomicU64::new(0)),
            audit_submitted: AtomicU64::new(0),
            audit_dropped: AtomicU64::new(0),
            audit_failures: AtomicU64::new(0),
            store_failures: AtomicU64::new(0),
        }
    }

    pub fn record_invocation(&self) {
        self.invocations.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one moderation latency; `sla_ns` is the configured ceiling.
    pub fn observe_latency(&self, latency_ns: u64, sla_ns: u64) {
        let bucket = LATENCY_BUCKETS_MS
            .iter()
            .position(|edge_ms| latency_ns <= edge_ms * 1_000_000)
            .unwrap_or(BUCKET_COUNT - 1);
        self.latency_buckets[bucket].fetch_add(1, Ordering::Relaxed);
        self.latency_sum_ns.fetch_add(latency_ns, Ordering::Relaxed);
        if latency_ns > sla_ns {
            self.sla_violations.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_outcome(&self, region: Region, outcome: Outcome) {
        self.outcomes[region.index()][outcome.index()].fetch_add(1, Ordering::Relaxed);
    }

    /// `intercepted = false` is emitted only by the engine failsafe and is a
    /// critical operator alarm.
    pub fn record_interception(&self, intercepted: bool) {
        self.intercepted[usize::from(intercepted)].fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_trigger(&self, kind: RuleKind) {
        self.rule_triggers[kind.index()].fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_detector_error(&self, failure: DetectorFailure) {
        self.detector_errors[failure.index()].fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_audit_submitted(&self) {
        self.audit_submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_audit_dropped(&self) {
        self.audit_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_audit_failure(&self) {
        self.audit_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_store_failure(&self) {
        self.store_failures.fetch_add(1, Ordering::Relaxed);
    }

    // ========== Read side ==========

    pub fn invocations(&self) -> u64 {
        self.invocations.load(Ordering::Relaxed)
    }

    pub fn outcome_count(&self, region: Region, outcome: Outcome) -> u64 {
        self.outcomes[region.index()][outcome.index()].load(Ordering::Relaxed)
    }

    pub fn sla_violations(&self) -> u64 {
        self.sla_violations.load(Ordering::Relaxed)
    }

    pub fn interceptions(&self, intercepted: bool) -> u64 {
        self.intercepted[usize::from(intercepted)].load(Ordering::Relaxed)
    }

    pub fn trigger_count(&self, kind: RuleKind) -> u64 {
        self.rule_triggers[kind.index()].load(Ordering::Relaxed)
    }

    pub fn detector_error_count(&self, failure: DetectorFailure) -> u64 {
        self.detector_errors[failure.index()].load(Ordering::Relaxed)
    }

    pub fn audit_attempts(&self) -> u64 {
        self.audit_submitted.load(Ordering::Relaxed)
            + self.audit_dropped.load(Ordering::Relaxed)
            + self.audit_failures.load(Ordering::Relaxed)
    }

    pub fn audit_dropped(&self) -> u64 {
        self.audit_dropped.load(Ordering::Relaxed)
    }

    pub fn audit_failures(&self) -> u64 {
        self.audit_failures.load(Ordering::Relaxed)
    }

    pub fn store_failures(&self) -> u64 {
        self.store_failures.load(Ordering::Relaxed)
    }

    /// Export every family in Prometheus text format.
    pub fn export_prometheus(&self) -> String {
        let mut output = String::new();

        output.push_str(
            "# HELP moderail_gate_moderations_total Moderations by region and outcome\n\
             # TYPE moderail_gate_moderations_total counter\n",
        );
        for region in Region::ALL {
            for outcome in Outcome::ALL {
                let _ = writeln!(
                    output,
                    "moderail_gate_moderations_total{{region=\"{}\",outcome=\"{}\"}} {}",
                    region.as_str(),
                    outcome.as_str(),
                    self.outcome_count(region, outcome)
                );
            }
        }
        output.push('\n');

        output.push_str(
            "# HELP moderail_gate_latency_ms Moderation latency, engine entry to exit\n\
             # TYPE moderail_gate_latency_ms histogram\n",
        );
        let mut cumulative = 0u64;
        for (i, edge) in LATENCY_BUCKETS_MS.iter().enumerate() {
            cumulative += self.latency_buckets[i].load(Ordering::Relaxed);
            let _ = writeln!(
                output,
                "moderail_gate_latency_ms_bucket{{le=\"{edge}\"}} {cumulative}"
            );
        }
        cumulative += self.latency_buckets[BUCKET_COUNT - 1].load(Ordering::Relaxed);
        let _ = writeln!(
            output,
            "moderail_gate_latency_ms_bucket{{le=\"+Inf\"}} {cumulative}"
        );
        let sum_ms = self.latency_sum_ns.load(Ordering::Relaxed) as f64 / 1e6;
        let _ = writeln!(output, "moderail_gate_latency_ms_sum {sum_ms}");
        let _ = writeln!(output, "moderail_gate_latency_ms_count {cumulative}\n");

        output.push_str(
            "# HELP moderail_gate_sla_violations_total Moderations over the latency ceiling\n\
             # TYPE moderail_gate_sla_violations_total counter\n",
        );
        let _ = writeln!(
            output,
            "moderail_gate_sla_violations_total {}\n",
            self.sla_violations()
        );

        output.push_str(
            "# HELP moderail_gate_interceptions_total Interception ledger; intercepted=\"false\" is a critical alarm\n\
             # TYPE moderail_gate_interceptions_total counter\n",
        );
        for value in [true, false] {
            let _ = writeln!(
                output,
                "moderail_gate_interceptions_total{{intercepted=\"{value}\"}} {}",
                self.interceptions(value)
            );
        }
        output.push('\n');

        output.push_str(
            "# HELP moderail_gate_rule_triggers_total Rule triggers by kind\n\
             # TYPE moderail_gate_rule_triggers_total counter\n",
        );
        for kind in RuleKind::ALL {
            let _ = writeln!(
                output,
                "moderail_gate_rule_triggers_total{{kind=\"{}\"}} {}",
                kind.as_str(),
                self.trigger_count(kind)
            );
        }
        output.push('\n');

        output.push_str(
            "# HELP moderail_gate_detector_errors_total Detector failures by class\n\
             # TYPE moderail_gate_detector_errors_total counter\n",
        );
        for failure in DetectorFailure::ALL {
            let _ = writeln!(
                output,
                "moderail_gate_detector_errors_total{{kind=\"{}\"}} {}",
                failure.as_str(),
                self.detector_error_count(failure)
            );
        }
        output.push('\n');

        output.push_str(
            "# HELP moderail_gate_audit_records_total Audit submissions by status\n\
             # TYPE moderail_gate_audit_records_total counter\n",
        );
        for (status, value) in [
            ("submitted", self.audit_submitted.load(Ordering::Relaxed)),
            ("dropped", self.audit_dropped.load(Ordering::Relaxed)),
            ("failed", self.audit_failures.load(Ordering::Relaxed)),
        ] {
            let _ = writeln!(
                output,
                "moderail_gate_audit_records_total{{status=\"{status}\"}} {value}"
            );
        }
        output.push('\n');

        output.push_str(
            "# HELP moderail_gate_store_failures_total Rule store read failures (served last good snapshot)\n\
             # TYPE moderail_gate_store_failures_total counter\n",
        );
        let _ = writeln!(
            output,
            "moderail_gate_store_failures_total {}",
            self.store_failures()
        );

        output
    }
}

impl Default for GateMetrics {
    fn default() -> Self {
        Self::new()
    }
}
