//! Moderail-Gate: Synchronous Reply-Moderation Engine
//!
//! Every generated chatbot reply passes through the gate before delivery.
//! The engine evaluates the active rule set for the request's region and
//! decides, within a bounded latency budget, whether to deliver the reply
//! verbatim, substitute a category fallback, or flag it for audit. It emits
//! exactly one audit record per invocation, whatever happens.
//!
//! # Pipeline
//!
//! - `rules` / `store`: administered rule records, compiled copy-on-write
//!   snapshots, epoch-based freshness
//! - `detectors`: keyword, regex, and toxicity analyzers (PII and the
//!   industry vocabularies come from `moderail-governance`)
//! - `decision`: pure verdict composition and fallback selection
//! - `engine`: orchestration, failsafe, cancellation
//! - `audit` / `metrics`: the observable exhaust
//!
//! # Example
//!
//! ```rust,ignore
//! use moderail_gate::{ModerationEngine, ModerationRequest, Region, Rule, RuleKind, RuleStore};
//! use std::sync::Arc;
//!
//! let store = Arc::new(RuleStore::new());
//! store.upsert(Rule::new("PII Protection", RuleKind::Pii).with_priority(100))?;
//!
//! let engine = ModerationEngine::new(store);
//! let result = engine
//!     .moderate(ModerationRequest::builder(reply).region(Region::Us).build())
//!     .await;
//! ```

pub mod audit;
pub mod config;
pub mod decision;
pub mod detectors;
pub mod engine;
pub mod metrics;
pub mod rules;
pub mod store;
pub mod types;

// Re-export the governance scanners (single source of truth for the
// built-in vocabularies).
pub use moderail_governance::{
    FinancialScanResult, FinancialTermScanner, MedicalScanResult, MedicalTermScanner,
    PiiScanResult, PiiScanner, PiiType,
};

// Re-exports
pub use audit::{AuditError, AuditRecord, AuditSink, MemoryAuditSink, QueueAuditSink};
pub use config::{GateConfig, ToxicityFailurePolicy};
pub use decision::{FallbackCategory, Verdict};
pub use detectors::toxicity::{LexiconScorer, ToxicityScorer, ToxicityScores};
pub use detectors::DetectorError;
pub use engine::ModerationEngine;
pub use metrics::{DetectorFailure, GateMetrics, Outcome, LATENCY_BUCKETS_MS};
pub use rules::{
    CompiledRule, Rule, RuleCheck, RuleSet, RuleValidationError, DEFAULT_TOXICITY_THRESHOLD,
};
pub use store::{RuleSnapshot, RuleSource, RuleStore, SnapshotCache, StoreError, StoreLoadError};
pub use types::{
    CancelToken, Disposition, ModerationRequest, ModerationRequestBuilder, ModerationResult,
    Region, RuleKind, RuleOutcome,
};
