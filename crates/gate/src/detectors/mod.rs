//! Moderail-Gate: Detectors
//!
//! Stateless analyzers behind the rule kinds. Every detector is pure over its
//! input text and parameters, deterministic, and safe to call from any number
//! of request workers at once. The built-in PII/financial/medical scanners
//! live in `moderail-governance`; this module holds the detectors that take
//! per-rule parameters.

pub mod keyword;
pub mod pattern;
pub mod toxicity;

use thiserror::Error;

/// Detector failures. None of these ever fail a request: the owning rule is
/// skipped (or handled per the configured toxicity failure policy) and the
/// matching error counter is incremented.
#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("regex pattern `{pattern}` failed to compile: {source}")]
    RegexCompile {
        pattern: String,
        source: regex::Error,
    },
    #[error("toxicity model failure: {0}")]
    Model(String),
    #[error("toxicity inference exceeded the {budget_ms} ms budget")]
    Timeout { budget_ms: u64 },
}
