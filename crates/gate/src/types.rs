//! Moderail-Gate: Core Types
//!
//! Domain types shared across the moderation pipeline.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Jurisdiction tag selecting which non-global rules apply to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    /// Applies everywhere (and: rules tagged global match every request)
    #[default]
    Global,
    /// United States
    Us,
    /// European Union
    Eu,
    /// United Kingdom
    Uk,
    /// Asia-Pacific
    Apac,
}

impl Region {
    pub const ALL: [Region; 5] = [
        Region::Global,
        Region::Us,
        Region::Eu,
        Region::Uk,
        Region::Apac,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Global => "global",
            Region::Us => "us",
            Region::Eu => "eu",
            Region::Uk => "uk",
            Region::Apac => "apac",
        }
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            Region::Global => 0,
            Region::Us => 1,
            Region::Eu => 2,
            Region::Uk => 3,
            Region::Apac => 4,
        }
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which detector drives a rule, and whether `patterns` is consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    /// Built-in PII recognizers (email, phone, SSN, credit card, IPv4)
    Pii,
    /// ML-scored toxicity labels against the rule threshold
    Toxicity,
    /// Case-insensitive substring search over `patterns`
    Keyword,
    /// Regular expressions from `patterns`, compiled per rule version
    Regex,
    /// Built-in financial vocabulary
    Financial,
    /// Built-in medical vocabulary
    Medical,
}

impl RuleKind {
    pub const ALL: [RuleKind; 6] = [
        RuleKind::Pii,
        RuleKind::Toxicity,
        RuleKind::Keyword,
        RuleKind::Regex,
        RuleKind::Financial,
        RuleKind::Medical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::Pii => "pii",
            RuleKind::Toxicity => "toxicity",
            RuleKind::Keyword => "keyword",
            RuleKind::Regex => "regex",
            RuleKind::Financial => "financial",
            RuleKind::Medical => "medical",
        }
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            RuleKind::Pii => 0,
            RuleKind::Toxicity => 1,
            RuleKind::Keyword => 2,
            RuleKind::Regex => 3,
            RuleKind::Financial => 4,
            RuleKind::Medical => 5,
        }
    }
}

impl std::fmt::Display for RuleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One reply to moderate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationRequest {
    /// The user message that produced the reply (audit context only)
    #[serde(default)]
    pub user_message: String,
    /// The candidate reply; treated as opaque text, no safety assumed
    pub bot_response: String,
    /// Jurisdiction tag for rule selection
    #[serde(default)]
    pub region: Region,
    /// Opaque session correlation tag, passed through unchanged
    #[serde(default)]
    pub session_id: Option<String>,
}

impl ModerationRequest {
    pub fn builder(bot_response: impl Into<String>) -> ModerationRequestBuilder {
        ModerationRequestBuilder::new(bot_response)
    }
}

/// Builder for moderation requests.
pub struct ModerationRequestBuilder {
    user_message: String,
    bot_response: String,
    region: Region,
    session_id: Option<String>,
}

impl ModerationRequestBuilder {
    pub fn new(bot_response: impl Into<String>) -> Self {
        Self {
            user_message: String::new(),
            bot_response: bot_response.into(),
            region: Region::Global,
            session_id: None,
        }
    }

    pub fn user_message(mut self, message: impl Into<String>) -> Self {
        self.user_message = message.into();
        self
    }

    pub fn region(mut self, region: Region) -> Self {
        self.region = region;
        self
    }

    pub fn session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn build(self) -> ModerationRequest {
        ModerationRequest {
            user_message: self.user_message,
            bot_response: self.bot_response,
            region: self.region,
            session_id: self.session_id,
        }
    }
}

/// Per-rule result of evaluating one candidate reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleOutcome {
    /// Rule that produced this outcome
    pub rule_id: Uuid,
    /// Rule name at evaluation time (audit convenience)
    pub rule_name: String,
    /// Rule kind
    pub kind: RuleKind,
    /// Whether the backing detector fired
    pub triggered: bool,
    /// Whether a trigger from this rule blocks the reply
    pub should_block: bool,
    /// Detector score, where the detector produces one (toxicity)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    /// Opaque structured detail for audit (matched keywords, PII counts, ...)
    pub matches: serde_json::Value,
}

/// How a moderation invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// Full evaluation ran to completion
    Completed,
    /// Caller abandoned the request; evaluation stopped early
    Cancelled,
    /// Evaluation panicked; the failsafe produced the result
    EngineError,
}

impl Disposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::Completed => "completed",
            Disposition::Cancelled => "cancelled",
            Disposition::EngineError => "engine_error",
        }
    }
}

/// Verdict returned to the caller and persisted to audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationResult {
    /// Freshly minted per-invocation identifier
    pub request_id: Uuid,
    /// The text actually delivered: the reply verbatim, or a fallback
    pub final_response: String,
    /// At least one rule triggered
    pub is_flagged: bool,
    /// At least one blocking rule triggered; `final_response` is a fallback
    pub is_blocked: bool,
    /// Outcomes that fired, in priority-descending rule order
    pub triggered: Vec<RuleOutcome>,
    /// Detector scores by kind, where applicable
    pub scores: HashMap<RuleKind, f64>,
    /// Wall-clock span from engine entry to just before sink emission
    pub latency_ns: u64,
    /// Request region, passed through
    pub region: Region,
    /// Session tag, passed through
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// Cooperative cancellation handle checked between rule evaluations.
///
/// Cancelling never skips the audit record; it only stops further rule
/// evaluation for a caller that has already gone away.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Region::Eu).unwrap(), "\"eu\"");
        let region: Region = serde_json::from_str("\"apac\"").unwrap();
        assert_eq!(region, Region::Apac);
    }

    #[test]
    fn test_rule_kind_roundtrip() {
        for kind in RuleKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            let back: RuleKind = serde_json::from_str(&json).unwrap();
            assert_eq!(kind, back);
        }
    }

    #[test]
    fn test_request_builder() {
        let request = ModerationRequest::builder("hello")
            .user_message("hi")
            .region(Region::Us)
            .session_id("session-7")
            .build();

        assert_eq!(request.bot_response, "hello");
        assert_eq!(request.region, Region::Us);
        assert_eq!(request.session_id.as_deref(), Some("session-7"));
    }

    #[test]
    fn test_cancel_token() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());

        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }
}
