//! Moderail-Gate: Decision Policy & Fallbacks
//!
//! Pure functions from per-rule outcomes to the delivered verdict. Everything
//! here is a total match over the closed rule-kind set; the engine contains
//! no policy of its own.

use crate::types::{RuleKind, RuleOutcome};
use serde::{Deserialize, Serialize};

/// Whether a rule name marks a hate-speech keyword rule.
///
/// KEYWORD rules are advisory by default; administrators mark the blocking
/// ones by naming convention. This predicate is the only place the gate
/// inspects a rule name. If the rule schema ever grows an explicit
/// `blocking` field, delete this and read that instead.
pub fn is_hate_marked(rule_name: &str) -> bool {
    rule_name.to_ascii_lowercase().contains("hate")
}

/// Whether a trigger from a rule of this kind blocks the reply.
pub fn should_block(kind: RuleKind, rule_name: &str) -> bool {
    match kind {
        RuleKind::Pii
        | RuleKind::Toxicity
        | RuleKind::Regex
        | RuleKind::Financial
        | RuleKind::Medical => true,
        RuleKind::Keyword => is_hate_marked(rule_name),
    }
}

/// Category of the canned reply substituted for a blocked response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackCategory {
    Pii,
    Toxicity,
    Financial,
    Medical,
    Regex,
    Keyword,
}

impl FallbackCategory {
    pub fn for_kind(kind: RuleKind) -> FallbackCategory {
        match kind {
            RuleKind::Pii => FallbackCategory::Pii,
            RuleKind::Toxicity => FallbackCategory::Toxicity,
            RuleKind::Financial => FallbackCategory::Financial,
            RuleKind::Medical => FallbackCategory::Medical,
            RuleKind::Regex => FallbackCategory::Regex,
            RuleKind::Keyword => FallbackCategory::Keyword,
        }
    }

    /// Selection rank when several blocking kinds fire at once. Privacy and
    /// safety phrasings win over advisory ones: PII > TOXICITY > FINANCIAL >
    /// MEDICAL > REGEX > KEYWORD.
    pub fn rank(&self) -> u8 {
        match self {
            FallbackCategory::Pii => 0,
            FallbackCategory::Toxicity => 1,
            FallbackCategory::Financial => 2,
            FallbackCategory::Medical => 3,
            FallbackCategory::Regex => 4,
            FallbackCategory::Keyword => 5,
        }
    }

    /// The canned string delivered in place of the blocked reply.
    pub fn message(&self) -> &'static str {
        match self {
            FallbackCategory::Pii => {
                "I can't share that because it contains personal information. \
                 Is there something else I can help you with?"
            }
            FallbackCategory::Toxicity => {
                "I'd rather keep this conversation respectful, so I won't send \
                 that reply. Let's try a different direction."
            }
            FallbackCategory::Financial => {
                "I can't provide that financial information or advice. For \
                 financial matters, please consult a qualified professional."
            }
            FallbackCategory::Medical => {
                "I can't share medical details here. For health questions, \
                 please speak with a qualified healthcare provider."
            }
            FallbackCategory::Regex => {
                "That response matched a content policy and can't be delivered."
            }
            FallbackCategory::Keyword => {
                "That response isn't something I can send under the current \
                 content policy."
            }
        }
    }
}

/// Aggregated decision over one request's triggered outcomes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    pub is_flagged: bool,
    pub is_blocked: bool,
    /// Present exactly when `is_blocked`
    pub fallback: Option<FallbackCategory>,
}

/// Compose the verdict from the outcomes that fired.
///
/// Deterministic regardless of evaluation order: the fallback is chosen by
/// category rank, not by which rule happened to run first.
pub fn compose(triggered: &[RuleOutcome]) -> Verdict {
    let is_flagged = !triggered.is_empty();
    let fallback = triggered
        .iter()
        .filter(|outcome| outcome.should_block)
        .map(|outcome| FallbackCategory::for_kind(outcome.kind))
        .min_by_key(FallbackCategory::rank);

    Verdict {
        is_flagged,
        is_blocked: fallback.is_some(),
        fallback,
    }
}
