//! Toxicity Detector
//!
//! Scores a reply on six labels, each in [0, 1]. A TOXICITY rule fires when
//! the maximum label meets the rule's threshold.
//!
//! The scorer is a trait so deployments can plug in a real model; the
//! built-in [`LexiconScorer`] is an embedded weighted-lexicon model:
//! deterministic for a given input, bounded memory, no inference runtime.
//! Input is normalized (NFKC, ASCII folding, lowercasing) before matching so
//! homoglyph and diacritic evasion collapses onto the lexicon.

use crate::detectors::DetectorError;
use deunicode::deunicode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use unicode_normalization::UnicodeNormalization;

/// Label names, in the order scores are reported.
pub const LABELS: [&str; 6] = [
    "toxicity",
    "severe_toxicity",
    "obscene",
    "threat",
    "insult",
    "identity_hate",
];

/// Score map over the six toxicity labels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ToxicityScores {
    pub toxicity: f64,
    pub severe_toxicity: f64,
    pub obscene: f64,
    pub threat: f64,
    pub insult: f64,
    pub identity_hate: f64,
}

impl ToxicityScores {
    /// Highest label score; this is what rule thresholds compare against.
    pub fn max(&self) -> f64 {
        [
            self.toxicity,
            self.severe_toxicity,
            self.obscene,
            self.threat,
            self.insult,
            self.identity_hate,
        ]
        .into_iter()
        .fold(0.0, f64::max)
    }

    /// Label → score map for audit payloads.
    pub fn as_map(&self) -> HashMap<&'static str, f64> {
        HashMap::from([
            ("toxicity", self.toxicity),
            ("severe_toxicity", self.severe_toxicity),
            ("obscene", self.obscene),
            ("threat", self.threat),
            ("insult", self.insult),
            ("identity_hate", self.identity_hate),
        ])
    }
}

/// A toxicity model. Implementations must be deterministic once initialized
/// and safe to call concurrently; single-threaded models must pool.
pub trait ToxicityScorer: Send + Sync {
    fn score(&self, text: &str) -> Result<ToxicityScores, DetectorError>;
}

type WeightedTerms = &'static [(&'static str, f64)];

const TOXICITY_TERMS: WeightedTerms = &[
    ("idiot", 0.8),
    ("stupid", 0.75),
    ("moron", 0.8),
    ("dumb", 0.6),
    ("loser", 0.6),
    ("shut up", 0.65),
    ("pathetic", 0.6),
    ("worthless", 0.7),
    ("hate you", 0.7),
];

const SEVERE_TOXICITY_TERMS: WeightedTerms = &[
    ("kill yourself", 0.95),
    ("kys", 0.9),
    ("go die", 0.85),
    ("nobody would miss you", 0.9),
];

const OBSCENE_TERMS: WeightedTerms = &[
    ("damn", 0.3),
    ("crap", 0.3),
    ("bullshit", 0.6),
    ("wtf", 0.4),
    ("screw you", 0.6),
    ("piss off", 0.6),
];

const THREAT_TERMS: WeightedTerms = &[
    ("i will kill", 0.95),
    ("i will hurt", 0.9),
    ("i will find you", 0.85),
    ("watch your back", 0.8),
    ("you will regret", 0.7),
    ("i will destroy", 0.75),
    ("or else", 0.5),
];

const INSULT_TERMS: WeightedTerms = &[
    ("idiot", 0.9),
    ("moron", 0.9),
    ("imbecile", 0.85),
    ("stupid", 0.8),
    ("worthless", 0.8),
    ("loser", 0.75),
    ("ugly", 0.7),
    ("clown", 0.6),
];

const IDENTITY_HATE_TERMS: WeightedTerms = &[
    ("go back to your country", 0.9),
    ("people like you don't belong", 0.85),
    ("subhuman", 0.95),
    ("vermin", 0.8),
    ("your kind", 0.6),
];

/// Embedded weighted-lexicon toxicity model.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexiconScorer;

impl LexiconScorer {
    pub fn new() -> Self {
        Self
    }

    /// Collapse homoglyphs and diacritics before matching.
    fn normalize(text: &str) -> String {
        let folded: String = text.nfkc().collect();
        deunicode(&folded).to_lowercase()
    }

    /// Noisy-or over the matched terms: one strong hit dominates, repeated
    /// weaker hits escalate, and the result stays in [0, 1].
    fn label_score(text: &str, terms: WeightedTerms) -> f64 {
        let mut miss_mass = 1.0;
        for (term, weight) in terms {
            if text.contains(term) {
                miss_mass *= 1.0 - weight;
            }
        }
        1.0 - miss_mass
    }
}

impl ToxicityScorer for LexiconScorer {
    fn score(&self, text: &str) -> Result<ToxicityScores, DetectorError> {
        let normalized = Self::normalize(text);

        Ok(ToxicityScores {
            toxicity: Self::label_score(&normalized, TOXICITY_TERMS),
            severe_toxicity: Self::label_score(&normalized, SEVERE_TOXICITY_TERMS),
            obscene: Self::label_score(&normalized, OBSCENE_TERMS),
            threat: Self::label_score(&normalized, THREAT_TERMS),
            insult: Self::label_score(&normalized, INSULT_TERMS),
            identity_hate: Self::label_score(&normalized, IDENTITY_HATE_TERMS),
        })
    }
}
