//! Moderail-Gate: Rule Records
//!
//! The administrator-facing rule record, its validation, and the typed form
//! the engine evaluates. A stored record is loose (one `patterns` list, one
//! optional `threshold` shared by all kinds); at snapshot-build time it
//! decodes into a [`RuleCheck`] variant carrying exactly the fields its kind
//! needs, so the engine never re-interprets configuration on the hot path.
//!
//! # Example rule document (YAML)
//!
//! ```yaml
//! rules:
//!   - id: 8f2f9f1e-74a5-4cf6-9d8e-2f60b54dfde1
//!     name: PII Protection
//!     kind: pii
//!     region: global
//!     priority: 100
//!   - id: 0c1d6a8a-37b9-4a44-9a55-c2fd6f3e9a02
//!     name: Crypto Scam Detection
//!     kind: keyword
//!     region: global
//!     priority: 40
//!     patterns: ["double your money", "send bitcoin"]
//! ```

use crate::detectors::DetectorError;
use crate::types::{Region, RuleKind};
use chrono::{DateTime, Utc};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use thiserror::Error;
use uuid::Uuid;

/// Default toxicity threshold when a rule does not set one.
pub const DEFAULT_TOXICITY_THRESHOLD: f64 = 0.7;

/// Validation failures for administrator-supplied rules.
#[derive(Debug, Error)]
pub enum RuleValidationError {
    #[error("rule {rule_id} has threshold {value}, expected a value in [0, 1]")]
    ThresholdOutOfRange { rule_id: Uuid, value: f64 },
    #[error("rule {rule_id} has an empty name")]
    EmptyName { rule_id: Uuid },
    #[error("{kind} rule {rule_id} has no usable pattern")]
    NoPatterns { rule_id: Uuid, kind: RuleKind },
}

/// Authoritative rule record, as administered externally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    /// Stable identifier; never mutated (kind changes are delete-plus-create)
    pub id: Uuid,
    /// Human name; only semantic use is the hate-marker blocking convention
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub kind: RuleKind,
    #[serde(default)]
    pub region: Region,
    /// KEYWORD: case-insensitive substrings; REGEX: patterns; ignored otherwise
    #[serde(default)]
    pub patterns: Vec<String>,
    /// Consulted only by TOXICITY rules
    #[serde(default)]
    pub threshold: Option<f64>,
    /// Higher evaluates first; ties break by `id` ascending
    #[serde(default)]
    pub priority: u32,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

impl Rule {
    /// Minimal constructor for the built-in kinds that carry no parameters.
    pub fn new(name: impl Into<String>, kind: RuleKind) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: String::new(),
            kind,
            region: Region::Global,
            patterns: Vec::new(),
            threshold: None,
            priority: 0,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_region(mut self, region: Region) -> Self {
        self.region = region;
        self
    }

    pub fn with_patterns(mut self, patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    /// Validate the administrative invariants.
    pub fn validate(&self) -> Result<(), RuleValidationError> {
        if self.name.trim().is_empty() {
            return Err(RuleValidationError::EmptyName { rule_id: self.id });
        }
        if let Some(value) = self.threshold {
            if !(0.0..=1.0).contains(&value) || value.is_nan() {
                return Err(RuleValidationError::ThresholdOutOfRange {
                    rule_id: self.id,
                    value,
                });
            }
        }
        if matches!(self.kind, RuleKind::Keyword | RuleKind::Regex)
            && !self.patterns.iter().any(|p| !p.trim().is_empty())
        {
            return Err(RuleValidationError::NoPatterns {
                rule_id: self.id,
                kind: self.kind,
            });
        }
        Ok(())
    }

    /// Whether this rule applies to a request tagged `region`.
    pub fn applies_to(&self, region: Region) -> bool {
        self.region == Region::Global || self.region == region
    }
}

/// A YAML rule document, used to seed the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSet {
    pub rules: Vec<Rule>,
}

impl RuleSet {
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

/// Per-kind evaluation parameters, decoded once per rule version.
#[derive(Debug)]
pub enum RuleCheck {
    /// Lowercased non-empty substrings
    Keyword { patterns: Vec<String> },
    /// Pre-compiled expressions (linear-time engine, size-limited)
    Pattern { regexes: Vec<Regex> },
    /// Minimum label score that fires the rule
    Toxicity { threshold: f64 },
    Pii,
    Financial,
    Medical,
}

/// A rule in the form the engine evaluates.
#[derive(Debug)]
pub struct CompiledRule {
    pub id: Uuid,
    pub name: String,
    pub kind: RuleKind,
    pub region: Region,
    pub priority: u32,
    pub check: RuleCheck,
}

impl CompiledRule {
    pub fn applies_to(&self, region: Region) -> bool {
        self.region == Region::Global || self.region == region
    }

    /// Priority descending, then id ascending. Total and stable.
    pub fn order(a: &CompiledRule, b: &CompiledRule) -> Ordering {
        b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id))
    }
}

/// Decode a stored rule into its evaluable form.
///
/// `regex_size_limit` bounds the compiled-program size of every pattern; the
/// `regex` crate's engine is linear-time, so between the two a hostile
/// pattern cannot stall the request path. A pattern that fails to compile
/// fails the whole rule: the caller skips it and records the error metric.
pub fn compile(
    rule: &Rule,
    regex_size_limit: usize,
    default_threshold: f64,
) -> Result<CompiledRule, DetectorError> {
    let check = match rule.kind {
        RuleKind::Keyword => RuleCheck::Keyword {
            patterns: rule
                .patterns
                .iter()
                .filter(|p| !p.trim().is_empty())
                .map(|p| p.to_lowercase())
                .collect(),
        },
        RuleKind::Regex => {
            let mut regexes = Vec::with_capacity(rule.patterns.len());
            for pattern in rule.patterns.iter().filter(|p| !p.trim().is_empty()) {
                let regex = RegexBuilder::new(pattern)
                    .size_limit(regex_size_limit)
                    .build()
                    .map_err(|source| DetectorError::RegexCompile {
                        pattern: pattern.clone(),
                        source,
                    })?;
                regexes.push(regex);
            }
            RuleCheck::Pattern { regexes }
        }
        RuleKind::Toxicity => RuleCheck::Toxicity {
            threshold: rule.threshold.unwrap_or(default_threshold),
        },
        RuleKind::Pii => RuleCheck::Pii,
        RuleKind::Financial => RuleCheck::Financial,
        RuleKind::Medical => RuleCheck::Medical,
    };

    Ok(CompiledRule {
        id: rule.id,
        name: rule.name.clone(),
        kind: rule.kind,
        region: rule.region,
        priority: rule.priority,
        check,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_validation() {
        let rule = Rule::new("Toxicity", RuleKind::Toxicity).with_threshold(1.3);
        assert!(matches!(
            rule.validate(),
            Err(RuleValidationError::ThresholdOutOfRange { .. })
        ));

        let rule = Rule::new("Toxicity", RuleKind::Toxicity).with_threshold(0.7);
        assert!(rule.validate().is_ok());
    }

    #[test]
    fn test_keyword_rule_requires_patterns() {
        let rule = Rule::new("Scam words", RuleKind::Keyword);
        assert!(matches!(
            rule.validate(),
            Err(RuleValidationError::NoPatterns { .. })
        ));
    }

    #[test]
    fn test_builtin_kinds_need_no_patterns() {
        for kind in [
            RuleKind::Pii,
            RuleKind::Toxicity,
            RuleKind::Financial,
            RuleKind::Medical,
        ] {
            assert!(Rule::new("r", kind).validate().is_ok());
        }
    }

    #[test]
    fn test_region_applicability() {
        let global = Rule::new("g", RuleKind::Pii);
        let eu = Rule::new("e", RuleKind::Pii).with_region(Region::Eu);

        assert!(global.applies_to(Region::Us));
        assert!(eu.applies_to(Region::Eu));
        assert!(!eu.applies_to(Region::Us));
    }

    #[test]
    fn test_compile_keyword_lowercases_patterns() {
        let rule = Rule::new("k", RuleKind::Keyword).with_patterns(["Hello", " ", "WORLD"]);
        let compiled = compile(&rule, 1 << 20, DEFAULT_TOXICITY_THRESHOLD).unwrap();
        match compiled.check {
            RuleCheck::Keyword { patterns } => assert_eq!(patterns, vec!["hello", "world"]),
            other => panic!("unexpected check: {other:?}"),
        }
    }

    #[test]
    fn test_compile_rejects_invalid_regex() {
        let rule = Rule::new("bad", RuleKind::Regex).with_patterns(["(unclosed"]);
        assert!(matches!(
            compile(&rule, 1 << 20, DEFAULT_TOXICITY_THRESHOLD),
            Err(DetectorError::RegexCompile { .. })
        ));
    }

    #[test]
    fn test_compile_defaults_toxicity_threshold() {
        let rule = Rule::new("tox", RuleKind::Toxicity);
        let compiled = compile(&rule, 1 << 20, DEFAULT_TOXICITY_THRESHOLD).unwrap();
        match compiled.check {
            RuleCheck::Toxicity { threshold } => assert_eq!(threshold, 0.7),
            other => panic!("unexpected check: {other:?}"),
        }
    }

    #[test]
    fn test_ordering_priority_then_id() {
        let mut high = compile(
            &Rule::new("a", RuleKind::Pii).with_priority(100),
            1 << 20,
            DEFAULT_TOXICITY_THRESHOLD,
        )
        .unwrap();
        let mut low = compile(
            &Rule::new("b", RuleKind::Pii).with_priority(10),
            1 << 20,
            DEFAULT_TOXICITY_THRESHOLD,
        )
        .unwrap();
        assert_eq!(CompiledRule::order(&high, &low), Ordering::Less);

        high.priority = 10;
        low.priority = 10;
        high.id = Uuid::nil();
        low.id = Uuid::from_u128(1);
        assert_eq!(CompiledRule::order(&high, &low), Ordering::Less);
    }

    #[test]
    fn test_ruleset_yaml_roundtrip() {
        let yaml = r#"
rules:
  - id: 8f2f9f1e-74a5-4cf6-9d8e-2f60b54dfde1
    name: PII Protection
    kind: pii
    priority: 100
  - id: 0c1d6a8a-37b9-4a44-9a55-c2fd6f3e9a02
    name: Crypto Scam Detection
    kind: keyword
    priority: 40
    patterns: ["double your money", "send bitcoin"]
"#;
        let set = RuleSet::from_yaml(yaml).unwrap();
        assert_eq!(set.rules.len(), 2);
        assert_eq!(set.rules[0].kind, RuleKind::Pii);
        assert_eq!(set.rules[0].region, Region::Global);
        assert!(set.rules[1].is_active);
        assert_eq!(set.rules[1].patterns.len(), 2);

        let back = RuleSet::from_yaml(&set.to_yaml().unwrap()).unwrap();
        assert_eq!(back.rules[1].name, "Crypto Scam Detection");
    }
}
