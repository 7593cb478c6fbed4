//! PII Recognizers
//!
//! A fixed family of recognizers over free text. Patterns are compiled once
//! per process and shared; scanning allocates only the result.
//!
//! Recognizers deliberately avoid line anchors: inline PII ("reach me at
//! bob@example.com, thanks") must match regardless of surrounding text.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Category of personally identifiable information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PiiType {
    /// Email address
    Email,
    /// North-American phone number
    Phone,
    /// US Social Security Number
    Ssn,
    /// Credit card number (13-16 digits, optional separators)
    CreditCard,
    /// IPv4 dotted-quad address
    IpAddress,
}

impl PiiType {
    /// All recognizer categories, in scan order.
    pub const ALL: [PiiType; 5] = [
        PiiType::Email,
        PiiType::Phone,
        PiiType::Ssn,
        PiiType::CreditCard,
        PiiType::IpAddress,
    ];

    /// Stable label used in audit payloads and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            PiiType::Email => "email",
            PiiType::Phone => "phone",
            PiiType::Ssn => "ssn",
            PiiType::CreditCard => "credit_card",
            PiiType::IpAddress => "ip_address",
        }
    }
}

/// Result of a PII scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PiiScanResult {
    /// Whether any recognizer fired
    pub has_pii: bool,
    /// Match count per category (categories with zero matches are omitted)
    pub by_type: HashMap<PiiType, usize>,
    /// Total matches across all categories
    pub total_matches: usize,
}

static RECOGNIZERS: Lazy<Vec<(PiiType, Regex)>> = Lazy::new(|| {
    // Word boundaries only; `^`/`$` would miss inline PII. The phone pattern
    // has no leading boundary because `+` is itself a non-word character.
    let table: [(PiiType, &str); 5] = [
        (
            PiiType::Email,
            r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}",
        ),
        (
            PiiType::Phone,
            r"(?:\+?1[-.\s]?)?\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}\b",
        ),
        (PiiType::Ssn, r"\b\d{3}-\d{2}-\d{4}\b"),
        (PiiType::CreditCard, r"\b(?:\d{4}[-\s]?){3}\d{1,4}\b"),
        (PiiType::IpAddress, r"\b(?:\d{1,3}\.){3}\d{1,3}\b"),
    ];

    table
        .into_iter()
        .map(|(kind, pattern)| {
            let re = Regex::new(pattern).expect("built-in PII pattern must compile");
            (kind, re)
        })
        .collect()
});

/// Scanner over the built-in PII recognizer family.
///
/// Stateless; construct freely or share one instance.
#[derive(Debug, Clone, Copy, Default)]
pub struct PiiScanner;

impl PiiScanner {
    pub fn new() -> Self {
        Self
    }

    /// Scan `text` with every recognizer and count matches per category.
    pub fn scan(&self, text: &str) -> PiiScanResult {
        let mut by_type = HashMap::new();
        let mut total_matches = 0;

        for (kind, re) in RECOGNIZERS.iter() {
            let count = re.find_iter(text).count();
            if count > 0 {
                by_type.insert(*kind, count);
                total_matches += count;
            }
        }

        PiiScanResult {
            has_pii: total_matches > 0,
            by_type,
            total_matches,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_detected() {
        let result = PiiScanner::new().scan("Contact me at alice@example.com");
        assert!(result.has_pii);
        assert_eq!(result.by_type.get(&PiiType::Email), Some(&1));
    }

    #[test]
    fn test_email_inline_without_whitespace() {
        let result = PiiScanner::new().scan("mail:bob.smith+tag@mail.co,cheers");
        assert_eq!(result.by_type.get(&PiiType::Email), Some(&1));
    }

    #[test]
    fn test_phone_formats() {
        let scanner = PiiScanner::new();
        for text in [
            "call 555-123-4567 today",
            "call (555) 123-4567 today",
            "call +1 555.123.4567 today",
        ] {
            let result = scanner.scan(text);
            assert!(
                result.by_type.contains_key(&PiiType::Phone),
                "missed phone in {text:?}"
            );
        }
    }

    #[test]
    fn test_ssn_detected() {
        let result = PiiScanner::new().scan("my ssn is 123-45-6789");
        assert_eq!(result.by_type.get(&PiiType::Ssn), Some(&1));
    }

    #[test]
    fn test_credit_card_with_and_without_separators() {
        let scanner = PiiScanner::new();
        assert!(scanner
            .scan("card 4111 1111 1111 1111 exp 12/27")
            .by_type
            .contains_key(&PiiType::CreditCard));
        assert!(scanner
            .scan("card 4111111111111111")
            .by_type
            .contains_key(&PiiType::CreditCard));
    }

    #[test]
    fn test_ipv4_detected() {
        let result = PiiScanner::new().scan("server at 192.168.0.1 is up");
        assert_eq!(result.by_type.get(&PiiType::IpAddress), Some(&1));
    }

    #[test]
    fn test_clean_text_has_no_pii() {
        let result = PiiScanner::new().scan("Hello, how can I help you today?");
        assert!(!result.has_pii);
        assert_eq!(result.total_matches, 0);
        assert!(result.by_type.is_empty());
    }

    #[test]
    fn test_multiple_categories_counted() {
        let result = PiiScanner::new().scan("alice@example.com or 10.0.0.2");
        assert!(result.has_pii);
        assert_eq!(result.total_matches, 2);
        assert_eq!(result.by_type.len(), 2);
    }
}
