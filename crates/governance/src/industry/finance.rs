//! Financial Term Scanner
//!
//! Built-in vocabulary for financial content: banking identifiers, card
//! brands, investment/scam idioms, and crypto wallet/seed phrasing. The
//! vocabulary compiles once into a single case-insensitive alternation.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Built-in financial vocabulary. Multi-word entries match as phrases.
const VOCABULARY: &[&str] = &[
    // Banking identifiers
    "iban",
    "swift code",
    "bic code",
    "routing number",
    "sort code",
    "account number",
    "bank account",
    "wire transfer",
    // Card brands and card data
    "visa",
    "mastercard",
    "amex",
    "american express",
    "card number",
    "credit card",
    "debit card",
    "cvv",
    // Investment and scam idioms
    "guaranteed returns",
    "guaranteed profit",
    "risk-free investment",
    "double your money",
    "get rich quick",
    "ponzi",
    "pyramid scheme",
    "pump and dump",
    "insider tip",
    "wealth management",
    // Crypto wallet and seed phrasing
    "bitcoin",
    "btc",
    "ethereum",
    "crypto wallet",
    "wallet address",
    "seed phrase",
    "recovery phrase",
    "private key",
    "send crypto",
    "initial coin offering",
];

static MATCHER: Lazy<Regex> = Lazy::new(|| {
    let alternation = VOCABULARY
        .iter()
        .map(|term| regex::escape(term))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b(?:{alternation})\b"))
        .expect("built-in financial vocabulary must compile")
});

/// Result of a financial vocabulary scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancialScanResult {
    /// Whether any vocabulary entry matched
    pub flagged: bool,
    /// Matched terms, lowercased, in order of appearance
    pub matched_terms: Vec<String>,
}

/// Scanner over the built-in financial vocabulary.
#[derive(Debug, Clone, Copy, Default)]
pub struct FinancialTermScanner;

impl FinancialTermScanner {
    pub fn new() -> Self {
        Self
    }

    pub fn scan(&self, text: &str) -> FinancialScanResult {
        let matched_terms: Vec<String> = MATCHER
            .find_iter(text)
            .map(|m| m.as_str().to_lowercase())
            .collect();

        FinancialScanResult {
            flagged: !matched_terms.is_empty(),
            matched_terms,
        }
    }
}
