//! Medical Term Scanner
//!
//! Built-in vocabulary for medical content: diagnosis, treatment,
//! prescription, record, and insurance terms. Same single-alternation
//! construction as the financial scanner.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

const VOCABULARY: &[&str] = &[
    // Diagnosis and prognosis
    "diagnosis",
    "diagnosed with",
    "prognosis",
    "symptoms",
    "chronic condition",
    // Treatment
    "treatment plan",
    "chemotherapy",
    "radiation therapy",
    "physical therapy",
    "surgery",
    "side effects",
    "contraindication",
    // Prescription
    "prescription",
    "prescribed",
    "dosage",
    "medication",
    "antibiotics",
    "insulin",
    "painkillers",
    // Records and codes
    "medical record",
    "patient record",
    "patient chart",
    "health record",
    "medical history",
    "lab results",
    "blood test",
    "mri scan",
    "x-ray",
    "icd-10",
    "cpt code",
    // Insurance
    "health insurance",
    "insurance claim",
    "copay",
    "deductible",
    "preauthorization",
    "hipaa",
];

static MATCHER: Lazy<Regex> = Lazy::new(|| {
    let alternation = VOCABULARY
        .iter()
        .map(|term| regex::escape(term))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b(?:{alternation})\b"))
        .expect("built-in medical vocabulary must compile")
});

/// Result of a medical vocabulary scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicalScanResult {
    /// Whether any vocabulary entry matched
    pub flagged: bool,
    /// Matched terms, lowercased, in order of appearance
    pub matched_terms: Vec<String>,
}

/// Scanner over the built-in medical vocabulary.
#[derive(Debug, Clone, Copy, Default)]
pub struct MedicalTermScanner;

impl MedicalTermScanner {
    pub fn new() -> Self {
        Self
    }

    pub fn scan(&self, text: &str) -> MedicalScanResult {
        let matched_terms: Vec<String> = MATCHER
            .find_iter(text)
            .map(|m| m.as_str().to_lowercase())
            .collect();

        MedicalScanResult {
            flagged: !matched_terms.is_empty(),
            matched_terms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prescription_terms_detected() {
        let result =
            MedicalTermScanner::new().scan("Your prescription is ready; check the dosage");
        assert!(result.flagged);
        assert_eq!(result.matched_terms, vec!["prescription", "dosage"]);
    }

    #[test]
    fn test_record_terms_detected() {
        let result = MedicalTermScanner::new().scan("I pulled up your MEDICAL RECORD and lab results");
        assert_eq!(result.matched_terms.len(), 2);
    }

    #[test]
    fn test_insurance_terms_detected() {
        let result = MedicalTermScanner::new().scan("file an insurance claim before the copay is due");
        assert!(result.flagged);
    }

    #[test]
    fn test_clean_text() {
        let result = MedicalTermScanner::new().scan("Let's schedule a call for Tuesday");
        assert!(!result.flagged);
    }
}
