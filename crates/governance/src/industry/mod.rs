//! Industry Vocabulary Module
//!
//! Term scanners by industry vertical:
//! - finance: banking identifiers, card brands, scam idioms, crypto phrasing
//! - healthcare: diagnosis, treatment, prescription, record, insurance terms

pub mod finance;
pub mod healthcare;
