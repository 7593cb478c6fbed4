//! Privacy Scanning Module
//!
//! Recognizers for personally identifiable information:
//! - Email addresses
//! - North-American phone numbers
//! - US Social Security Numbers
//! - Credit card numbers
//! - IPv4 addresses

pub mod pii;

pub use pii::*;
