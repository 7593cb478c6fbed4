//! Moderail Governance: Built-in Compliance Scanners
//!
//! The dictionaries and recognizers the gate's built-in rule kinds are backed
//! by. Scanners are pure functions over a text string: no configuration, no
//! I/O, no mutable state beyond lazily compiled pattern tables, safe to call
//! concurrently from any number of request workers.
//!
//! # Structure
//!
//! - `privacy`: personally identifiable information recognizers
//! - `industry`: industry vocabularies (finance, healthcare)

pub mod industry;
pub mod privacy;

pub use industry::finance::{FinancialScanResult, FinancialTermScanner};
pub use industry::healthcare::{MedicalScanResult, MedicalTermScanner};
pub use privacy::{PiiScanResult, PiiScanner, PiiType};
