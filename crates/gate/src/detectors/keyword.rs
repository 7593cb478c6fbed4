//! Keyword Detector
//!
//! Case-insensitive substring search. The engine lowercases the candidate
//! reply once per request; patterns are lowercased at rule-compile time, so
//! the scan itself is pure substring containment.

/// Return every pattern that occurs in `text_lower`.
///
/// Both sides must already be lowercase.
pub fn find_matches(text_lower: &str, patterns: &[String]) -> Vec<String> {
    patterns
        .iter()
        .filter(|pattern| text_lower.contains(pattern.as_str()))
        .cloned()
        .collect()
}
