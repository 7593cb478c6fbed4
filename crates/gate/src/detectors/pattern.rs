//! Regex Detector
//!
//! Runs the pre-compiled expressions of a REGEX rule. Compilation (and the
//! rejection of invalid or oversized patterns) happens once per rule version
//! at snapshot build; see `rules::compile`.

use regex::Regex;

/// Return the source of every expression that matches `text`.
pub fn find_matches<'a>(text: &str, regexes: &'a [Regex]) -> Vec<&'a str> {
    regexes
        .iter()
        .filter(|re| re.is_match(text))
        .map(|re| re.as_str())
        .collect()
}
