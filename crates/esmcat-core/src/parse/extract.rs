//! Longest-match regex attribute extraction.
//!
//! Directory-embedded attributes (version tags, frequencies, realms)
//! are pulled out of a path with a regex rather than a template. When
//! the regex matches in several places, the **longest** match wins:
//! a full `v20200101` beats a bare `v2` hiding inside it.

use regex::{Regex, RegexBuilder};

/// Compile an extraction regex, case-insensitive by default to match
/// the loosely-cased vocabulary found in real archive trees.
pub fn extraction_regex(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern).case_insensitive(true).build()
}

/// Find every match of `re` in `input` and return the longest one,
/// trimmed of `strip_chars` (or of surrounding whitespace when no strip
/// set is given). Returns `None` when nothing matches.
pub fn extract_attr(input: &str, re: &Regex, strip_chars: Option<&str>) -> Option<String> {
    let longest = re
        .find_iter(input)
        .map(|m| m.as_str())
        .max_by_key(|m| m.len())?;

    let stripped = match strip_chars {
        Some(chars) => longest.trim_matches(|c| chars.contains(c)),
        None => longest.trim(),
    };
    Some(stripped.to_string())
}
