//! Shell-style wildcard patterns compiled to regular expressions.
//!
//! Exclude rules and data-source discovery patterns use the classic
//! `fnmatch` dialect: `*` matches any run of characters **including**
//! path separators (which is what makes `*/latest/*` exclude every path
//! containing a `/latest/` segment) and `?` matches exactly one
//! character. Patterns are anchored to the whole string.

use regex::Regex;
use snafu::prelude::*;

/// A compiled wildcard pattern.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    raw: String,
    re: Regex,
}

/// Errors raised while compiling a wildcard pattern.
#[derive(Debug, Snafu)]
pub enum GlobPatternError {
    /// The translated pattern failed to compile as a regex.
    #[snafu(display("invalid pattern '{pattern}': {source}"))]
    Compile {
        /// The wildcard pattern as given.
        pattern: String,
        /// Underlying regex compilation error.
        source: regex::Error,
    },
}

impl GlobPattern {
    /// Compile a wildcard pattern.
    pub fn new(pattern: &str) -> Result<Self, GlobPatternError> {
        let re = Regex::new(&translate(pattern)).context(CompileSnafu {
            pattern: pattern.to_string(),
        })?;
        Ok(Self {
            raw: pattern.to_string(),
            re,
        })
    }

    /// The pattern as given by the caller.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether the whole of `candidate` matches this pattern.
    pub fn matches(&self, candidate: &str) -> bool {
        self.re.is_match(candidate)
    }

    /// Whether the pattern contains any wildcard at all.
    ///
    /// A wildcard-free pattern names exactly one path.
    pub fn is_literal(&self) -> bool {
        !self.raw.contains(['*', '?'])
    }

    /// The literal directory prefix preceding the first wildcard.
    ///
    /// Discovery walks from this directory before matching candidates
    /// against the full pattern. For `/data/cmip6/*/v*/file_*.nc` this is
    /// `/data/cmip6/`; a pattern with no leading literal directory yields
    /// an empty prefix.
    pub fn literal_dir_prefix(&self) -> &str {
        let wildcard_at = self
            .raw
            .find(['*', '?'])
            .unwrap_or(self.raw.len());
        match self.raw[..wildcard_at].rfind('/') {
            Some(slash) => &self.raw[..=slash],
            None => "",
        }
    }
}

/// Translate a wildcard pattern into an anchored regex source string.
fn translate(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    out.push('^');
    for ch in pattern.chars() {
        match ch {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            _ => out.push_str(&regex::escape(&ch.to_string())),
        }
    }
    out.push('$');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn star_crosses_path_separators() {
        let pat = GlobPattern::new("*/latest/*").expect("valid pattern");
        assert!(pat.matches("/data/cmip6/NCAR/latest/tas.nc"));
        assert!(pat.matches("a/latest/b"));
        assert!(!pat.matches("/data/cmip6/NCAR/v20190308/tas.nc"));
    }

    #[test]
    fn question_mark_matches_single_character() {
        let pat = GlobPattern::new("tas_v?.nc").expect("valid pattern");
        assert!(pat.matches("tas_v1.nc"));
        assert!(!pat.matches("tas_v12.nc"));
        assert!(!pat.matches("tas_v.nc"));
    }

    #[test]
    fn pattern_is_anchored() {
        let pat = GlobPattern::new("*.nc").expect("valid pattern");
        assert!(pat.matches("path/to/tas.nc"));
        assert!(!pat.matches("tas.nc.tmp"));
    }

    #[test]
    fn regex_metacharacters_are_literal() {
        let pat = GlobPattern::new("a.b+c/*.nc").expect("valid pattern");
        assert!(pat.matches("a.b+c/tas.nc"));
        assert!(!pat.matches("aXb+c/tas.nc"));
    }

    #[test]
    fn literal_dir_prefix_stops_at_first_wildcard() {
        let pat = GlobPattern::new("/data/cmip6/*/v*/file_*.nc").expect("valid pattern");
        assert_eq!(pat.literal_dir_prefix(), "/data/cmip6/");

        let pat = GlobPattern::new("*.nc").expect("valid pattern");
        assert_eq!(pat.literal_dir_prefix(), "");

        let pat = GlobPattern::new("/data/fixed/file.nc").expect("valid pattern");
        assert!(pat.is_literal());
        assert_eq!(pat.literal_dir_prefix(), "/data/fixed/");
    }
}
