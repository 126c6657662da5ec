//! Pre-parse exclusion and schema conformance.
//!
//! Two small guarantees live here:
//!
//! - [`ExcludeFilter`] drops known-irrelevant paths (staging areas,
//!   `latest` symlink farms) *before* any parser runs on them.
//! - [`conform`] coerces a parsed [`AttributeSet`] to exactly the
//!   declared schema: missing attributes become null cells, undeclared
//!   extras are dropped. Every row of the final table therefore exposes
//!   the identical column set, whichever parser strategy produced it.

use crate::catalog::{AttrValue, AttributeSet, Schema};
use crate::globlike::{GlobPattern, GlobPatternError};

/// A set of wildcard patterns marking paths to skip entirely.
#[derive(Debug, Clone, Default)]
pub struct ExcludeFilter {
    patterns: Vec<GlobPattern>,
}

impl ExcludeFilter {
    /// Compile the given exclude patterns.
    pub fn new(patterns: &[String]) -> Result<Self, GlobPatternError> {
        let patterns = patterns
            .iter()
            .map(|p| GlobPattern::new(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// Whether `path` matches any exclude pattern.
    pub fn is_excluded(&self, path: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(path))
    }

    /// Drop excluded paths from a candidate list.
    pub fn retain(&self, paths: Vec<String>) -> Vec<String> {
        if self.patterns.is_empty() {
            return paths;
        }
        paths.into_iter().filter(|p| !self.is_excluded(p)).collect()
    }
}

/// Align one attribute set to the schema's exact column set.
pub fn conform(schema: &Schema, attrs: &AttributeSet) -> Vec<AttrValue> {
    schema
        .columns()
        .iter()
        .map(|col| attrs.get(col).cloned().unwrap_or(AttrValue::Null))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exclude_filter_drops_latest_segments() {
        let filter = ExcludeFilter::new(&[
            "*/files/*".to_string(),
            "*/latest/*".to_string(),
        ])
        .expect("valid patterns");

        let kept = filter.retain(vec![
            "/data/NCAR/latest/tas.nc".to_string(),
            "/data/NCAR/v20190308/tas.nc".to_string(),
            "/data/NCAR/files/d123/tas.nc".to_string(),
        ]);

        assert_eq!(kept, vec!["/data/NCAR/v20190308/tas.nc".to_string()]);
    }

    #[test]
    fn empty_filter_keeps_everything() {
        let filter = ExcludeFilter::default();
        let paths = vec!["/a.nc".to_string(), "/b.nc".to_string()];
        assert_eq!(filter.retain(paths.clone()), paths);
    }

    #[test]
    fn conform_nulls_missing_and_drops_extras() {
        let schema = Schema::from_names(&["variable", "version", "path"]).expect("valid schema");

        let mut attrs = AttributeSet::new();
        attrs.insert("variable".to_string(), "tas".into());
        attrs.insert("path".to_string(), "/a/tas.nc".into());
        attrs.insert("undeclared".to_string(), "dropped".into());

        let row = conform(&schema, &attrs);
        assert_eq!(
            row,
            vec![
                AttrValue::from("tas"),
                AttrValue::Null,
                AttrValue::from("/a/tas.nc"),
            ]
        );
    }
}
