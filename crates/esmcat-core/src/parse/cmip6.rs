//! CMIP6 Data Reference Syntax convention.
//!
//! Directory structure:
//!
//! ```text
//! <mip_era>/<activity_id>/<institution_id>/<source_id>/<experiment_id>/
//!     <member_id>/<table_id>/<variable_id>/<grid_label>/<version>/
//! ```
//!
//! File name:
//! `<variable_id>_<table_id>_<source_id>_<experiment_id>_<member_id>_<grid_label>[_<time_range>].nc`,
//! where time-invariant (gridspec) fields omit the final time-range
//! segment.
//!
//! References: CMIP6 DRS and the WCRP-CMIP controlled vocabularies.

use regex::Regex;

use crate::catalog::{AttrValue, AttributeSet, Schema, PATH_COLUMN, VERSION_COLUMN};
use crate::descriptor::AggregationHints;
use crate::parse::extract::{extract_attr, extraction_regex};
use crate::parse::template::{reverse_parse, FilenameTemplate};
use crate::parse::{basename, parent_dir, Convention, ConventionInitError};
use snafu::prelude::*;

const NAME: &str = "cmip6";

const FILENAME_TEMPLATE: &str =
    "{variable_id}_{table_id}_{source_id}_{experiment_id}_{member_id}_{grid_label}_{time_range}.nc";
const GRIDSPEC_TEMPLATE: &str =
    "{variable_id}_{table_id}_{source_id}_{experiment_id}_{member_id}_{grid_label}.nc";

/// Version directories are either dated (`v20190308`) or short-form
/// (`v2`); longest-match extraction prefers the dated form.
const VERSION_REGEX: &str = r"v\d{8}|v\d{1}";

const COLUMNS: &[&str] = &[
    "activity_id",
    "institution_id",
    "source_id",
    "experiment_id",
    "member_id",
    "table_id",
    "variable_id",
    "grid_label",
    "dcpp_init_year",
    "version",
    "time_range",
    "path",
];

/// The CMIP6 parsing strategy.
pub struct Cmip6Convention {
    templates: Vec<FilenameTemplate>,
    version_re: Regex,
    schema: Schema,
}

impl Cmip6Convention {
    /// Compile the convention's templates and regexes.
    pub fn new() -> Result<Self, ConventionInitError> {
        let templates = vec![
            FilenameTemplate::compile(FILENAME_TEMPLATE).context(super::TemplateSnafu {
                convention: NAME,
            })?,
            FilenameTemplate::compile(GRIDSPEC_TEMPLATE).context(super::TemplateSnafu {
                convention: NAME,
            })?,
        ];
        let version_re = extraction_regex(VERSION_REGEX).context(super::PatternSnafu {
            convention: NAME,
        })?;
        let schema = Schema::from_names(COLUMNS).context(super::InvalidSchemaSnafu {
            convention: NAME,
        })?;
        Ok(Self {
            templates,
            version_re,
            schema,
        })
    }

    /// Recover the attributes encoded in the directory hierarchy rather
    /// than the file name. Each step is independent; whatever cannot be
    /// recovered is simply left unset.
    fn enrich_from_directory(&self, path: &str, attrs: &mut AttributeSet) {
        let parent = parent_dir(path);

        let version = extract_attr(parent, &self.version_re, None)
            .unwrap_or_else(|| "v0".to_string());
        attrs.insert(VERSION_COLUMN.to_string(), AttrValue::from(version));

        if let Some(source_id) = attrs.get("source_id").and_then(AttrValue::as_str) {
            let marker = format!("/{source_id}/");
            if let Some((head, _)) = parent.split_once(&marker) {
                let segments: Vec<&str> = head.trim_matches('/').split('/').collect();
                if segments.len() >= 2 {
                    attrs.insert(
                        "activity_id".to_string(),
                        AttrValue::from(segments[segments.len() - 2]),
                    );
                    attrs.insert(
                        "institution_id".to_string(),
                        AttrValue::from(segments[segments.len() - 1]),
                    );
                }
            }
        }

        // The grid_label directory is authoritative over the filename
        // segment when both are present.
        if let Some(variable_id) = attrs.get("variable_id").and_then(AttrValue::as_str) {
            let marker = format!("/{variable_id}/");
            if let Some((_, tail)) = parent.split_once(&marker) {
                if let Some(grid_label) = tail.trim_matches('/').split('/').next() {
                    if !grid_label.is_empty() {
                        attrs.insert("grid_label".to_string(), AttrValue::from(grid_label));
                    }
                }
            }
        }
    }

    /// Decadal-prediction members carry an initialization marker:
    /// `s1960-r2i1p1f1` splits into a numeric `dcpp_init_year` and the
    /// residual `member_id`.
    fn split_dcpp_member(attrs: &mut AttributeSet) {
        let member = match attrs.get("member_id").and_then(AttrValue::as_str) {
            Some(m) if m.starts_with('s') && m.contains('-') => m.to_string(),
            _ => return,
        };
        let mut parts = member.splitn(2, '-');
        let marker = parts.next().unwrap_or_default();
        let residual = parts.next().unwrap_or_default();
        if let Ok(init_year) = marker[1..].parse::<f64>() {
            attrs.insert("dcpp_init_year".to_string(), AttrValue::Num(init_year));
            attrs.insert("member_id".to_string(), AttrValue::from(residual));
        }
    }
}

impl Convention for Cmip6Convention {
    fn name(&self) -> &str {
        NAME
    }

    fn schema(&self) -> Schema {
        self.schema.clone()
    }

    fn parse(&self, path: &str) -> AttributeSet {
        let mut attrs = reverse_parse(basename(path), &self.templates);
        if attrs.is_empty() {
            // No template matched; keep the asset discoverable with a
            // path-only row.
            let mut only_path = AttributeSet::new();
            only_path.insert(PATH_COLUMN.to_string(), AttrValue::from(path));
            return only_path;
        }

        attrs.insert(PATH_COLUMN.to_string(), AttrValue::from(path));
        self.enrich_from_directory(path, &mut attrs);
        Self::split_dcpp_member(&mut attrs);
        attrs
    }

    fn aggregation(&self) -> AggregationHints {
        AggregationHints {
            variable_column: Some("variable_id".to_string()),
            groupby: vec![
                "activity_id".to_string(),
                "institution_id".to_string(),
                "source_id".to_string(),
                "experiment_id".to_string(),
                "table_id".to_string(),
                "grid_label".to_string(),
            ],
            join_existing: Some("time_range".to_string()),
        }
    }
}
