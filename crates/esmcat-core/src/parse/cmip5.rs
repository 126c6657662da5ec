//! CMIP5 Data Reference Syntax convention.
//!
//! File name:
//! `<variable>_<mip_table>_<model>_<experiment>_<ensemble_member>[_<temporal_subset>].nc`.
//! Frequency, realm, and version live in directory names and are
//! recovered with longest-match regex extraction; the institute and
//! product identifiers precede the model segment in the directory tree
//! and are found by splitting the parent directory on the resolved
//! experiment.
//!
//! Reference: the CMIP5 data reference syntax document (PCMDI).

use regex::Regex;

use crate::catalog::{AttrValue, AttributeSet, Schema, PATH_COLUMN, VERSION_COLUMN};
use crate::descriptor::AggregationHints;
use crate::parse::extract::{extract_attr, extraction_regex};
use crate::parse::template::{reverse_parse, FilenameTemplate};
use crate::parse::{basename, parent_dir, Convention, ConventionInitError};
use snafu::prelude::*;

const NAME: &str = "cmip5";

const FILENAME_TEMPLATE: &str =
    "{variable}_{mip_table}_{model}_{experiment}_{ensemble_member}_{temporal_subset}.nc";
const GRIDSPEC_TEMPLATE: &str =
    "{variable}_{mip_table}_{model}_{experiment}_{ensemble_member}.nc";

const FREQUENCY_REGEX: &str = r"/3hr/|/6hr/|/day/|/fx/|/mon/|/monClim/|/subhr/|/yr/";
const REALM_REGEX: &str = r"aerosol|atmos|land|landIce|ocean|ocnBgchem|seaIce";
const VERSION_REGEX: &str = r"v\d{8}|v\d{1}";

const COLUMNS: &[&str] = &[
    "product_id",
    "institute",
    "model",
    "experiment",
    "frequency",
    "modeling_realm",
    "mip_table",
    "ensemble_member",
    "variable",
    "temporal_subset",
    "version",
    "path",
];

/// The CMIP5 parsing strategy.
pub struct Cmip5Convention {
    templates: Vec<FilenameTemplate>,
    frequency_re: Regex,
    realm_re: Regex,
    version_re: Regex,
    schema: Schema,
}

impl Cmip5Convention {
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
        let frequency_re = extraction_regex(FREQUENCY_REGEX).context(super::PatternSnafu {
            convention: NAME,
        })?;
        let realm_re = extraction_regex(REALM_REGEX).context(super::PatternSnafu {
            convention: NAME,
        })?;
        let version_re = extraction_regex(VERSION_REGEX).context(super::PatternSnafu {
            convention: NAME,
        })?;
        let schema = Schema::from_names(COLUMNS).context(super::InvalidSchemaSnafu {
            convention: NAME,
        })?;
        Ok(Self {
            templates,
            frequency_re,
            realm_re,
            version_re,
            schema,
        })
    }

    /// Institute and product sit two and three segments before the
    /// model directory; both are recovered by splitting the parent on
    /// the resolved experiment. Unresolvable paths leave them unset.
    fn enrich_from_directory(path: &str, attrs: &mut AttributeSet) {
        let parent = parent_dir(path);
        if let Some(experiment) = attrs.get("experiment").and_then(AttrValue::as_str) {
            if let Some((head, _)) = parent.split_once(experiment) {
                let segments: Vec<&str> = head.trim_matches('/').split('/').collect();
                if segments.len() >= 3 {
                    attrs.insert(
                        "institute".to_string(),
                        AttrValue::from(segments[segments.len() - 2]),
                    );
                    attrs.insert(
                        "product_id".to_string(),
                        AttrValue::from(segments[segments.len() - 3]),
                    );
                }
            }
        }
    }
}

impl Convention for Cmip5Convention {
    fn name(&self) -> &str {
        NAME
    }

    fn schema(&self) -> Schema {
        self.schema.clone()
    }

    fn parse(&self, path: &str) -> AttributeSet {
        let mut attrs = reverse_parse(basename(path), &self.templates);
        if attrs.is_empty() {
            let mut only_path = AttributeSet::new();
            only_path.insert(PATH_COLUMN.to_string(), AttrValue::from(path));
            return only_path;
        }
        attrs.insert(PATH_COLUMN.to_string(), AttrValue::from(path));

        if let Some(frequency) = extract_attr(path, &self.frequency_re, Some("/")) {
            attrs.insert("frequency".to_string(), AttrValue::from(frequency));
        }
        if let Some(realm) = extract_attr(path, &self.realm_re, None) {
            attrs.insert("modeling_realm".to_string(), AttrValue::from(realm));
        }
        let version =
            extract_attr(path, &self.version_re, None).unwrap_or_else(|| "v0".to_string());
        attrs.insert(VERSION_COLUMN.to_string(), AttrValue::from(version));

        Self::enrich_from_directory(path, &mut attrs);
        attrs
    }

    fn aggregation(&self) -> AggregationHints {
        AggregationHints {
            variable_column: Some("variable".to_string()),
            groupby: vec![
                "product_id".to_string(),
                "institute".to_string(),
                "model".to_string(),
                "experiment".to_string(),
                "frequency".to_string(),
                "modeling_realm".to_string(),
                "mip_table".to_string(),
            ],
            join_existing: Some("temporal_subset".to_string()),
        }
    }
}
