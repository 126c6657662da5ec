//! CESM history-file naming conventions.
//!
//! CESM output does not carry a DRS-style directory tree; the file name
//! itself interleaves case, component stream, variable, and date range:
//!
//! ```text
//! <case>.<stream>.<variable>.<date_range>.nc
//! e.g. b.e21.BHIST.f09_g17.CMIP6-historical.010.cam.h0.TREFHT.185001-189912.nc
//! ```
//!
//! Which substrings are streams (and which component each belongs to)
//! is not derivable from the name alone, so [`CesmConvention`] is
//! configured from a YAML definitions document mapping components to
//! their stream names and experiments to per-case constant attributes.
//! Streams are tried longest-first: `cam.h0.pop` must not be split on a
//! shorter stream that happens to be a substring.
//!
//! [`CesmTimeseriesConvention`] covers single-variable time-series
//! output whose metadata lives *inside* the file; it delegates to the
//! [`AssetIntrospector`] collaborator instead of the file name.

use std::collections::BTreeMap;
use std::sync::Arc;

use regex::Regex;
use snafu::prelude::*;

use crate::catalog::{AttrValue, AttributeSet, Schema, PATH_COLUMN};
use crate::descriptor::AggregationHints;
use crate::parse::extract::{extract_attr, extraction_regex};
use crate::parse::{basename, AssetIntrospector, Convention, ConventionInitError};

const NAME: &str = "cesm";
const TIMESERIES_NAME: &str = "cesm-ts";

/// All the date-range shapes CESM writes into file names.
const DATE_RANGE_REGEX: &str = r"\d{4}\-\d{4}|\d{6}\-\d{6}|\d{8}\-\d{8}|\d{10}Z\-\d{10}Z|\d{12}Z\-\d{12}Z|\d{10}\-\d{10}|\d{12}\-\d{12}";

/// Trailing case-member counter, e.g. the `.010` in `CMIP6-historical.010`.
const MEMBER_SUFFIX_REGEX: &str = r".\d{3}$";

const COLUMNS: &[&str] = &[
    "experiment",
    "case",
    "component",
    "stream",
    "variable",
    "date_range",
    "member_id",
    "path",
    "ctrl_branch_year",
    "ctrl_experiment",
    "ctrl_member_id",
];

/// Per-experiment constants declared in the definitions document.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct ExperimentDefinition {
    /// Constant attributes per case name (member id, control-run
    /// branch metadata, ...), merged into every asset of that case.
    #[serde(default)]
    pub case_members: BTreeMap<String, AttributeSet>,
}

/// The YAML definitions document configuring [`CesmConvention`].
#[derive(Debug, Clone, serde::Deserialize)]
pub struct CesmDefinitions {
    /// Component name to the stream strings it writes.
    pub component_streams: BTreeMap<String, Vec<String>>,
    /// Experiment name to its per-case constants. Lookup is
    /// case-insensitive on the experiment name.
    #[serde(default)]
    pub experiments: BTreeMap<String, ExperimentDefinition>,
}

impl CesmDefinitions {
    /// Parse a definitions document from YAML text.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConventionInitError> {
        serde_yaml::from_str(text).context(super::DefinitionsSnafu)
    }
}

/// The stream-table driven CESM parsing strategy.
pub struct CesmConvention {
    definitions: CesmDefinitions,
    /// (component, stream) pairs, longest stream first.
    streams: Vec<(String, String)>,
    /// Lowercased experiment name to its declared spelling.
    experiment_names: BTreeMap<String, String>,
    date_re: Regex,
    member_re: Regex,
    schema: Schema,
}

impl CesmConvention {
    /// Build the strategy from a definitions document.
    pub fn new(definitions: CesmDefinitions) -> Result<Self, ConventionInitError> {
        let mut streams: Vec<(String, String)> = definitions
            .component_streams
            .iter()
            .flat_map(|(component, names)| {
                names
                    .iter()
                    .map(move |s| (component.clone(), s.clone()))
            })
            .collect();
        // Longest stream first; name order breaks ties deterministically.
        streams.sort_by(|a, b| b.1.len().cmp(&a.1.len()).then_with(|| a.cmp(b)));

        let experiment_names = definitions
            .experiments
            .keys()
            .map(|k| (k.to_lowercase(), k.clone()))
            .collect();

        let date_re = extraction_regex(DATE_RANGE_REGEX).context(super::PatternSnafu {
            convention: NAME,
        })?;
        let member_re = extraction_regex(MEMBER_SUFFIX_REGEX).context(super::PatternSnafu {
            convention: NAME,
        })?;
        let schema = Schema::from_names(COLUMNS).context(super::InvalidSchemaSnafu {
            convention: NAME,
        })?;

        Ok(Self {
            definitions,
            streams,
            experiment_names,
            date_re,
            member_re,
            schema,
        })
    }

    fn case_constants(&self, experiment: &str, case: &str) -> Option<&AttributeSet> {
        let declared = self.experiment_names.get(&experiment.to_lowercase())?;
        self.definitions
            .experiments
            .get(declared)?
            .case_members
            .get(case)
    }
}

impl Convention for CesmConvention {
    fn name(&self) -> &str {
        NAME
    }

    fn schema(&self) -> Schema {
        self.schema.clone()
    }

    fn parse(&self, path: &str) -> AttributeSet {
        let name = basename(path);
        let mut attrs = AttributeSet::new();
        attrs.insert(PATH_COLUMN.to_string(), AttrValue::from(path));

        let matched = self
            .streams
            .iter()
            .find_map(|(component, stream)| {
                name.find(stream).map(|at| (component, stream, at))
            });
        let (component, stream, at) = match matched {
            Some(found) => found,
            None => {
                log::warn!("failed to parse file: {path}: no known stream in '{name}'");
                return attrs;
            }
        };

        let case = name[..at].trim_matches('.').to_string();
        let mut experiment = case
            .rsplit("CMIP6-")
            .next()
            .unwrap_or(case.as_str())
            .to_string();
        if let Some(member_suffix) = extract_attr(&experiment, &self.member_re, None) {
            if let Some((head, _)) = experiment.split_once(&member_suffix) {
                experiment = head.to_string();
            }
        }

        let date_range = extract_attr(name, &self.date_re, None);
        let rest = name[at + stream.len()..].trim_matches('.');
        let variable = match &date_range {
            Some(range) => rest.split(range.as_str()).next().unwrap_or(rest),
            None => rest,
        }
        .trim_matches('.');

        attrs.insert("case".to_string(), AttrValue::from(case.as_str()));
        attrs.insert("variable".to_string(), AttrValue::from(variable));
        attrs.insert(
            "date_range".to_string(),
            match &date_range {
                Some(range) => AttrValue::from(range.as_str()),
                None => AttrValue::Null,
            },
        );
        attrs.insert("stream".to_string(), AttrValue::from(stream.as_str()));
        attrs.insert("component".to_string(), AttrValue::from(component.as_str()));
        attrs.insert("experiment".to_string(), AttrValue::from(experiment.as_str()));

        if let Some(constants) = self.case_constants(&experiment, &case) {
            attrs = crate::catalog::merge(&attrs, constants);
        }
        attrs
    }

    fn aggregation(&self) -> AggregationHints {
        AggregationHints {
            variable_column: Some("variable".to_string()),
            groupby: vec![
                "experiment".to_string(),
                "component".to_string(),
                "stream".to_string(),
            ],
            join_existing: Some("date_range".to_string()),
        }
    }
}

/// CESM single-variable time-series strategy: everything interesting is
/// inside the file, so parsing is delegated to the introspector.
pub struct CesmTimeseriesConvention {
    introspector: Arc<dyn AssetIntrospector>,
    schema: Schema,
}

impl CesmTimeseriesConvention {
    /// Wrap an introspector as a convention.
    pub fn new(
        introspector: Arc<dyn AssetIntrospector>,
    ) -> Result<Self, ConventionInitError> {
        let schema = Schema::from_names(&["variable", PATH_COLUMN]).context(
            super::InvalidSchemaSnafu {
                convention: TIMESERIES_NAME,
            },
        )?;
        Ok(Self {
            introspector,
            schema,
        })
    }
}

impl Convention for CesmTimeseriesConvention {
    fn name(&self) -> &str {
        TIMESERIES_NAME
    }

    /// The minimal column set. Introspected global attributes land in
    /// whatever extra columns the caller declares via a schema
    /// override; undeclared ones are dropped by conformance.
    fn schema(&self) -> Schema {
        self.schema.clone()
    }

    fn parse(&self, path: &str) -> AttributeSet {
        let mut attrs = AttributeSet::new();
        attrs.insert(PATH_COLUMN.to_string(), AttrValue::from(path));

        let info = match self.introspector.introspect(path) {
            Ok(info) => info,
            Err(e) => {
                log::warn!("failed to introspect {path}: {e}");
                return attrs;
            }
        };

        attrs.insert(
            "variable".to_string(),
            AttrValue::from(info.variables.join(",")),
        );
        for (key, value) in info.global_attrs {
            attrs.insert(key, AttrValue::from(value));
        }
        attrs
    }

    fn aggregation(&self) -> AggregationHints {
        AggregationHints {
            variable_column: Some("variable".to_string()),
            groupby: Vec::new(),
            join_existing: None,
        }
    }
}
