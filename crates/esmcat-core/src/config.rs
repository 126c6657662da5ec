//! Declarative multi-dataset collection definitions.
//!
//! A collection definition is a small YAML document describing one or
//! more logical datasets, each with its discovery patterns and literal
//! attributes:
//!
//! ```yaml
//! id: cesm2-runs
//! description: CESM2 production runs
//! columns: [experiment, member_id, variable, path]
//! exclude_patterns: ["*/latest/*"]
//! datasets:
//!   historical:
//!     convention: cmip6
//!     attributes:
//!       experiment: historical
//!     data_sources:
//!       - glob: /data/cesm2/hist/**.nc
//!         attributes:
//!           member_id: r1i1p1f1
//! ```
//!
//! The document is deserialized into a typed structure and then passed
//! through an explicit [`CollectionConfig::validate`] step that returns
//! a structured issue list rather than printed diagnostics. Validation
//! failures abort a build before any I/O is attempted.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::Deserialize;
use snafu::prelude::*;

use crate::catalog::{AttributeSet, Schema};
use crate::globlike::GlobPattern;
use crate::storage::{self, StorageError, StorageLocation};

/// One discovery pattern with the literal attributes attached to every
/// asset it yields.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataSourceConfig {
    /// Wildcard pattern locating this source's files.
    #[serde(default)]
    pub glob: String,
    /// Constants merged into every asset of this source. These win
    /// over dataset-level attributes on key collisions.
    #[serde(default)]
    pub attributes: AttributeSet,
}

/// One logical dataset: its sources plus dataset-wide constants.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatasetConfig {
    /// Naming convention used to parse this dataset's paths. Omitted
    /// means no path parsing: rows carry only the declared attributes.
    #[serde(default)]
    pub convention: Option<String>,
    /// Constants merged into every asset of the dataset.
    #[serde(default)]
    pub attributes: AttributeSet,
    /// The dataset's discovery sources, in declaration order.
    #[serde(default)]
    pub data_sources: Vec<DataSourceConfig>,
}

/// The whole collection definition.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CollectionConfig {
    /// Identifier of the collection; names the output files.
    #[serde(default)]
    pub id: String,
    /// Human-readable description carried into the descriptor.
    #[serde(default)]
    pub description: String,
    /// Declared catalog columns. Must include `path`.
    #[serde(default)]
    pub columns: Vec<String>,
    /// Paths matching any of these patterns are skipped before parsing.
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
    /// Keep only the latest version per otherwise-identical row.
    #[serde(default)]
    pub pick_latest_version: bool,
    /// The datasets composing this collection.
    #[serde(default)]
    pub datasets: BTreeMap<String, DatasetConfig>,
}

/// One problem found while validating a collection definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    /// Where the problem sits (`collection` or a dataset name).
    pub context: String,
    /// What is wrong.
    pub detail: String,
}

impl ConfigIssue {
    fn collection(detail: impl Into<String>) -> Self {
        Self {
            context: "collection".to_string(),
            detail: detail.into(),
        }
    }

    fn dataset(name: &str, detail: impl Into<String>) -> Self {
        Self {
            context: format!("dataset '{name}'"),
            detail: detail.into(),
        }
    }
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.context, self.detail)
    }
}

/// Errors raised while loading or validating a collection definition.
#[derive(Debug, Snafu)]
pub enum ConfigError {
    /// The definition file could not be read.
    #[snafu(display("cannot read collection definition: {source}"))]
    Read {
        /// Underlying storage error.
        source: StorageError,
    },

    /// The document is not valid YAML of the expected shape (this also
    /// covers a top level that is not a mapping).
    #[snafu(display("malformed collection definition: {source}"))]
    Syntax {
        /// Underlying YAML error.
        source: serde_yaml::Error,
    },

    /// The document parsed but is semantically invalid.
    #[snafu(display("invalid collection definition: {}", format_issues(issues)))]
    Invalid {
        /// Every problem found, so the operator can fix them in one go.
        issues: Vec<ConfigIssue>,
    },
}

fn format_issues(issues: &[ConfigIssue]) -> String {
    issues
        .iter()
        .map(ConfigIssue::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl CollectionConfig {
    /// Parse a collection definition from YAML text.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(text).context(SyntaxSnafu)
    }

    /// Read and parse a collection definition file.
    pub async fn load(location: &StorageLocation, rel: &Path) -> Result<Self, ConfigError> {
        let text = storage::read_to_string(location, rel)
            .await
            .context(ReadSnafu)?;
        Self::from_yaml_str(&text)
    }

    /// Check the definition for semantic problems.
    ///
    /// Every problem is reported; an empty list means the definition
    /// can be built.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if self.id.trim().is_empty() {
            issues.push(ConfigIssue::collection("id must be non-empty"));
        }
        if self.columns.is_empty() {
            issues.push(ConfigIssue::collection("columns must be declared"));
        } else if let Err(e) = Schema::new(self.columns.clone()) {
            issues.push(ConfigIssue::collection(format!(
                "invalid columns: {e}"
            )));
        }
        for pattern in &self.exclude_patterns {
            if let Err(e) = GlobPattern::new(pattern) {
                issues.push(ConfigIssue::collection(format!("{e}")));
            }
        }
        if self.datasets.is_empty() {
            issues.push(ConfigIssue::collection(
                "at least one dataset must be declared",
            ));
        }

        for (name, dataset) in &self.datasets {
            if dataset.data_sources.is_empty() {
                issues.push(ConfigIssue::dataset(
                    name,
                    "must declare at least one entry in data_sources",
                ));
            }
            for (index, source) in dataset.data_sources.iter().enumerate() {
                if source.glob.trim().is_empty() {
                    issues.push(ConfigIssue::dataset(
                        name,
                        format!("data_sources[{index}] must declare a glob pattern"),
                    ));
                } else if let Err(e) = GlobPattern::new(&source.glob) {
                    issues.push(ConfigIssue::dataset(
                        name,
                        format!("data_sources[{index}]: {e}"),
                    ));
                }
            }
        }

        issues
    }

    /// The validated schema declared by `columns`.
    ///
    /// Callers run [`validate`](Self::validate) first; this re-checks
    /// so misuse cannot smuggle an invalid schema into a build.
    pub fn schema(&self) -> Result<Schema, ConfigError> {
        Schema::new(self.columns.clone()).map_err(|e| ConfigError::Invalid {
            issues: vec![ConfigIssue::collection(format!("invalid columns: {e}"))],
        })
    }
}
