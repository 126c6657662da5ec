//! Catalog assembly pipelines.
//!
//! Data flows strictly forward here: discovery produces candidate
//! paths, the exclude filter drops known-irrelevant ones, the selected
//! convention reverse-parses the survivors (a pure map, parallelized
//! per path), conformance aligns every attribute set to the declared
//! schema, and the rows are concatenated into one path-sorted table.
//! Latest-version pruning runs last, only when asked for.
//!
//! Two drivers exist:
//!
//! - [`CatalogBuilder`] builds one dataset from a root directory (or an
//!   explicit glob pattern) and one convention.
//! - [`build_collection`] drives many datasets from a declarative
//!   [`CollectionConfig`], merging per-source constant attributes and
//!   collapsing assets discovered by more than one source into a
//!   single row.

use rayon::prelude::*;

use crate::catalog::{
    merge, AttrValue, AttributeSet, Catalog, CatalogError, Schema, PATH_COLUMN,
};
use crate::config::{CollectionConfig, ConfigError, ConfigIssue};
use crate::discovery::{self, DiscoveryError, ListOptions};
use crate::globlike::{GlobPattern, GlobPatternError};
use crate::normalize::{conform, ExcludeFilter};
use crate::parse::{Convention, ConventionRegistry};
use crate::storage::StorageLocation;
use crate::version::resolve_latest;
use snafu::prelude::*;

/// Errors raised while assembling a catalog.
#[derive(Debug, Snafu)]
pub enum BuildError {
    /// An exclude or discovery pattern failed to compile.
    #[snafu(display("invalid pattern: {source}"))]
    Pattern {
        /// Underlying pattern error.
        source: GlobPatternError,
    },

    /// Asset discovery failed beyond the per-subdirectory recovery.
    #[snafu(display("asset discovery failed: {source}"))]
    Discovery {
        /// Underlying discovery error.
        source: DiscoveryError,
    },

    /// The collection definition is unusable.
    #[snafu(display("{source}"))]
    Config {
        /// Underlying configuration error.
        source: ConfigError,
    },

    /// A dataset named a convention the registry does not know.
    #[snafu(display("dataset '{dataset}' names unknown convention '{convention}'"))]
    UnknownConvention {
        /// The dataset whose definition is at fault.
        dataset: String,
        /// The unknown convention name.
        convention: String,
    },

    /// The assembled table violated a structural invariant.
    #[snafu(display("catalog assembly failed: {source}"))]
    Table {
        /// Underlying catalog error.
        source: CatalogError,
    },
}

/// Options for a single-dataset build.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Fan-out depth for discovery (see [`ListOptions::depth`]).
    pub depth: usize,
    /// File-name filter for discovery.
    pub extension: String,
    /// Wildcard patterns whose matches are skipped before parsing.
    pub exclude_patterns: Vec<String>,
    /// Declared column set; defaults to the convention's schema.
    pub schema: Option<Schema>,
    /// Keep only the latest version per otherwise-identical row.
    pub pick_latest_version: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            depth: 0,
            extension: "*.nc".to_string(),
            exclude_patterns: Vec::new(),
            schema: None,
            pick_latest_version: false,
        }
    }
}

/// Single-dataset catalog builder: one root (or glob), one convention.
pub struct CatalogBuilder<'a> {
    convention: &'a dyn Convention,
    options: BuildOptions,
}

impl<'a> CatalogBuilder<'a> {
    /// Create a builder for the given convention.
    pub fn new(convention: &'a dyn Convention, options: BuildOptions) -> Self {
        Self {
            convention,
            options,
        }
    }

    fn schema(&self) -> Schema {
        self.options
            .schema
            .clone()
            .unwrap_or_else(|| self.convention.schema())
    }

    /// Build a catalog from a recursive scan of `root`.
    pub async fn build(&self, root: &StorageLocation) -> Result<Catalog, BuildError> {
        let exclude =
            ExcludeFilter::new(&self.options.exclude_patterns).context(PatternSnafu)?;
        let list_options = ListOptions {
            depth: self.options.depth,
            extension: self.options.extension.clone(),
        };
        let paths = discovery::list_assets(root, &list_options)
            .await
            .context(DiscoverySnafu)?;
        self.assemble(exclude.retain(paths))
    }

    /// Build a catalog from an explicit glob pattern (no depth fan-out).
    pub async fn build_glob(&self, pattern: &str) -> Result<Catalog, BuildError> {
        let exclude =
            ExcludeFilter::new(&self.options.exclude_patterns).context(PatternSnafu)?;
        let pattern = GlobPattern::new(pattern).context(PatternSnafu)?;
        let paths = discovery::list_glob(&pattern)
            .await
            .context(DiscoverySnafu)?;
        self.assemble(exclude.retain(paths))
    }

    fn assemble(&self, paths: Vec<String>) -> Result<Catalog, BuildError> {
        let schema = self.schema();
        log::info!(
            "parsing {} assets with convention '{}'",
            paths.len(),
            self.convention.name()
        );

        let rows: Vec<Vec<AttrValue>> = paths
            .par_iter()
            .map(|path| conform(&schema, &self.convention.parse(path)))
            .collect();

        let catalog = Catalog::from_rows(schema, rows).context(TableSnafu)?;
        catalog.ensure_unique_paths().context(TableSnafu)?;

        if self.options.pick_latest_version {
            resolve_latest(catalog).context(TableSnafu)
        } else {
            Ok(catalog)
        }
    }
}

/// Build a multi-dataset collection from its declarative definition.
///
/// The definition is validated (and every dataset's convention
/// resolved) before any discovery I/O runs, so a broken definition
/// fails the whole build fast rather than partially. Attribute
/// precedence per asset, lowest to highest: parsed attributes, then
/// dataset-level constants, then source-level constants. An asset
/// discovered by several sources yields one row whose attributes merge
/// with later-source precedence.
pub async fn build_collection(
    config: &CollectionConfig,
    registry: &ConventionRegistry,
) -> Result<Catalog, BuildError> {
    let issues = config.validate();
    if !issues.is_empty() {
        return Err(BuildError::Config {
            source: ConfigError::Invalid { issues },
        });
    }
    let schema = config.schema().context(ConfigSnafu)?;
    let exclude = ExcludeFilter::new(&config.exclude_patterns).context(PatternSnafu)?;

    // Resolve every convention and compile every pattern up front:
    // fail-fast, not partial.
    let mut plans = Vec::new();
    for (name, dataset) in &config.datasets {
        let convention = match &dataset.convention {
            Some(conv) => Some(registry.get(conv).context(UnknownConventionSnafu {
                dataset: name.clone(),
                convention: conv.clone(),
            })?),
            None => None,
        };
        let sources = dataset
            .data_sources
            .iter()
            .map(|s| Ok((GlobPattern::new(&s.glob).context(PatternSnafu)?, &s.attributes)))
            .collect::<Result<Vec<_>, BuildError>>()?;
        plans.push((name, dataset, convention, sources));
    }

    let mut parts = Vec::new();
    for (name, dataset, convention, sources) in plans {
        // One entry per unique path within the dataset; later sources
        // overlay earlier ones instead of adding rows.
        let mut by_path: std::collections::BTreeMap<String, AttributeSet> =
            std::collections::BTreeMap::new();

        for (pattern, source_attrs) in sources {
            let paths = discovery::list_glob(&pattern)
                .await
                .context(DiscoverySnafu)?;
            let paths = exclude.retain(paths);

            let parsed: Vec<(String, AttributeSet)> = paths
                .into_par_iter()
                .map(|path| {
                    let mut attrs = match &convention {
                        Some(conv) => conv.parse(&path),
                        None => AttributeSet::new(),
                    };
                    attrs.insert(PATH_COLUMN.to_string(), AttrValue::from(path.as_str()));
                    let attrs = merge(&merge(&attrs, &dataset.attributes), source_attrs);
                    (path, attrs)
                })
                .collect();

            for (path, attrs) in parsed {
                match by_path.get_mut(&path) {
                    Some(existing) => *existing = merge(existing, &attrs),
                    None => {
                        by_path.insert(path, attrs);
                    }
                }
            }
        }

        log::info!("dataset '{name}': {} unique assets", by_path.len());
        let rows: Vec<Vec<AttrValue>> = by_path
            .values()
            .map(|attrs| conform(&schema, attrs))
            .collect();
        parts.push(Catalog::from_rows(schema.clone(), rows).context(TableSnafu)?);
    }

    let catalog = Catalog::concat(parts).context(TableSnafu)?;
    if config.pick_latest_version {
        resolve_latest(catalog).context(TableSnafu)
    } else {
        Ok(catalog)
    }
}
