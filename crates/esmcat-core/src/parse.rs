//! Naming-convention parsers.
//!
//! A *convention* is a family of filename/path structuring rules (the
//! CMIP6 DRS, the CMIP5 DRS, CESM history-file naming). Each convention
//! is a strategy implementing [`Convention`]: given one asset path it
//! returns an [`AttributeSet`], and it **never fails past that
//! boundary** — an unparseable path yields a set containing only the
//! path itself, plus a logged diagnostic, so the asset stays
//! discoverable for operator triage.
//!
//! Strategies are selected by name through a [`ConventionRegistry`],
//! not by type inspection. Two reusable mechanisms back them:
//!
//! - template reversal ([`template`]) for attributes encoded in the
//!   file name, and
//! - longest-match regex extraction ([`extract`]) for attributes
//!   embedded in directory names.
//!
//! Conventions that need to look *inside* a file (for example to list
//! its time-varying variables) do so through the [`AssetIntrospector`]
//! collaborator, a black box this crate does not implement.

pub mod cesm;
pub mod cmip5;
pub mod cmip6;
pub mod extract;
pub mod template;

use std::collections::BTreeMap;
use std::sync::Arc;

use snafu::prelude::*;

use crate::catalog::{AttributeSet, Schema, SchemaError};
use crate::descriptor::AggregationHints;
use crate::parse::template::TemplateError;

/// Errors raised while constructing a convention (compiling its
/// templates, regexes, or definitions). These are programming or
/// configuration errors, surfaced before any path is parsed.
#[derive(Debug, Snafu)]
pub enum ConventionInitError {
    /// A filename template failed to compile.
    #[snafu(display("convention '{convention}': {source}"))]
    Template {
        /// Convention being constructed.
        convention: String,
        /// Underlying template error.
        source: TemplateError,
    },

    /// An extraction regex failed to compile.
    #[snafu(display("convention '{convention}': invalid regex: {source}"))]
    Pattern {
        /// Convention being constructed.
        convention: String,
        /// Underlying regex error.
        source: regex::Error,
    },

    /// A convention's YAML definitions document failed to parse.
    #[snafu(display("malformed convention definitions: {source}"))]
    Definitions {
        /// Underlying YAML error.
        source: serde_yaml::Error,
    },

    /// A convention declared an invalid default schema.
    #[snafu(display("convention '{convention}': invalid schema: {source}"))]
    InvalidSchema {
        /// Convention being constructed.
        convention: String,
        /// Underlying schema error.
        source: SchemaError,
    },
}

/// What a file-content introspector found inside one asset.
#[derive(Debug, Clone, Default)]
pub struct Introspection {
    /// Names of the time-varying variables in the file.
    pub variables: Vec<String>,
    /// The file's global attributes, flattened to strings.
    pub global_attrs: BTreeMap<String, String>,
}

/// Error returned by an introspector. Opaque by design: whatever goes
/// wrong inside the black box, the parser recovers at the path
/// boundary.
#[derive(Debug, Snafu)]
#[snafu(display("introspection failed: {message}"))]
pub struct IntrospectError {
    /// Human-readable description of the failure.
    pub message: String,
}

/// Black-box reader of a file's internal structure.
///
/// Implementations typically open the file with a NetCDF/HDF library
/// and report its time-varying variables and global attributes. The
/// pipeline only consumes the summary; it never reads data payloads.
pub trait AssetIntrospector: Send + Sync {
    /// Inspect the file at `path`.
    fn introspect(&self, path: &str) -> Result<Introspection, IntrospectError>;
}

/// A naming-convention parsing strategy.
pub trait Convention: Send + Sync {
    /// Registry name of this convention.
    fn name(&self) -> &str;

    /// The default column set a catalog built with this convention
    /// declares.
    fn schema(&self) -> Schema;

    /// Reverse-map one asset path into attributes. Never fails: at
    /// minimum the returned set contains the path itself.
    fn parse(&self, path: &str) -> AttributeSet;

    /// Aggregation hints for the catalog descriptor.
    fn aggregation(&self) -> AggregationHints;
}

/// Registry mapping convention name to parsing strategy.
#[derive(Default)]
pub struct ConventionRegistry {
    strategies: BTreeMap<String, Arc<dyn Convention>>,
}

impl ConventionRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry carrying the built-in conventions (`cmip6`, `cmip5`).
    ///
    /// Conventions needing external input (CESM stream definitions, an
    /// introspector) are constructed by the caller and added with
    /// [`register`](Self::register).
    pub fn with_builtin() -> Result<Self, ConventionInitError> {
        let mut registry = Self::new();
        registry.register(Arc::new(cmip6::Cmip6Convention::new()?));
        registry.register(Arc::new(cmip5::Cmip5Convention::new()?));
        Ok(registry)
    }

    /// Add or replace a strategy under its own name.
    pub fn register(&mut self, convention: Arc<dyn Convention>) {
        self.strategies
            .insert(convention.name().to_string(), convention);
    }

    /// Look up a strategy by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Convention>> {
        self.strategies.get(name).cloned()
    }

    /// The registered convention names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.strategies.keys().map(String::as_str).collect()
    }
}

/// Basename of a path string (the part after the final `/`).
pub(crate) fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Parent directory of a path string, stripped of leading and trailing
/// slashes, matching how directory-derived attributes are located.
pub(crate) fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => path[..idx].trim_matches('/'),
        None => "",
    }
}
