//! Attribute values, schemas, and the assembled catalog table.
//!
//! The data model is deliberately small:
//!
//! - [`AttrValue`] is one cell: a string, a number, or null.
//! - [`AttributeSet`] is the metadata parsed for one asset, keyed by
//!   attribute name and always carrying [`PATH_COLUMN`].
//! - [`Schema`] is the validated, ordered column set every catalog row
//!   must expose.
//! - [`Catalog`] is the final table: rows aligned to the schema, sorted
//!   by path.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use snafu::prelude::*;

/// Name of the column holding the storage-qualified asset path.
pub const PATH_COLUMN: &str = "path";

/// Name of the column consulted by latest-version pruning.
pub const VERSION_COLUMN: &str = "version";

/// One catalog cell.
///
/// Numbers deserialize ahead of strings so YAML/JSON scalars keep their
/// type; a unit variant absorbs explicit nulls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    /// A numeric attribute (for example a decadal initialization year).
    Num(f64),
    /// A textual attribute.
    Str(String),
    /// No value extracted for this attribute.
    Null,
}

impl AttrValue {
    /// Render the value as a CSV cell. Null renders as the empty cell;
    /// whole-valued numbers render without a fractional part.
    pub fn render(&self) -> String {
        match self {
            AttrValue::Str(s) => s.clone(),
            AttrValue::Num(n) => format!("{n}"),
            AttrValue::Null => String::new(),
        }
    }

    /// Whether this cell carries no value.
    pub fn is_null(&self) -> bool {
        matches!(self, AttrValue::Null)
    }

    /// Borrow the textual content, if this is a string cell.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::Str(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::Str(s)
    }
}

impl From<f64> for AttrValue {
    fn from(n: f64) -> Self {
        AttrValue::Num(n)
    }
}

/// The structured metadata extracted for one asset.
pub type AttributeSet = BTreeMap<String, AttrValue>;

/// Merge two attribute sets into a new one, with `overlay` winning on
/// key collisions.
///
/// Both the multi-source assembler and the dataset-constant injection
/// use this; keeping it a pure function keeps the pipeline stages
/// independently testable.
pub fn merge(base: &AttributeSet, overlay: &AttributeSet) -> AttributeSet {
    let mut out = base.clone();
    for (k, v) in overlay {
        out.insert(k.clone(), v.clone());
    }
    out
}

/// Errors raised while constructing a schema.
#[derive(Debug, Clone, Snafu, PartialEq, Eq)]
pub enum SchemaError {
    /// Duplicate column names are not allowed.
    #[snafu(display("Duplicate column name: {column}"))]
    DuplicateColumn {
        /// The duplicate column name.
        column: String,
    },

    /// Column names must be non-empty.
    #[snafu(display("Empty column name at position {index}"))]
    EmptyColumnName {
        /// Zero-based position of the offending column.
        index: usize,
    },

    /// Every catalog schema must carry the asset path column.
    #[snafu(display("Schema must include a '{PATH_COLUMN}' column"))]
    MissingPathColumn,
}

/// The declared, ordered column set of a catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<String>,
    path_index: usize,
}

impl Schema {
    /// Construct a validated schema (rejects duplicates and empty names,
    /// requires a `path` column).
    pub fn new(columns: Vec<String>) -> Result<Self, SchemaError> {
        let mut seen = std::collections::HashSet::new();
        for (index, col) in columns.iter().enumerate() {
            if col.trim().is_empty() {
                return EmptyColumnNameSnafu { index }.fail();
            }
            if !seen.insert(col.clone()) {
                return DuplicateColumnSnafu {
                    column: col.clone(),
                }
                .fail();
            }
        }
        let path_index = columns
            .iter()
            .position(|c| c == PATH_COLUMN)
            .context(MissingPathColumnSnafu)?;
        Ok(Self {
            columns,
            path_index,
        })
    }

    /// Convenience constructor from string slices.
    pub fn from_names(names: &[&str]) -> Result<Self, SchemaError> {
        Schema::new(names.iter().map(|s| s.to_string()).collect())
    }

    /// Borrow the ordered column names.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Position of `name` in the column order, if declared.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Position of the `path` column (always present).
    pub fn path_index(&self) -> usize {
        self.path_index
    }
}

/// Errors raised while assembling a catalog table.
#[derive(Debug, Snafu)]
pub enum CatalogError {
    /// A row's cell count does not match the schema width.
    #[snafu(display("Row width {got} does not match schema width {expected}"))]
    RowWidth {
        /// Declared number of columns.
        expected: usize,
        /// Number of cells in the offending row.
        got: usize,
    },

    /// The same asset path appeared in two rows.
    #[snafu(display("Duplicate asset path in catalog: {path}"))]
    DuplicatePath {
        /// The repeated path.
        path: String,
    },

    /// Catalog parts being concatenated declared different schemas.
    #[snafu(display("Cannot concatenate catalogs with differing schemas"))]
    SchemaMismatch,
}

/// The assembled catalog: rows aligned to a schema, sorted by path.
#[derive(Debug, Clone)]
pub struct Catalog {
    schema: Schema,
    rows: Vec<Vec<AttrValue>>,
}

impl Catalog {
    /// Build a catalog from schema-aligned rows, sorting by path.
    ///
    /// Fails if any row's width differs from the schema's.
    pub fn from_rows(schema: Schema, mut rows: Vec<Vec<AttrValue>>) -> Result<Self, CatalogError> {
        let width = schema.columns().len();
        for row in &rows {
            ensure!(
                row.len() == width,
                RowWidthSnafu {
                    expected: width,
                    got: row.len(),
                }
            );
        }
        let path_index = schema.path_index();
        rows.sort_by(|a, b| a[path_index].render().cmp(&b[path_index].render()));
        Ok(Self { schema, rows })
    }

    /// Concatenate catalog parts sharing one schema into a single
    /// path-sorted catalog.
    pub fn concat(parts: Vec<Catalog>) -> Result<Catalog, CatalogError> {
        let mut iter = parts.into_iter();
        let first = match iter.next() {
            Some(c) => c,
            None => {
                // An empty concat has no schema to adopt; callers always
                // pass at least one part.
                return SchemaMismatchSnafu.fail();
            }
        };
        let schema = first.schema.clone();
        let mut rows = first.rows;
        for part in iter {
            ensure!(part.schema == schema, SchemaMismatchSnafu);
            rows.extend(part.rows);
        }
        Catalog::from_rows(schema, rows)
    }

    /// The declared column set.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The path-sorted rows.
    pub fn rows(&self) -> &[Vec<AttrValue>] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the catalog holds no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Verify that no two rows share an asset path.
    ///
    /// Duplicate discovery of one path is a pipeline bug in
    /// single-source mode, never something to dedup silently.
    pub fn ensure_unique_paths(&self) -> Result<(), CatalogError> {
        let path_index = self.schema.path_index();
        for pair in self.rows.windows(2) {
            let a = pair[0][path_index].render();
            let b = pair[1][path_index].render();
            if a == b {
                return DuplicatePathSnafu { path: a }.fail();
            }
        }
        Ok(())
    }

    /// Replace the row set, keeping the schema. Rows are re-sorted.
    pub(crate) fn with_rows(self, rows: Vec<Vec<AttrValue>>) -> Result<Catalog, CatalogError> {
        Catalog::from_rows(self.schema, rows)
    }
}
