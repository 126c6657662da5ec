//! The machine-readable catalog descriptor sidecar.
//!
//! Alongside the tabular catalog, every build emits a structured
//! document that tells data-access tooling how to read it: the format
//! version tag, where the catalog file lives, which column locates the
//! physical asset and in what format, the ordered attribute list (with
//! an empty vocabulary placeholder per attribute, to be curated later),
//! and the aggregation rules — which attribute distinguishes assets to
//! be unioned as new variables versus joined along an existing
//! dimension. The descriptor is derived purely from the final schema;
//! it holds no per-row data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::{Schema, PATH_COLUMN};

/// Format tag written into every descriptor.
pub const ESMCAT_VERSION: &str = "0.1.0";

/// Physical format of the cataloged assets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetFormat {
    /// NetCDF files.
    Netcdf,
    /// Zarr stores.
    Zarr,
}

/// How assets sharing a group are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationKind {
    /// Assets become new variables of one dataset.
    Union,
    /// Assets are concatenated along an existing dimension.
    JoinExisting,
}

/// One attribute column and its (initially empty) vocabulary note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeEntry {
    /// Catalog column this entry describes.
    pub column_name: String,
    /// Free-text vocabulary annotation, curated after the build.
    pub vocabulary: String,
}

/// Which column locates the physical asset, and its format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetsEntry {
    /// Column holding the storage-qualified path.
    pub column_name: String,
    /// Physical format of the referenced files.
    pub format: AssetFormat,
}

/// One aggregation rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregation {
    /// How matching assets combine.
    #[serde(rename = "type")]
    pub kind: AggregationKind,
    /// The attribute that distinguishes the assets being combined.
    pub attribute_name: String,
}

/// Aggregation rules for consumers assembling datasets from the
/// catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationControl {
    /// Column naming the physical variable.
    pub variable_column_name: String,
    /// Attributes whose values group assets into one logical dataset.
    pub groupby_attrs: Vec<String>,
    /// Rules applied within each group.
    pub aggregations: Vec<Aggregation>,
}

/// A convention's suggestions for [`AggregationControl`], turned into a
/// descriptor once the final schema is known.
#[derive(Debug, Clone, Default)]
pub struct AggregationHints {
    /// Column naming the physical variable, if the convention has one.
    pub variable_column: Option<String>,
    /// Attributes that group assets into one logical dataset.
    pub groupby: Vec<String>,
    /// Attribute joined along an existing dimension (typically the time
    /// range), if any.
    pub join_existing: Option<String>,
}

impl AggregationHints {
    fn into_control(self, schema: &Schema) -> Option<AggregationControl> {
        let variable_column_name = self.variable_column?;
        let mut aggregations = vec![Aggregation {
            kind: AggregationKind::Union,
            attribute_name: variable_column_name.clone(),
        }];
        if let Some(join) = self.join_existing {
            if schema.position(&join).is_some() {
                aggregations.push(Aggregation {
                    kind: AggregationKind::JoinExisting,
                    attribute_name: join,
                });
            }
        }
        let groupby_attrs = self
            .groupby
            .into_iter()
            .filter(|g| schema.position(g).is_some())
            .collect();
        Some(AggregationControl {
            variable_column_name,
            groupby_attrs,
            aggregations,
        })
    }
}

/// The descriptor document, serialized as the catalog's JSON sidecar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogDescriptor {
    /// Catalog format version tag.
    pub esmcat_version: String,
    /// Human-readable identifier of the catalog.
    pub id: String,
    /// Human-readable description.
    pub description: String,
    /// Name of (or path to) the tabular catalog file.
    pub catalog_file: String,
    /// Ordered attribute columns with vocabulary placeholders.
    pub attributes: Vec<AttributeEntry>,
    /// Which column locates the physical asset.
    pub assets: AssetsEntry,
    /// Aggregation rules, when the convention supplies them.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregation_control: Option<AggregationControl>,
    /// When this descriptor was produced.
    pub last_updated: DateTime<Utc>,
}

impl CatalogDescriptor {
    /// Derive a descriptor from the final schema and a convention's
    /// aggregation hints.
    ///
    /// Every schema column except the path column becomes an attribute
    /// entry with an empty vocabulary; hints referring to columns the
    /// schema does not declare are dropped.
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        catalog_file: impl Into<String>,
        format: AssetFormat,
        schema: &Schema,
        hints: AggregationHints,
        last_updated: DateTime<Utc>,
    ) -> Self {
        let attributes = schema
            .columns()
            .iter()
            .filter(|c| c.as_str() != PATH_COLUMN)
            .map(|c| AttributeEntry {
                column_name: c.clone(),
                vocabulary: String::new(),
            })
            .collect();

        Self {
            esmcat_version: ESMCAT_VERSION.to_string(),
            id: id.into(),
            description: description.into(),
            catalog_file: catalog_file.into(),
            attributes,
            assets: AssetsEntry {
                column_name: PATH_COLUMN.to_string(),
                format,
            },
            aggregation_control: hints.into_control(schema),
            last_updated,
        }
    }
}
