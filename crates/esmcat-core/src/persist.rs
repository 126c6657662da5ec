//! Catalog and descriptor persistence.
//!
//! Both artifacts are rendered completely in memory — the CSV (gzipped
//! when the target name says so) and the JSON sidecar — and then handed
//! to [`crate::storage::write_atomic`]. A build that dies mid-write can
//! therefore never leave a truncated catalog behind: either the rename
//! happened or the old file is untouched.

use std::io::Write;
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;
use snafu::prelude::*;

use crate::catalog::Catalog;
use crate::descriptor::CatalogDescriptor;
use crate::storage::{self, StorageError, StorageLocation};

/// Errors raised while persisting build artifacts.
#[derive(Debug, Snafu)]
pub enum PersistError {
    /// CSV rendering failed.
    #[snafu(display("failed to render catalog CSV: {source}"))]
    Csv {
        /// Underlying CSV error.
        source: csv::Error,
    },

    /// Gzip compression failed.
    #[snafu(display("failed to compress catalog: {source}"))]
    Compress {
        /// Underlying I/O error from the encoder.
        source: std::io::Error,
    },

    /// Descriptor serialization failed.
    #[snafu(display("failed to render catalog descriptor: {source}"))]
    Json {
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// The final write failed.
    #[snafu(display("failed to write {what}: {source}"))]
    Write {
        /// Which artifact was being written.
        what: String,
        /// Underlying storage error.
        source: StorageError,
    },
}

/// Render a catalog as CSV bytes: header row first, then one record
/// per asset in path order.
pub fn render_csv(catalog: &Catalog) -> Result<Vec<u8>, PersistError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(catalog.schema().columns())
        .context(CsvSnafu)?;
    for row in catalog.rows() {
        let record: Vec<String> = row.iter().map(|cell| cell.render()).collect();
        writer.write_record(&record).context(CsvSnafu)?;
    }
    writer
        .into_inner()
        .map_err(|e| PersistError::Csv {
            source: e.into_error().into(),
        })
}

fn gzip(bytes: &[u8]) -> Result<Vec<u8>, PersistError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).context(CompressSnafu)?;
    encoder.finish().context(CompressSnafu)
}

fn wants_gzip(rel: &Path) -> bool {
    rel.extension().is_some_and(|ext| ext == "gz")
}

/// Write the catalog table to `rel` under `location`, gzip-compressed
/// when the file name ends in `.gz`.
pub async fn write_catalog(
    catalog: &Catalog,
    location: &StorageLocation,
    rel: &Path,
) -> Result<(), PersistError> {
    let mut bytes = render_csv(catalog)?;
    if wants_gzip(rel) {
        bytes = gzip(&bytes)?;
    }
    storage::write_atomic(location, rel, &bytes)
        .await
        .context(WriteSnafu {
            what: format!("catalog {}", rel.display()),
        })
}

/// Write the descriptor sidecar to `rel` under `location` as pretty
/// JSON.
pub async fn write_descriptor(
    descriptor: &CatalogDescriptor,
    location: &StorageLocation,
    rel: &Path,
) -> Result<(), PersistError> {
    let bytes = serde_json::to_vec_pretty(descriptor).context(JsonSnafu)?;
    storage::write_atomic(location, rel, &bytes)
        .await
        .context(WriteSnafu {
            what: format!("descriptor {}", rel.display()),
        })
}
