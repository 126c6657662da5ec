//! Latest-version pruning.
//!
//! Archives publish revised copies of the same asset under new version
//! directories (`v1`, `v2`, `v20200101`). When a catalog should expose
//! only the newest copy, rows are partitioned into *version groups* —
//! rows identical on every column except `path` and `version` — and
//! one row survives per group: the one with the greatest version.
//!
//! Plain string ordering is wrong for mixed version vocabularies
//! (`"v3" > "v20200101"` lexicographically), so the comparison policy
//! is explicit: a `v`-prefixed all-digit tag compares numerically, and
//! numeric tags always outrank non-numeric ones; anything else falls
//! back to lexicographic order. Ties on the numeric value are broken
//! by the raw string, and equal raw versions keep the first row in
//! path order, so resolution is deterministic.
//!
//! This step is opt-in (a policy flag on the build), never implicit.

use std::collections::HashMap;

use crate::catalog::{Catalog, CatalogError, VERSION_COLUMN};

/// Ordering key for one version tag.
///
/// Variant order matters: every `Numeric` outranks every `Text`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum VersionOrd {
    Text(String),
    Numeric(u64, String),
}

fn version_ord(raw: &str) -> VersionOrd {
    let digits = raw.strip_prefix(['v', 'V']).unwrap_or(raw);
    if !digits.is_empty() && digits.len() <= 18 && digits.bytes().all(|b| b.is_ascii_digit()) {
        match digits.parse::<u64>() {
            Ok(n) => VersionOrd::Numeric(n, raw.to_string()),
            Err(_) => VersionOrd::Text(raw.to_string()),
        }
    } else {
        VersionOrd::Text(raw.to_string())
    }
}

/// Keep only the greatest-version row of each version group.
///
/// A catalog without a `version` column is returned unchanged. Output
/// rows remain sorted by path.
pub fn resolve_latest(catalog: Catalog) -> Result<Catalog, CatalogError> {
    let version_index = match catalog.schema().position(VERSION_COLUMN) {
        Some(index) => index,
        None => return Ok(catalog),
    };
    let path_index = catalog.schema().path_index();

    // Winner per group key; rows arrive in path order, so "replace only
    // when strictly greater" keeps the first path on equal versions.
    let mut winners: HashMap<Vec<String>, (VersionOrd, usize)> = HashMap::new();
    for (row_index, row) in catalog.rows().iter().enumerate() {
        let key: Vec<String> = row
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != path_index && *i != version_index)
            .map(|(_, cell)| cell.render())
            .collect();
        let ord = version_ord(&row[version_index].render());

        match winners.get_mut(&key) {
            Some((best, best_index)) => {
                if ord > *best {
                    *best = ord;
                    *best_index = row_index;
                }
            }
            None => {
                winners.insert(key, (ord, row_index));
            }
        }
    }

    let mut keep: Vec<usize> = winners.into_values().map(|(_, index)| index).collect();
    keep.sort_unstable();

    let rows = keep
        .into_iter()
        .map(|index| catalog.rows()[index].clone())
        .collect();
    catalog.with_rows(rows)
}
