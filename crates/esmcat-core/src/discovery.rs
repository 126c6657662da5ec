//! Parallel asset discovery.
//!
//! Discovery answers one question: which files under a root are
//! candidate assets? Two modes exist, mirroring the two ways datasets
//! are specified:
//!
//! - [`list_assets`]: depth-based recursive scan. The directories
//!   sitting `depth + 1` levels below the root are enumerated, then one
//!   blocking task per directory collects matching files concurrently.
//!   A single directory's failure (permissions, vanished mount) is
//!   logged and contributes an empty result; sibling tasks are
//!   unaffected.
//! - [`list_glob`]: explicit-pattern scan. The pattern's literal
//!   directory prefix is walked and candidates are matched against the
//!   compiled pattern.
//!
//! Both modes are read-only and side-effect-free, so results for
//! identical inputs are safe to memoize within one build. No ordering is
//! guaranteed; the assembler sorts the final table by path.

use std::path::{Path, PathBuf};

use snafu::prelude::*;
use tokio::task::JoinSet;

use crate::globlike::{GlobPattern, GlobPatternError};
use crate::storage::StorageLocation;

/// Options for the depth-based discovery mode.
#[derive(Debug, Clone)]
pub struct ListOptions {
    /// How many directory levels below the root to fan out at. The scan
    /// spawns one task per directory found `depth + 1` levels down, so
    /// `0` parallelizes over the root's immediate subdirectories.
    pub depth: usize,
    /// Wildcard filter applied to file names (not full paths).
    pub extension: String,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            depth: 0,
            extension: "*.nc".to_string(),
        }
    }
}

/// Errors raised by discovery.
#[derive(Debug, Snafu)]
pub enum DiscoveryError {
    /// The extension filter or glob pattern failed to compile.
    #[snafu(display("invalid discovery pattern: {source}"))]
    Pattern {
        /// Underlying pattern compilation error.
        source: GlobPatternError,
    },

    /// The scan root itself could not be read.
    #[snafu(display("cannot read discovery root {path}: {source}"))]
    RootUnreadable {
        /// The unreadable root directory.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A discovery subtask died without producing a result. Unlike a
    /// subtask that merely errored (which contributes an empty list),
    /// a missing barrier result is unrecoverable.
    #[snafu(display("discovery task failed: {detail}"))]
    TaskFailed {
        /// Join-error description.
        detail: String,
    },
}

/// Recursively list files under `root` whose names match the extension
/// filter, fanning out one concurrent task per subdirectory at the
/// configured depth.
pub async fn list_assets(
    root: &StorageLocation,
    opts: &ListOptions,
) -> Result<Vec<String>, DiscoveryError> {
    let StorageLocation::Local(root_dir) = root;
    let name_filter = GlobPattern::new(&opts.extension).context(PatternSnafu)?;

    let fanout_root = root_dir.clone();
    let depth = opts.depth;
    let dirs = tokio::task::spawn_blocking(move || dirs_at_depth(&fanout_root, depth))
        .await
        .map_err(|e| DiscoveryError::TaskFailed {
            detail: e.to_string(),
        })??;

    let mut set = JoinSet::new();
    for dir in dirs {
        let filter = name_filter.clone();
        set.spawn_blocking(move || {
            let mut found = Vec::new();
            collect_files(&dir, &|name| filter.matches(name), &|_| true, &mut found);
            found
        });
    }

    let mut assets = Vec::new();
    while let Some(result) = set.join_next().await {
        match result {
            Ok(found) => assets.extend(found),
            Err(e) => {
                return TaskFailedSnafu {
                    detail: e.to_string(),
                }
                .fail()
            }
        }
    }
    Ok(assets)
}

/// List the files matching an explicit wildcard pattern.
///
/// The pattern's literal directory prefix roots the walk; every file
/// found below it is matched against the full pattern. A wildcard-free
/// pattern names a single file, which is returned iff it exists.
pub async fn list_glob(pattern: &GlobPattern) -> Result<Vec<String>, DiscoveryError> {
    if pattern.is_literal() {
        let path = PathBuf::from(pattern.as_str());
        let exists = tokio::fs::metadata(&path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        return Ok(if exists {
            vec![path.display().to_string()]
        } else {
            Vec::new()
        });
    }

    let prefix = pattern.literal_dir_prefix();
    let walk_root = if prefix.is_empty() {
        PathBuf::from(".")
    } else {
        PathBuf::from(prefix)
    };
    if !walk_root.is_dir() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "glob prefix is not a directory",
        ))
        .context(RootUnreadableSnafu {
            path: walk_root.display().to_string(),
        });
    }

    let full = pattern.clone();
    let found = tokio::task::spawn_blocking(move || {
        let mut found = Vec::new();
        collect_files(&walk_root, &|_| true, &|path| full.matches(path), &mut found);
        found
    })
    .await
    .map_err(|e| DiscoveryError::TaskFailed {
        detail: e.to_string(),
    })?;
    Ok(found)
}

/// Enumerate the directories exactly `depth + 1` levels below `root`.
///
/// The root must be readable; deeper levels that cannot be read are
/// logged and skipped, consistent with the per-subtree recovery policy.
fn dirs_at_depth(root: &Path, depth: usize) -> Result<Vec<PathBuf>, DiscoveryError> {
    let mut level = vec![root.to_path_buf()];
    for step in 0..=depth {
        let mut next = Vec::new();
        for dir in &level {
            let entries = match std::fs::read_dir(dir) {
                Ok(entries) => entries,
                Err(e) if step == 0 => {
                    return Err(e).context(RootUnreadableSnafu {
                        path: dir.display().to_string(),
                    });
                }
                Err(e) => {
                    log::warn!("skipping unreadable directory {}: {e}", dir.display());
                    continue;
                }
            };
            for entry in entries.flatten() {
                let path = entry.path();
                // metadata() follows symlinks, like `find -L`.
                if std::fs::metadata(&path).map(|m| m.is_dir()).unwrap_or(false) {
                    next.push(path);
                }
            }
        }
        level = next;
    }
    Ok(level)
}

/// Blocking recursive walk collecting files accepted by both filters.
///
/// `name_filter` sees the bare file name, `path_filter` the full path
/// string. Unreadable subtrees are logged and skipped.
fn collect_files(
    dir: &Path,
    name_filter: &dyn Fn(&str) -> bool,
    path_filter: &dyn Fn(&str) -> bool,
    out: &mut Vec<String>,
) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!("skipping unreadable directory {}: {e}", dir.display());
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let meta = match std::fs::metadata(&path) {
            Ok(meta) => meta,
            Err(e) => {
                log::warn!("skipping unreadable entry {}: {e}", path.display());
                continue;
            }
        };

        if meta.is_dir() {
            collect_files(&path, name_filter, path_filter, out);
        } else if meta.is_file() {
            let name = entry.file_name();
            let rendered = path.display().to_string();
            if name_filter(&name.to_string_lossy()) && path_filter(&rendered) {
                out.push(rendered);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn touch(path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, b"")
    }

    #[tokio::test]
    async fn list_assets_finds_files_across_subdirectories() -> TestResult {
        let tmp = TempDir::new()?;
        touch(&tmp.path().join("NCAR/CESM2/v1/tas.nc"))?;
        touch(&tmp.path().join("MOHC/UKESM1/v1/pr.nc"))?;
        touch(&tmp.path().join("MOHC/UKESM1/v1/notes.txt"))?;

        let root = StorageLocation::local(tmp.path());
        let mut found = list_assets(&root, &ListOptions::default()).await?;
        found.sort();

        assert_eq!(found.len(), 2);
        assert!(found[0].ends_with("UKESM1/v1/pr.nc"));
        assert!(found[1].ends_with("CESM2/v1/tas.nc"));
        Ok(())
    }

    #[tokio::test]
    async fn list_assets_respects_depth_fanout() -> TestResult {
        let tmp = TempDir::new()?;
        touch(&tmp.path().join("a/b/c/tas.nc"))?;

        let root = StorageLocation::local(tmp.path());
        let opts = ListOptions {
            depth: 1,
            ..ListOptions::default()
        };
        let found = list_assets(&root, &opts).await?;
        assert_eq!(found.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn list_assets_fails_on_unreadable_root() {
        let root = StorageLocation::local("/definitely/not/a/real/root");
        let err = list_assets(&root, &ListOptions::default())
            .await
            .expect_err("expected root error");
        assert!(matches!(err, DiscoveryError::RootUnreadable { .. }));
    }

    #[tokio::test]
    async fn list_glob_matches_full_paths() -> TestResult {
        let tmp = TempDir::new()?;
        touch(&tmp.path().join("cesm/mon/tas.nc"))?;
        touch(&tmp.path().join("cesm/day/tas.nc"))?;

        let pattern = GlobPattern::new(&format!("{}/cesm/mon/*.nc", tmp.path().display()))?;
        let found = list_glob(&pattern).await?;
        assert_eq!(found.len(), 1);
        assert!(found[0].ends_with("mon/tas.nc"));
        Ok(())
    }

    #[tokio::test]
    async fn list_glob_literal_names_one_file() -> TestResult {
        let tmp = TempDir::new()?;
        let file = tmp.path().join("single.nc");
        touch(&file)?;

        let pattern = GlobPattern::new(&file.display().to_string())?;
        let found = list_glob(&pattern).await?;
        assert_eq!(found, vec![file.display().to_string()]);

        let missing = GlobPattern::new(&tmp.path().join("absent.nc").display().to_string())?;
        assert!(list_glob(&missing).await?.is_empty());
        Ok(())
    }
}
