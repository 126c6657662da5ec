//! Storage locations and atomic write helpers.
//!
//! This module centralizes the filesystem-facing pieces of the pipeline:
//!
//! - [`StorageLocation`], the root (or file) a build reads from or writes
//!   to. Only the local filesystem backend exists today; `parse` rejects
//!   object-store URL schemes with a descriptive error so an `s3://`
//!   backend can be added without changing call sites.
//! - Small async read/write helpers used by the config loader and the
//!   persistence step, including a write-then-rename [`write_atomic`] so
//!   a failed build never leaves a partially written catalog behind.
//!
//! Discovery (recursive listing) lives in [`crate::discovery`]; this
//! module only knows how to resolve locations and move bytes.

use snafu::{Backtrace, prelude::*};
use std::{
    error::Error,
    fmt, io,
    path::{Path, PathBuf},
};
use tokio::{fs, io::AsyncWriteExt};

/// General result type used by storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Root location of a data tree or output directory.
///
/// This enum abstracts over storage backends, currently supporting local
/// filesystem paths with room for object storage later.
#[derive(Debug, Clone)]
pub enum StorageLocation {
    /// A root on the local filesystem.
    Local(PathBuf),
}

impl StorageLocation {
    /// Creates a new `StorageLocation` for a local filesystem path.
    pub fn local(root: impl Into<PathBuf>) -> Self {
        StorageLocation::Local(root.into())
    }

    /// Parse a user-facing location string into a `StorageLocation`.
    ///
    /// Plain paths and `file://` URLs resolve to the local backend; any
    /// other URL scheme (for example `s3://`) is rejected with
    /// [`StorageError::UnsupportedScheme`].
    pub fn parse(spec: &str) -> StorageResult<Self> {
        match spec.split_once("://") {
            None => Ok(StorageLocation::Local(PathBuf::from(spec))),
            Some(("file", rest)) => Ok(StorageLocation::Local(PathBuf::from(rest))),
            Some((scheme, _)) => UnsupportedSchemeSnafu {
                scheme: scheme.to_string(),
                spec: spec.to_string(),
            }
            .fail(),
        }
    }
}

/// Errors produced by the storage backend implementation.
///
/// Only a local filesystem backend exists today; raw I/O errors are
/// wrapped here so higher layers can map them into [`StorageError`]
/// variants with path context attached.
#[derive(Debug)]
pub enum BackendError {
    /// A local filesystem I/O error.
    Local(io::Error),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::Local(e) => write!(f, "local I/O error: {e}"),
        }
    }
}

impl Error for BackendError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            BackendError::Local(e) => Some(e),
        }
    }
}

/// Errors that can occur during storage operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StorageError {
    /// The specified path was not found.
    #[snafu(display("Path not found: {path}"))]
    NotFound {
        /// The path that was not found.
        path: String,
        /// Underlying backend error that caused the failure.
        source: BackendError,
        /// The backtrace at the time the error occurred.
        backtrace: Backtrace,
    },

    /// An I/O error occurred on the local filesystem.
    #[snafu(display("Local I/O error at {path}: {source}"))]
    OtherIo {
        /// The path where the I/O error occurred.
        path: String,
        /// Underlying backend I/O error with platform-specific details.
        source: BackendError,
        /// The backtrace at the time the error occurred.
        backtrace: Backtrace,
    },

    /// The location string used a URL scheme without a backend.
    #[snafu(display(
        "Unsupported storage scheme '{scheme}' in '{spec}' (only local paths and file:// are available)"
    ))]
    UnsupportedScheme {
        /// The scheme that has no backend.
        scheme: String,
        /// The full location string as given.
        spec: String,
    },
}

fn join_local(location: &StorageLocation, rel: &Path) -> PathBuf {
    match location {
        StorageLocation::Local(root) => root.join(rel),
    }
}

async fn create_parent_dir(abs: &Path) -> StorageResult<()> {
    if let Some(parent) = abs.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(BackendError::Local)
            .context(OtherIoSnafu {
                path: parent.display().to_string(),
            })?;
    }
    Ok(())
}

/// Guard that removes a temporary file on drop unless disarmed.
/// Used to ensure cleanup on error paths during atomic writes.
struct TempFileGuard {
    path: PathBuf,
    armed: bool,
}

impl TempFileGuard {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    /// Disarm the guard so the file is NOT removed on drop.
    /// Call this after a successful rename.
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if self.armed {
            // Best-effort cleanup; we are likely already handling another error.
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// Write `contents` to `rel_path` inside `location` using an atomic write.
///
/// Performs a write-then-rename sequence on the local filesystem: the
/// payload goes to a temporary file next to the target path, is synced,
/// and is then renamed into place as an atomic replacement. Parent
/// directories are created as needed.
///
/// # Errors
///
/// Returns [`StorageError::OtherIo`] when filesystem I/O fails at any
/// step.
pub async fn write_atomic(
    location: &StorageLocation,
    rel_path: &Path,
    contents: &[u8],
) -> StorageResult<()> {
    match location {
        StorageLocation::Local(_) => {
            let abs = join_local(location, rel_path);

            create_parent_dir(&abs).await?;

            let tmp_path = abs.with_extension("tmp");
            let mut guard = TempFileGuard::new(tmp_path.clone());

            {
                let mut file = fs::File::create(&tmp_path)
                    .await
                    .map_err(BackendError::Local)
                    .context(OtherIoSnafu {
                        path: tmp_path.display().to_string(),
                    })?;

                file.write_all(contents)
                    .await
                    .map_err(BackendError::Local)
                    .context(OtherIoSnafu {
                        path: tmp_path.display().to_string(),
                    })?;

                file.sync_all()
                    .await
                    .map_err(BackendError::Local)
                    .context(OtherIoSnafu {
                        path: tmp_path.display().to_string(),
                    })?;
            }

            fs::rename(&tmp_path, &abs)
                .await
                .map_err(BackendError::Local)
                .context(OtherIoSnafu {
                    path: abs.display().to_string(),
                })?;

            guard.disarm();

            Ok(())
        }
    }
}

/// Read the file at `rel_path` within `location` into a `String`.
///
/// A missing file is reported as [`StorageError::NotFound`]; any other
/// filesystem problem as [`StorageError::OtherIo`].
pub async fn read_to_string(location: &StorageLocation, rel_path: &Path) -> StorageResult<String> {
    match location {
        StorageLocation::Local(_) => {
            let abs = join_local(location, rel_path);

            match fs::read_to_string(&abs).await {
                Ok(s) => Ok(s),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Err(BackendError::Local(e))
                    .context(NotFoundSnafu {
                        path: abs.display().to_string(),
                    }),
                Err(e) => Err(BackendError::Local(e)).context(OtherIoSnafu {
                    path: abs.display().to_string(),
                }),
            }
        }
    }
}
