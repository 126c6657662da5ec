use esmcat_core::build::BuildError;
use esmcat_core::config::ConfigError;
use esmcat_core::globlike::GlobPatternError;
use esmcat_core::parse::ConventionInitError;
use esmcat_core::persist::PersistError;
use esmcat_core::storage::StorageError;

use snafu::Snafu;

pub type CliResult<T> = std::result::Result<T, CliError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CliError {
    #[snafu(display("Invalid location: {source}"))]
    Location { source: StorageError },

    #[snafu(display("Failed to set up naming conventions: {source}"))]
    ConventionInit { source: ConventionInitError },

    #[snafu(display("Failed to read collection definition {path}: {source}"))]
    LoadConfig {
        path: String,
        #[snafu(source(from(ConfigError, Box::new)))]
        source: Box<ConfigError>,
    },

    #[snafu(display("Failed to build catalog '{id}': {source}"))]
    BuildCatalog {
        id: String,
        #[snafu(source(from(BuildError, Box::new)))]
        source: Box<BuildError>,
    },

    #[snafu(display("Failed to persist build artifacts: {source}"))]
    Persist {
        #[snafu(source(from(PersistError, Box::new)))]
        source: Box<PersistError>,
    },

    #[snafu(display("Invalid checksum pattern: {source}"))]
    ChecksumPattern { source: GlobPatternError },

    #[snafu(display("Cannot read checksum directory {path}: {source}"))]
    ChecksumDir {
        path: String,
        source: std::io::Error,
    },

    #[snafu(display("Checksum failed for {path}: {source}"))]
    ChecksumIo {
        path: String,
        source: std::io::Error,
    },
}
