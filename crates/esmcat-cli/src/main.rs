//! Command-line catalog builder for ESM data-file collections.

mod error;

use std::path::{Path, PathBuf};

use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use md5::{Digest, Md5};
use snafu::ResultExt;

use esmcat_core::{
    build::{build_collection, BuildOptions, CatalogBuilder},
    catalog::Catalog,
    config::CollectionConfig,
    descriptor::{AggregationHints, AssetFormat, CatalogDescriptor},
    globlike::GlobPattern,
    parse::{cmip5::Cmip5Convention, cmip6::Cmip6Convention, Convention, ConventionRegistry},
    persist,
    storage::StorageLocation,
};

use crate::error::{
    BuildCatalogSnafu, ChecksumDirSnafu, ChecksumIoSnafu, ChecksumPatternSnafu,
    CliResult, ConventionInitSnafu, LoadConfigSnafu, LocationSnafu, PersistSnafu,
};

/// Paths skipped by every CMIP build: replica staging areas and the
/// `latest` symlink farms that mirror a versioned directory.
const CMIP_EXCLUDES: &[&str] = &["*/files/*", "*/latest/*"];

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CmipVersionArg {
    #[value(name = "5")]
    V5,
    #[value(name = "6")]
    V6,
}

impl CmipVersionArg {
    fn catalog_id(self) -> &'static str {
        match self {
            CmipVersionArg::V5 => "cmip5",
            CmipVersionArg::V6 => "cmip6",
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Build a CMIP archive catalog from its directory tree
    Cmip {
        /// Root of the archive to scan
        #[arg(long = "root-path")]
        root_path: String,

        /// Which CMIP data reference syntax the archive follows
        #[arg(long = "cmip-version", value_enum)]
        cmip_version: CmipVersionArg,

        /// Directory fan-out depth for parallel discovery
        #[arg(long, default_value_t = 3)]
        depth: usize,

        /// Keep only the newest version of otherwise-identical assets
        #[arg(long = "pick-latest-version", default_value_t = false)]
        pick_latest_version: bool,

        /// Directory receiving cmip<N>.csv.gz and cmip<N>.json (default:
        /// current directory)
        #[arg(long = "persist-path")]
        persist_path: Option<PathBuf>,
    },

    /// Build a multi-dataset collection from its YAML definition
    Collection {
        /// Collection definition file
        #[arg(long)]
        config: PathBuf,

        /// Directory receiving <id>.csv.gz and <id>.json (default:
        /// current directory)
        #[arg(long = "out-dir")]
        out_dir: Option<PathBuf>,
    },

    /// Write .md5 sidecars for collection definition files
    Checksum {
        /// File-name pattern of the definitions to fingerprint
        #[arg(long, default_value = "*.yml")]
        pattern: String,

        /// Directory holding the definition files
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
}

#[derive(Debug, Parser)]
#[command(name = "esmcat", version, about)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

/// Write the catalog table plus its descriptor sidecar under `out_dir`.
async fn write_artifacts(
    catalog: &Catalog,
    id: &str,
    description: &str,
    hints: AggregationHints,
    out_dir: &Path,
) -> CliResult<()> {
    let location = StorageLocation::local(out_dir);
    let catalog_file = format!("{id}.csv.gz");
    let descriptor = CatalogDescriptor::new(
        id,
        description,
        catalog_file.as_str(),
        AssetFormat::Netcdf,
        catalog.schema(),
        hints,
        Utc::now(),
    );

    persist::write_catalog(catalog, &location, Path::new(&catalog_file))
        .await
        .context(PersistSnafu)?;
    persist::write_descriptor(&descriptor, &location, Path::new(&format!("{id}.json")))
        .await
        .context(PersistSnafu)?;

    println!(
        "Cataloged {} assets into {}",
        catalog.len(),
        out_dir.join(&catalog_file).display()
    );
    Ok(())
}

async fn cmd_cmip(
    root_path: &str,
    cmip_version: CmipVersionArg,
    depth: usize,
    pick_latest_version: bool,
    persist_path: Option<PathBuf>,
) -> CliResult<()> {
    let convention: Box<dyn Convention> = match cmip_version {
        CmipVersionArg::V5 => Box::new(Cmip5Convention::new().context(ConventionInitSnafu)?),
        CmipVersionArg::V6 => Box::new(Cmip6Convention::new().context(ConventionInitSnafu)?),
    };
    let id = cmip_version.catalog_id();

    let root = StorageLocation::parse(root_path).context(LocationSnafu)?;
    let options = BuildOptions {
        depth,
        exclude_patterns: CMIP_EXCLUDES.iter().map(|p| p.to_string()).collect(),
        pick_latest_version,
        ..BuildOptions::default()
    };
    let builder = CatalogBuilder::new(convention.as_ref(), options);
    let catalog = builder
        .build(&root)
        .await
        .context(BuildCatalogSnafu { id })?;

    let out_dir = persist_path.unwrap_or_else(|| PathBuf::from("."));
    let description = format!("{} archive catalog built from {root_path}", id.to_uppercase());
    write_artifacts(&catalog, id, &description, convention.aggregation(), &out_dir).await
}

async fn cmd_collection(config_path: &Path, out_dir: Option<PathBuf>) -> CliResult<()> {
    let config = CollectionConfig::load(&StorageLocation::local("."), config_path)
        .await
        .context(LoadConfigSnafu {
            path: config_path.display().to_string(),
        })?;
    let registry = ConventionRegistry::with_builtin().context(ConventionInitSnafu)?;
    let catalog = build_collection(&config, &registry)
        .await
        .context(BuildCatalogSnafu {
            id: config.id.clone(),
        })?;

    // Aggregation hints follow the first dataset (in name order) that
    // declares a convention; a convention-free collection gets none.
    let hints = config
        .datasets
        .values()
        .filter_map(|d| d.convention.as_deref())
        .find_map(|name| registry.get(name))
        .map(|c| c.aggregation())
        .unwrap_or_default();

    let out_dir = out_dir.unwrap_or_else(|| PathBuf::from("."));
    write_artifacts(&catalog, &config.id, &config.description, hints, &out_dir).await
}

async fn cmd_checksum(dir: &Path, pattern: &str) -> CliResult<()> {
    let pattern = GlobPattern::new(pattern).context(ChecksumPatternSnafu)?;

    let mut entries = tokio::fs::read_dir(dir).await.context(ChecksumDirSnafu {
        path: dir.display().to_string(),
    })?;
    while let Some(entry) = entries.next_entry().await.context(ChecksumDirSnafu {
        path: dir.display().to_string(),
    })? {
        let name = entry.file_name().to_string_lossy().to_string();
        let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
        if !is_file || !pattern.matches(&name) {
            continue;
        }

        let bytes = tokio::fs::read(entry.path()).await.context(ChecksumIoSnafu {
            path: entry.path().display().to_string(),
        })?;
        let digest = Md5::digest(&bytes);
        let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();

        let prefix = name.split('.').next().unwrap_or(&name);
        let out = dir.join(format!("{prefix}.md5"));
        tokio::fs::write(&out, hex.as_bytes())
            .await
            .context(ChecksumIoSnafu {
                path: out.display().to_string(),
            })?;
        println!("{name} -> {}", out.display());
    }
    Ok(())
}

async fn run() -> CliResult<()> {
    let cli = Cli::parse();

    match cli.cmd {
        Command::Cmip {
            root_path,
            cmip_version,
            depth,
            pick_latest_version,
            persist_path,
        } => {
            cmd_cmip(
                &root_path,
                cmip_version,
                depth,
                pick_latest_version,
                persist_path,
            )
            .await
        }

        Command::Collection { config, out_dir } => cmd_collection(&config, out_dir).await,

        Command::Checksum { pattern, dir } => cmd_checksum(&dir, &pattern).await,
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();
    if let Err(e) = run().await {
        eprintln!("{e}");
        std::process::exit(1);
    }
}
