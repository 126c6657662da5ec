//! Integration tests driving the whole pipeline over temporary file
//! trees: discovery, convention parsing, conformance, assembly, version
//! resolution, and CSV rendering.

use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;

use esmcat_core::build::{build_collection, BuildOptions, CatalogBuilder};
use esmcat_core::config::CollectionConfig;
use esmcat_core::parse::cesm::{CesmConvention, CesmDefinitions};
use esmcat_core::parse::cmip6::Cmip6Convention;
use esmcat_core::parse::ConventionRegistry;
use esmcat_core::persist::render_csv;
use esmcat_core::storage::StorageLocation;

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn touch(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, b"")
}

fn cmip6_tree(root: &Path) -> std::io::Result<()> {
    touch(&root.join(
        "CMIP/NCAR/CESM2/historical/r1i1p1f1/Amon/tas/gn/v20190308/tas_Amon_CESM2_historical_r1i1p1f1_gn_185001-201412.nc",
    ))?;
    touch(&root.join(
        "CMIP/NCAR/CESM2/historical/r1i1p1f1/fx/sftlf/gn/v20190308/sftlf_fx_CESM2_historical_r1i1p1f1_gn.nc",
    ))?;
    touch(&root.join("CMIP/NCAR/CESM2/historical/stray-notes.nc"))
}

#[tokio::test]
async fn cmip6_build_covers_every_row_with_the_full_schema() -> TestResult {
    let tmp = TempDir::new()?;
    cmip6_tree(tmp.path())?;

    let convention = Cmip6Convention::new()?;
    let options = BuildOptions {
        depth: 2,
        ..BuildOptions::default()
    };
    let builder = CatalogBuilder::new(&convention, options);
    let catalog = builder.build(&StorageLocation::local(tmp.path())).await?;

    assert_eq!(catalog.len(), 3);
    let width = catalog.schema().columns().len();
    assert!(catalog.rows().iter().all(|row| row.len() == width));

    // The gridspec file parsed through the fallback template rather
    // than falling out as a path-only row.
    let gridspec = catalog
        .rows()
        .iter()
        .find(|row| {
            row[catalog.schema().path_index()]
                .render()
                .contains("sftlf")
        })
        .expect("gridspec row present");
    let variable_index = catalog.schema().position("variable_id").expect("column");
    assert_eq!(gridspec[variable_index].render(), "sftlf");

    // The unparseable stray file is still cataloged, path populated,
    // everything else null.
    let stray = catalog
        .rows()
        .iter()
        .find(|row| {
            row[catalog.schema().path_index()]
                .render()
                .contains("stray-notes")
        })
        .expect("stray row present");
    for (index, cell) in stray.iter().enumerate() {
        if index == catalog.schema().path_index() {
            assert!(!cell.is_null());
        } else {
            assert!(cell.is_null());
        }
    }
    Ok(())
}

#[tokio::test]
async fn repeated_builds_render_identical_bytes() -> TestResult {
    let tmp = TempDir::new()?;
    cmip6_tree(tmp.path())?;

    let convention = Cmip6Convention::new()?;
    let options = BuildOptions {
        depth: 2,
        ..BuildOptions::default()
    };
    let builder = CatalogBuilder::new(&convention, options);

    let first = builder.build(&StorageLocation::local(tmp.path())).await?;
    let second = builder.build(&StorageLocation::local(tmp.path())).await?;
    assert_eq!(render_csv(&first)?, render_csv(&second)?);
    Ok(())
}

#[tokio::test]
async fn paths_are_unique_in_single_source_mode() -> TestResult {
    let tmp = TempDir::new()?;
    cmip6_tree(tmp.path())?;

    let convention = Cmip6Convention::new()?;
    let options = BuildOptions {
        depth: 2,
        ..BuildOptions::default()
    };
    let builder = CatalogBuilder::new(&convention, options);
    let catalog = builder.build(&StorageLocation::local(tmp.path())).await?;

    catalog.ensure_unique_paths()?;
    Ok(())
}

const CESM_DEFINITIONS: &str = r#"
component_streams:
  atm:
    - cam.h0
  ocn:
    - pop.h
experiments:
  historical:
    case_members:
      b.e21.BHIST.f09_g17.CMIP6-historical.010:
        member_id: 10
        ctrl_experiment: piControl
"#;

#[tokio::test]
async fn collection_build_spans_conventions_and_merges_sources() -> TestResult {
    let tmp = TempDir::new()?;
    touch(&tmp.path().join(
        "cesm/b.e21.BHIST.f09_g17.CMIP6-historical.010.cam.h0.TREFHT.185001-189912.nc",
    ))?;
    touch(&tmp.path().join(
        "cmip/tas_Amon_CESM2_historical_r1i1p1f1_gn_185001-201412.nc",
    ))?;

    let text = format!(
        r#"
id: mixed
description: CESM and CMIP6 assets in one catalog
columns: [experiment, case, variable, variable_id, member_id, origin, path]
datasets:
  cesm-runs:
    convention: cesm
    attributes:
      origin: cesm
    data_sources:
      - glob: "{root}/cesm/*.nc"
  cmip-runs:
    convention: cmip6
    attributes:
      origin: cmip
    data_sources:
      - glob: "{root}/cmip/*.nc"
      - glob: "{root}/cmip/tas_*.nc"
        attributes:
          member_id: overridden
"#,
        root = tmp.path().display()
    );
    let config = CollectionConfig::from_yaml_str(&text)?;

    let mut registry = ConventionRegistry::with_builtin()?;
    let definitions = CesmDefinitions::from_yaml_str(CESM_DEFINITIONS)?;
    registry.register(Arc::new(CesmConvention::new(definitions)?));

    let catalog = build_collection(&config, &registry).await?;

    // One row per unique path even though the tas file matched two
    // sources of the cmip dataset.
    assert_eq!(catalog.len(), 2);
    catalog.ensure_unique_paths()?;

    let origin_index = catalog.schema().position("origin").expect("column");
    let member_index = catalog.schema().position("member_id").expect("column");
    let case_index = catalog.schema().position("case").expect("column");

    let cesm_row = &catalog.rows()[0];
    assert_eq!(cesm_row[origin_index].render(), "cesm");
    assert_eq!(cesm_row[member_index].render(), "10");
    assert_eq!(
        cesm_row[case_index].render(),
        "b.e21.BHIST.f09_g17.CMIP6-historical.010"
    );

    let cmip_row = &catalog.rows()[1];
    assert_eq!(cmip_row[origin_index].render(), "cmip");
    // The second source's constant wins over the parsed member id.
    assert_eq!(cmip_row[member_index].render(), "overridden");
    assert!(cmip_row[case_index].is_null());
    Ok(())
}

#[tokio::test]
async fn exclude_patterns_remove_latest_mirrors() -> TestResult {
    let tmp = TempDir::new()?;
    touch(&tmp.path().join(
        "CMIP/NCAR/CESM2/historical/r1i1p1f1/Amon/tas/gn/v20190308/tas_Amon_CESM2_historical_r1i1p1f1_gn_185001-201412.nc",
    ))?;
    touch(&tmp.path().join(
        "CMIP/NCAR/CESM2/historical/r1i1p1f1/Amon/tas/gn/latest/tas_Amon_CESM2_historical_r1i1p1f1_gn_185001-201412.nc",
    ))?;

    let convention = Cmip6Convention::new()?;
    let options = BuildOptions {
        depth: 2,
        exclude_patterns: vec!["*/latest/*".to_string()],
        ..BuildOptions::default()
    };
    let builder = CatalogBuilder::new(&convention, options);
    let catalog = builder.build(&StorageLocation::local(tmp.path())).await?;

    assert_eq!(catalog.len(), 1);
    assert!(catalog.rows()[0][catalog.schema().path_index()]
        .render()
        .contains("/v20190308/"));
    Ok(())
}

#[tokio::test]
async fn version_resolution_spans_discovery_to_table() -> TestResult {
    let tmp = TempDir::new()?;
    for version in ["v1", "v2", "v20200101"] {
        touch(&tmp.path().join(format!(
            "CMIP/NCAR/CESM2/historical/r1i1p1f1/Amon/tas/gn/{version}/tas_Amon_CESM2_historical_r1i1p1f1_gn_185001-201412.nc",
        )))?;
    }

    let convention = Cmip6Convention::new()?;
    let options = BuildOptions {
        depth: 2,
        pick_latest_version: true,
        ..BuildOptions::default()
    };
    let builder = CatalogBuilder::new(&convention, options);
    let catalog = builder.build(&StorageLocation::local(tmp.path())).await?;

    assert_eq!(catalog.len(), 1);
    let version_index = catalog.schema().position("version").expect("column");
    assert_eq!(catalog.rows()[0][version_index].render(), "v20200101");
    Ok(())
}
