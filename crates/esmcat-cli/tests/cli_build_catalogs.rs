//! End-to-end tests for the `esmcat` binary: CMIP builds, collection
//! builds, and checksum sidecars, all over temporary file trees.

use std::io::Read;
use std::path::Path;

use assert_cmd::Command;
use md5::{Digest, Md5};
use predicates::prelude::*;
use tempfile::TempDir;

type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

fn esmcat_cmd() -> Command {
    Command::cargo_bin("esmcat").expect("binary built")
}

fn touch(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, b"")
}

fn read_gzipped_csv(path: &Path) -> TestResult<String> {
    let compressed = std::fs::read(path)?;
    let mut decoder = flate2::read::GzDecoder::new(compressed.as_slice());
    let mut text = String::new();
    decoder.read_to_string(&mut text)?;
    Ok(text)
}

const CMIP6_HEADER: &str = "activity_id,institution_id,source_id,experiment_id,member_id,\
                            table_id,variable_id,grid_label,dcpp_init_year,version,time_range,path";

#[test]
fn cmip6_build_writes_catalog_and_descriptor() -> TestResult {
    let archive = TempDir::new()?;
    let out = TempDir::new()?;

    touch(&archive.path().join(
        "CMIP6/CMIP/NCAR/CESM2/historical/r1i1p1f1/Amon/tas/gn/v20190308/tas_Amon_CESM2_historical_r1i1p1f1_gn_185001-201412.nc",
    ))?;
    touch(&archive.path().join(
        "CMIP6/CMIP/MOHC/UKESM1-0-LL/historical/r1i1p1f1/Amon/pr/gn/v20190627/pr_Amon_UKESM1-0-LL_historical_r1i1p1f1_gn_185001-194912.nc",
    ))?;
    // A `latest` mirror of the NCAR file must be excluded by default.
    touch(&archive.path().join(
        "CMIP6/CMIP/NCAR/CESM2/historical/r1i1p1f1/Amon/tas/gn/latest/tas_Amon_CESM2_historical_r1i1p1f1_gn_185001-201412.nc",
    ))?;

    esmcat_cmd()
        .args([
            "cmip",
            "--root-path",
            &archive.path().display().to_string(),
            "--cmip-version",
            "6",
            "--persist-path",
            &out.path().display().to_string(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Cataloged 2 assets"));

    let csv = read_gzipped_csv(&out.path().join("cmip6.csv.gz"))?;
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], CMIP6_HEADER);
    assert_eq!(lines.len(), 3);
    // Rows are path-sorted: MOHC before NCAR.
    assert!(lines[1].contains("pr_Amon_UKESM1-0-LL"));
    assert!(lines[1].contains("MOHC,UKESM1-0-LL"));
    assert!(lines[2].contains("tas_Amon_CESM2"));
    assert!(lines[2].contains("v20190308"));
    assert!(!csv.contains("/latest/"));

    let descriptor: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(out.path().join("cmip6.json"))?)?;
    assert_eq!(descriptor["id"], "cmip6");
    assert_eq!(descriptor["catalog_file"], "cmip6.csv.gz");
    assert_eq!(descriptor["assets"]["column_name"], "path");
    assert_eq!(descriptor["assets"]["format"], "netcdf");
    assert_eq!(
        descriptor["aggregation_control"]["variable_column_name"],
        "variable_id"
    );
    let attributes = descriptor["attributes"].as_array().expect("attribute list");
    assert_eq!(attributes.len(), 11);
    assert!(attributes.iter().all(|a| a["vocabulary"] == ""));
    Ok(())
}

#[test]
fn cmip6_build_is_deterministic() -> TestResult {
    let archive = TempDir::new()?;
    let out_a = TempDir::new()?;
    let out_b = TempDir::new()?;

    touch(&archive.path().join(
        "CMIP6/CMIP/NCAR/CESM2/historical/r1i1p1f1/Amon/tas/gn/v20190308/tas_Amon_CESM2_historical_r1i1p1f1_gn_185001-201412.nc",
    ))?;
    touch(&archive.path().join(
        "CMIP6/CMIP/NCAR/CESM2/historical/r1i1p1f1/Amon/pr/gn/v20190308/pr_Amon_CESM2_historical_r1i1p1f1_gn_185001-201412.nc",
    ))?;

    for out in [&out_a, &out_b] {
        esmcat_cmd()
            .args([
                "cmip",
                "--root-path",
                &archive.path().display().to_string(),
                "--cmip-version",
                "6",
                "--persist-path",
                &out.path().display().to_string(),
            ])
            .assert()
            .success();
    }

    let a = read_gzipped_csv(&out_a.path().join("cmip6.csv.gz"))?;
    let b = read_gzipped_csv(&out_b.path().join("cmip6.csv.gz"))?;
    assert_eq!(a, b);
    Ok(())
}

#[test]
fn pick_latest_version_keeps_only_the_newest_copy() -> TestResult {
    let archive = TempDir::new()?;
    let out = TempDir::new()?;

    for version in ["v1", "v20190308", "v20200101"] {
        touch(&archive.path().join(format!(
            "CMIP6/CMIP/NCAR/CESM2/historical/r1i1p1f1/Amon/tas/gn/{version}/tas_Amon_CESM2_historical_r1i1p1f1_gn_185001-201412.nc",
        )))?;
    }

    esmcat_cmd()
        .args([
            "cmip",
            "--root-path",
            &archive.path().display().to_string(),
            "--cmip-version",
            "6",
            "--pick-latest-version",
            "--persist-path",
            &out.path().display().to_string(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Cataloged 1 assets"));

    let csv = read_gzipped_csv(&out.path().join("cmip6.csv.gz"))?;
    assert_eq!(csv.lines().count(), 2);
    assert!(csv.contains("v20200101"));
    assert!(!csv.contains("v20190308"));
    Ok(())
}

#[test]
fn cmip5_build_recovers_directory_attributes() -> TestResult {
    let archive = TempDir::new()?;
    let out = TempDir::new()?;

    touch(&archive.path().join(
        "cmip5/output1/NCAR/CCSM4/rcp85/mon/atmos/Amon/r1i1p1/v20120409/tas/tas_Amon_CCSM4_rcp85_r1i1p1_200601-210012.nc",
    ))?;

    esmcat_cmd()
        .args([
            "cmip",
            "--root-path",
            &archive.path().display().to_string(),
            "--cmip-version",
            "5",
            "--persist-path",
            &out.path().display().to_string(),
        ])
        .assert()
        .success();

    let csv = read_gzipped_csv(&out.path().join("cmip5.csv.gz"))?;
    let lines: Vec<&str> = csv.lines().collect();
    assert!(lines[0].starts_with("product_id,institute,model,experiment"));
    assert!(lines[1].starts_with("output1,NCAR,CCSM4,rcp85,mon,atmos"));
    Ok(())
}

#[test]
fn collection_build_merges_declared_attributes() -> TestResult {
    let tmp = TempDir::new()?;
    let out = TempDir::new()?;

    touch(&tmp.path().join(
        "runs/tas_Amon_CESM2_historical_r1i1p1f1_gn_185001-201412.nc",
    ))?;
    touch(&tmp.path().join(
        "runs/pr_Amon_CESM2_historical_r1i1p1f1_gn_185001-201412.nc",
    ))?;

    let config = tmp.path().join("demo.yml");
    std::fs::write(
        &config,
        format!(
            r#"
id: demo-runs
description: demo collection
columns: [experiment, member_id, variable_id, path]
datasets:
  runs:
    convention: cmip6
    attributes:
      experiment: historical
    data_sources:
      - glob: "{root}/runs/*.nc"
        attributes:
          member_id: r1i1p1f1
"#,
            root = tmp.path().display()
        ),
    )?;

    esmcat_cmd()
        .args([
            "collection",
            "--config",
            &config.display().to_string(),
            "--out-dir",
            &out.path().display().to_string(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Cataloged 2 assets"));

    let csv = read_gzipped_csv(&out.path().join("demo-runs.csv.gz"))?;
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "experiment,member_id,variable_id,path");
    assert!(lines[1].starts_with("historical,r1i1p1f1,pr,"));
    assert!(lines[2].starts_with("historical,r1i1p1f1,tas,"));

    let descriptor: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(out.path().join("demo-runs.json"))?)?;
    assert_eq!(descriptor["id"], "demo-runs");
    assert_eq!(descriptor["description"], "demo collection");
    Ok(())
}

#[test]
fn invalid_collection_definition_fails_before_any_output() -> TestResult {
    let tmp = TempDir::new()?;
    let out = TempDir::new()?;

    let config = tmp.path().join("broken.yml");
    std::fs::write(&config, "id: broken\ncolumns: [path]\n")?;

    esmcat_cmd()
        .args([
            "collection",
            "--config",
            &config.display().to_string(),
            "--out-dir",
            &out.path().display().to_string(),
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("at least one dataset"));

    assert!(!out.path().join("broken.csv.gz").exists());
    assert!(!out.path().join("broken.json").exists());
    Ok(())
}

#[test]
fn checksum_writes_md5_sidecars() -> TestResult {
    let tmp = TempDir::new()?;

    let contents = b"id: demo\ncolumns: [path]\n";
    std::fs::write(tmp.path().join("experiments.yml"), contents)?;
    std::fs::write(tmp.path().join("notes.txt"), b"ignored")?;

    esmcat_cmd()
        .args(["checksum", "--dir", &tmp.path().display().to_string()])
        .assert()
        .success()
        .stdout(predicate::str::contains("experiments.yml"));

    let expected: String = Md5::digest(contents)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect();
    let written = std::fs::read_to_string(tmp.path().join("experiments.md5"))?;
    assert_eq!(written, expected);
    assert!(!tmp.path().join("notes.md5").exists());
    Ok(())
}
