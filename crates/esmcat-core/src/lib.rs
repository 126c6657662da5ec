//! Core engine for building ESM data-file catalogs.
//!
//! This crate provides the catalog-building pipeline for `esmcat`:
//!
//! - Parallel asset discovery over a storage root (`discovery` module).
//! - Naming-convention parsers that reverse a file path into structured
//!   attributes (`parse` module).
//! - Schema conformance and pre-parse exclusion filters (`normalize`
//!   module).
//! - Assembly of one or many logical datasets into a single path-sorted
//!   catalog table (`build` module), driven either directly or by a
//!   declarative collection definition (`config` module).
//! - Latest-version pruning for catalogs that carry a `version`
//!   attribute (`version` module).
//! - The machine-readable catalog descriptor sidecar (`descriptor`
//!   module) and atomic persistence of both artifacts (`persist`
//!   module).
//!
//! Command-line front ends (for example, the `esmcat` binary) are
//! expected to depend on this core crate rather than re-implementing the
//! discovery and parsing logic.
#![deny(missing_docs)]
pub mod build;
pub mod catalog;
pub mod config;
pub mod descriptor;
pub mod discovery;
pub mod globlike;
pub mod normalize;
pub mod parse;
pub mod persist;
pub mod storage;
pub mod version;
