//! kicad-jlc-manager: project-local JLCPCB/LCSC component libraries for KiCad
//!
//! A project declares the parts it wants in `jlcproject.toml`. This library
//! keeps a KiCad symbol/footprint library in step with that list:
//!
//! - **Generation**: each part is produced by the external `JLC2KiCadLib`
//!   tool, which appends to one shared `.kicad_sym` file
//! - **Enrichment**: the generated symbol's `Value`, `Description` and
//!   `ki_keywords` are filled in from the LCSC product API, editing the file
//!   text in place
//! - **Reconciliation**: add, remove and sync compare the manifest with the
//!   ids installed in the symbol library
//!
//! # Modules
//!
//! - [`symbol`]: `.kicad_sym` reading, enrichment and removal
//! - [`supplier`]: LCSC product details
//! - [`generator`]: external generator driver
//! - [`manifest`]: `jlcproject.toml`
//! - [`project`]: project discovery and library layout
//! - [`lib_table`]: `sym-lib-table`, `fp-lib-table` and `.gitignore`
//! - [`reconcile`]: add / remove / sync
//! - [`config`]: user settings
//! - [`error`]: error types

pub mod config;
pub mod error;
pub mod generator;
pub mod lib_table;
pub mod manifest;
pub mod project;
pub mod reconcile;
pub mod supplier;
pub mod symbol;
