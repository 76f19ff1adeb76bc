//! KiCad symbol library (`.kicad_sym`) handling.
//!
//! The library file is shared with the external generator and with KiCad
//! itself, so it is treated as text: blocks are located with patterns and
//! balanced-parenthesis scans, and every edit is spliced into the original
//! text so bytes outside the touched block never change.
//!
//! # Module Structure
//!
//! - [`block`]: document and block model, property lookup, value escaping
//! - [`reader`]: installed-id scans and component records
//! - [`classify`]: component kind and display-value derivation
//! - [`writer`]: in-place enrichment and removal with backup
//! - [`sexpr`]: quote-aware span scanning

pub mod block;
pub mod classify;
pub mod error;
pub mod reader;
pub mod sexpr;
pub mod writer;

pub use block::{Block, Document, Property};
pub use classify::{classify, display_value, ComponentKind};
pub use error::{SymbolError, SymbolResult};
pub use reader::{
    extract_id_to_name, extract_ids, extract_records, installed_ids, installed_records,
    read_document, ComponentRecord,
};
pub use writer::{
    backup_path, enrich_symbol_file, remove_block, remove_symbol_file, update_block, BlockUpdate,
    EnrichOutcome, FieldChanges, FieldUpdate, RemovedSymbol,
};

/// Text of a library with no symbols, as written when a project is set up.
pub const EMPTY_LIBRARY: &str =
    "(kicad_symbol_lib (version 20210201) (generator kicad-jlc-manager)\n)\n";
