//! Read path: what components does a symbol library contain?
//!
//! Three granularities, from cheapest to most structured:
//!
//! - [`extract_ids`]: raw scan for `LCSC` property values anywhere in the text
//! - [`extract_id_to_name`]: single forward pass pairing each `LCSC` value
//!   with the nearest preceding symbol declaration
//! - [`extract_records`]: block split with per-field extraction
//!
//! A missing file is the valid "nothing installed yet" state and reads as an
//! empty document.

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::Path;

use serde::Serialize;

use super::block::{declarations, Document, Property};
use super::{SymbolError, SymbolResult};

/// Component-level view of one top-level symbol carrying an `LCSC` property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentRecord {
    /// Supplier part number, the reconciliation key.
    pub external_id: String,
    /// Decoded symbol name (manufacturer part number).
    pub part_number: String,
    /// `Value` property, or the symbol name when absent.
    pub value: String,
    /// `Description` property, empty when absent.
    pub description: String,
}

/// Reads a symbol library file.
///
/// A file that does not exist reads as an empty document.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read as UTF-8 text.
pub fn read_document(path: impl AsRef<Path>) -> SymbolResult<Document> {
    let path = path.as_ref();
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(Document::parse(text)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "Symbol library not found, treating as empty");
            Ok(Document::parse(String::new()))
        }
        Err(e) => Err(SymbolError::file_read(path, e)),
    }
}

/// Every `LCSC` property value found anywhere in `text`.
///
/// Block structure is ignored, so this survives malformed files. It trusts
/// any occurrence of the property, including ones inside unit blocks.
#[must_use]
pub fn extract_ids(text: &str) -> BTreeSet<String> {
    Property::Lcsc
        .pattern()
        .captures_iter(text)
        .map(|caps| super::block::decode_value(&caps[1]))
        .filter(|id| !id.is_empty())
        .collect()
}

/// Maps each `LCSC` value to the name of the nearest preceding symbol
/// declaration.
///
/// Ownership is decided by position, not nesting depth: a property always
/// belongs to the last `(symbol "...")` seen before it, even when the
/// declaration spans lines. Properties before the first declaration are
/// ignored.
#[must_use]
pub fn extract_id_to_name(text: &str) -> BTreeMap<String, String> {
    #[derive(Default)]
    struct Scan {
        current: Option<String>,
        found: BTreeMap<String, String>,
    }

    enum Event {
        Declared(String),
        Id(String),
    }

    let mut events: Vec<(usize, Event)> = declarations(text)
        .map(|(at, name)| (at, Event::Declared(name)))
        .collect();
    events.extend(Property::Lcsc.pattern().captures_iter(text).filter_map(|caps| {
        let at = caps.get(0)?.start();
        Some((at, Event::Id(super::block::decode_value(&caps[1]))))
    }));
    events.sort_by_key(|(at, _)| *at);

    events
        .into_iter()
        .map(|(_, event)| event)
        .fold(Scan::default(), |mut scan, event| {
            match event {
                Event::Declared(name) => scan.current = Some(name),
                Event::Id(id) if !id.is_empty() => {
                    if let Some(name) = &scan.current {
                        scan.found.insert(id, name.clone());
                    }
                }
                Event::Id(_) => {}
            }
            scan
        })
        .found
}

/// Component records for every top-level block with an `LCSC` property.
///
/// Unit blocks and blocks whose name cannot be parsed are skipped. If two
/// blocks carry the same external id, the later one wins; which of them is
/// "right" is undefined and a warning is logged.
#[must_use]
pub fn extract_records(text: &str) -> BTreeMap<String, ComponentRecord> {
    let document = Document::parse(text);
    let mut records = BTreeMap::new();

    for block in document.blocks() {
        let Some(name) = block.name() else {
            tracing::debug!(span = ?block.span(), "Skipping block without a parsable name");
            continue;
        };
        if super::block::is_sub_block_name(&name) {
            continue;
        }
        let Some(external_id) = block.external_id() else {
            continue;
        };

        let record = ComponentRecord {
            value: block.value_field().unwrap_or_else(|| name.clone()),
            description: block.description_field(),
            part_number: name,
            external_id: external_id.clone(),
        };

        if let Some(previous) = records.insert(external_id.clone(), record) {
            tracing::warn!(
                external_id = %external_id,
                replaced = %previous.part_number,
                "Duplicate external id in symbol library, keeping the later block"
            );
        }
    }

    records
}

/// External ids installed in the library at `path`.
///
/// Never fails: unreadable files are logged and read as empty.
#[must_use]
pub fn installed_ids(path: impl AsRef<Path>) -> BTreeSet<String> {
    match read_document(path) {
        Ok(document) => extract_ids(document.text()),
        Err(e) => {
            tracing::warn!(error = %e, "Could not read symbol library");
            BTreeSet::new()
        }
    }
}

/// Component records installed in the library at `path`.
///
/// Never fails: unreadable files are logged and read as empty.
#[must_use]
pub fn installed_records(path: impl AsRef<Path>) -> BTreeMap<String, ComponentRecord> {
    match read_document(path) {
        Ok(document) => extract_records(document.text()),
        Err(e) => {
            tracing::warn!(error = %e, "Could not read symbol library");
            BTreeMap::new()
        }
    }
}
