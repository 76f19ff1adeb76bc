//! Write path: enrich or remove one component in place.
//!
//! Every rewrite is confined to the text span of the block that owns the
//! target `LCSC` property. The rest of the document, including the header and
//! every other block, is copied through untouched.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use super::block::{decode_value, encode_value, Document, Property};
use super::classify::{classify, clean_description, display_value, looks_like_part_number};
use super::sexpr::{line_indent, list_end};
use super::{SymbolError, SymbolResult};
use crate::supplier::ApiDetails;

/// Suffix appended to the library path for the single-generation backup.
pub const BACKUP_SUFFIX: &str = ".bak";

fn property_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\(id\s+(\d+)\)").expect("property id pattern is valid"))
}

/// What happened to one field of the target block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldUpdate {
    /// Left as it was (no candidate, guard failed, or already equal).
    #[default]
    Untouched,
    /// Existing property value replaced.
    Rewritten,
    /// New property inserted.
    Inserted,
    /// The block lacks the anchor this rewrite needs (no `Datasheet`
    /// property to insert a description after).
    Unsupported,
}

impl FieldUpdate {
    /// Returns `true` if the block text changed.
    #[must_use]
    pub const fn changed(self) -> bool {
        matches!(self, Self::Rewritten | Self::Inserted)
    }
}

/// Per-field result of [`update_block`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FieldChanges {
    /// `Value` property.
    pub value: FieldUpdate,
    /// `Description` property.
    pub description: FieldUpdate,
    /// `ki_keywords` property.
    pub keywords: FieldUpdate,
}

impl FieldChanges {
    /// Returns `true` if any field changed.
    #[must_use]
    pub const fn any(&self) -> bool {
        self.value.changed() || self.description.changed() || self.keywords.changed()
    }
}

/// Result of [`update_block`]: the new document text and what changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockUpdate {
    /// Full document text after the update (the input when nothing changed).
    pub document: String,
    /// Whether a block with the external id was found.
    pub found: bool,
    /// Per-field outcome.
    pub changes: FieldChanges,
}

impl BlockUpdate {
    fn not_found(document: &str) -> Self {
        Self {
            document: document.to_string(),
            found: false,
            changes: FieldChanges::default(),
        }
    }

    /// Returns `true` if the document text differs from the input.
    #[must_use]
    pub const fn changed(&self) -> bool {
        self.changes.any()
    }
}

/// Enriches the block whose `LCSC` property equals `external_id` with
/// supplier data.
///
/// Up to three independent rewrites are applied to that block only:
///
/// 1. `Value` becomes the derived display value, but only when the current
///    value looks like a raw manufacturer part number.
/// 2. `Description` is replaced, or inserted after the `Datasheet` property
///    when absent.
/// 3. `ki_keywords` grows to `id brand model`, but only when it currently
///    holds exactly the bare id.
///
/// Without details (or with an empty record), or when no top-level block
/// carries the id, the document is returned unchanged.
#[must_use]
pub fn update_block(
    document: &str,
    external_id: &str,
    details: Option<&ApiDetails>,
) -> BlockUpdate {
    let Some(details) = details.filter(|d| !d.is_empty()) else {
        return BlockUpdate::not_found(document);
    };

    let parsed = Document::parse(document);
    let Some(block) = parsed.find_component(external_id) else {
        tracing::debug!(external_id, "No symbol block carries this external id");
        return BlockUpdate::not_found(document);
    };

    let span = block.span();
    let mut text = block.text().to_string();
    let changes = FieldChanges {
        value: rewrite_value(&mut text, details),
        description: rewrite_description(&mut text, details),
        keywords: rewrite_keywords(&mut text, external_id, details),
    };

    tracing::debug!(external_id, ?changes, "Computed block update");

    if !changes.any() {
        return BlockUpdate {
            document: document.to_string(),
            found: true,
            changes,
        };
    }

    let mut updated = String::with_capacity(document.len() + text.len() - span.len());
    updated.push_str(&document[..span.start]);
    updated.push_str(&text);
    updated.push_str(&document[span.end..]);

    BlockUpdate {
        document: updated,
        found: true,
        changes,
    }
}

fn replace_value(text: &mut String, property: Property, value: &str) -> bool {
    let Some(range) = property
        .pattern()
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.range())
    else {
        return false;
    };
    text.replace_range(range, &encode_value(value));
    true
}

fn current_value(text: &str, property: Property) -> Option<String> {
    property
        .pattern()
        .captures(text)
        .map(|caps| decode_value(&caps[1]))
}

fn rewrite_value(text: &mut String, details: &ApiDetails) -> FieldUpdate {
    let Some(candidate) = display_value(details, classify(details)) else {
        return FieldUpdate::Untouched;
    };
    let Some(current) = current_value(text, Property::Value) else {
        return FieldUpdate::Untouched;
    };
    if candidate == current || !looks_like_part_number(&current) {
        return FieldUpdate::Untouched;
    }
    if replace_value(text, Property::Value, &candidate) {
        FieldUpdate::Rewritten
    } else {
        FieldUpdate::Untouched
    }
}

fn rewrite_description(text: &mut String, details: &ApiDetails) -> FieldUpdate {
    let description = clean_description(details.introduction().unwrap_or_default());
    if description.is_empty() {
        return FieldUpdate::Untouched;
    }

    if let Some(current) = current_value(text, Property::Description) {
        if current == description {
            return FieldUpdate::Untouched;
        }
        return if replace_value(text, Property::Description, &description) {
            FieldUpdate::Rewritten
        } else {
            FieldUpdate::Untouched
        };
    }

    let Some(datasheet) = Property::Datasheet
        .pattern()
        .find(text)
        .map(|m| m.start())
    else {
        return FieldUpdate::Unsupported;
    };
    let Some(end) = list_end(text, datasheet) else {
        tracing::warn!("Datasheet property is not closed, cannot insert description");
        return FieldUpdate::Unsupported;
    };

    let indent = line_indent(text, datasheet).to_string();
    let eol = line_ending(text, datasheet);
    let id = if text[datasheet..end].contains("(id ") {
        let next = property_id_re()
            .captures_iter(text)
            .filter_map(|caps| caps[1].parse::<u32>().ok())
            .max()
            .map_or(0, |max| max + 1);
        format!(" (id {next})")
    } else {
        String::new()
    };

    let property = format!(
        "{eol}{indent}(property \"Description\" \"{value}\"{id} (at 0 0 0){eol}{indent}  (effects (font (size 1.27 1.27)) hide){eol}{indent})",
        value = encode_value(&description),
    );
    text.insert_str(end, &property);
    FieldUpdate::Inserted
}

/// Line ending of the line containing `at`: `\r\n` when it has one.
fn line_ending(text: &str, at: usize) -> &'static str {
    match text[at..].find('\n') {
        Some(i) if text[..at + i].ends_with('\r') => "\r\n",
        _ => "\n",
    }
}

fn rewrite_keywords(text: &mut String, external_id: &str, details: &ApiDetails) -> FieldUpdate {
    let keywords: Vec<&str> = std::iter::once(external_id)
        .chain(details.brand())
        .chain(details.model())
        .filter(|k| !k.is_empty())
        .collect();
    if keywords.len() < 2 {
        return FieldUpdate::Untouched;
    }

    match current_value(text, Property::Keywords) {
        Some(current) if current == external_id => {
            if replace_value(text, Property::Keywords, &keywords.join(" ")) {
                FieldUpdate::Rewritten
            } else {
                FieldUpdate::Untouched
            }
        }
        _ => FieldUpdate::Untouched,
    }
}

/// Outcome of [`enrich_symbol_file`].
///
/// The file-level operation never fails past its boundary; failures are
/// reported here instead so callers can tell "no data" from "broken file".
#[derive(Debug)]
pub enum EnrichOutcome {
    /// The file was rewritten.
    Updated(FieldChanges),
    /// The block was found but nothing needed to change.
    Unchanged(FieldChanges),
    /// No supplier details were available.
    NoData,
    /// No top-level block carries the external id (or the file is missing).
    NotFound,
    /// Reading, backing up or writing the file failed.
    Failed(SymbolError),
}

impl EnrichOutcome {
    /// Returns `true` if the file was rewritten.
    #[must_use]
    pub const fn changed(&self) -> bool {
        matches!(self, Self::Updated(_))
    }
}

/// Path of the single-generation backup for `path`.
#[must_use]
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(BACKUP_SUFFIX);
    PathBuf::from(name)
}

/// Applies [`update_block`] to the library file at `path`.
///
/// The original file is copied to [`backup_path`] before the update is
/// computed, overwriting any previous backup. The backup exists even when
/// nothing changes. The file itself is only rewritten when something
/// changed.
#[must_use]
pub fn enrich_symbol_file(
    path: &Path,
    external_id: &str,
    details: Option<&ApiDetails>,
) -> EnrichOutcome {
    let Some(details) = details.filter(|d| !d.is_empty()) else {
        return EnrichOutcome::NoData;
    };

    let outcome = try_enrich(path, external_id, details);
    match &outcome {
        EnrichOutcome::Updated(changes) => {
            tracing::info!(external_id, path = %path.display(), ?changes, "Enriched symbol");
        }
        EnrichOutcome::Failed(e) => {
            tracing::warn!(external_id, error = %e, "Symbol enrichment failed");
        }
        _ => {}
    }
    outcome
}

fn try_enrich(path: &Path, external_id: &str, details: &ApiDetails) -> EnrichOutcome {
    let original = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return EnrichOutcome::NotFound,
        Err(e) => return EnrichOutcome::Failed(SymbolError::file_read(path, e)),
    };

    let backup = backup_path(path);
    if let Err(e) = std::fs::copy(path, &backup) {
        return EnrichOutcome::Failed(SymbolError::backup(backup, e));
    }

    let update = update_block(&original, external_id, Some(details));
    if !update.found {
        return EnrichOutcome::NotFound;
    }
    if !update.changed() {
        return EnrichOutcome::Unchanged(update.changes);
    }

    match std::fs::write(path, &update.document) {
        Ok(()) => EnrichOutcome::Updated(update.changes),
        Err(e) => EnrichOutcome::Failed(SymbolError::file_write(path, e)),
    }
}

/// A top-level symbol removed from a library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedSymbol {
    /// Decoded symbol name.
    pub name: String,
    /// `Footprint` property of the removed symbol, if any.
    pub footprint: Option<String>,
    /// Whether another remaining symbol references the same footprint.
    pub footprint_shared: bool,
}

/// Removes the whole top-level symbol (unit symbols included) whose `LCSC`
/// property equals `external_id`.
///
/// Returns the new document text and what was removed, or `None` when no
/// such symbol exists or its closing parenthesis cannot be found.
#[must_use]
pub fn remove_block(document: &str, external_id: &str) -> Option<(String, RemovedSymbol)> {
    let parsed = Document::parse(document);
    let block = parsed.find_component(external_id)?;
    let span = block.span();
    let Some(end) = list_end(document, span.start + block.open_offset()) else {
        tracing::warn!(external_id, "Symbol is not closed, refusing to remove it");
        return None;
    };

    let name = block.name().unwrap_or_default();
    let footprint = block
        .property(Property::Footprint)
        .filter(|f| !f.is_empty());

    let mut updated = String::with_capacity(document.len());
    updated.push_str(&document[..span.start]);
    updated.push_str(&document[end..]);

    let footprint_shared = footprint.as_ref().is_some_and(|footprint| {
        Document::parse(updated.as_str())
            .blocks()
            .any(|b| b.property(Property::Footprint).as_ref() == Some(footprint))
    });

    Some((
        updated,
        RemovedSymbol {
            name,
            footprint,
            footprint_shared,
        },
    ))
}

/// Applies [`remove_block`] to the library file at `path`, backing it up
/// first.
///
/// # Errors
///
/// Returns an error if the file cannot be read, backed up or written. A
/// missing file or symbol is `Ok(None)`.
pub fn remove_symbol_file(path: &Path, external_id: &str) -> SymbolResult<Option<RemovedSymbol>> {
    let original = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(SymbolError::file_read(path, e)),
    };

    let Some((updated, removed)) = remove_block(&original, external_id) else {
        return Ok(None);
    };

    let backup = backup_path(path);
    std::fs::copy(path, &backup).map_err(|e| SymbolError::backup(backup, e))?;
    std::fs::write(path, updated).map_err(|e| SymbolError::file_write(path, e))?;

    tracing::info!(external_id, symbol = %removed.name, "Removed symbol");
    Ok(Some(removed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn details(value: serde_json::Value) -> ApiDetails {
        ApiDetails::from_result(value).unwrap()
    }

    const RESISTOR: &str = r#"(kicad_symbol_lib (version 20210201) (generator kicad-jlc-manager)
  (symbol "0805W8F1002T5E" (in_bom yes) (on_board yes)
    (property "Reference" "R" (id 0) (at 0 2.54 0)
      (effects (font (size 1.27 1.27)))
    )
    (property "Value" "0805W8F1002T5E" (id 1) (at 0 -2.54 0)
      (effects (font (size 1.27 1.27)))
    )
    (property "Datasheet" "https://lcsc.com/product-detail/C17414.html" (id 3) (at 0 0 0)
      (effects (font (size 1.27 1.27)) hide)
    )
    (property "LCSC" "C17414" (id 4) (at 0 0 0)
      (effects (font (size 1.27 1.27)) hide)
    )
    (property "ki_keywords" "C17414" (id 5) (at 0 0 0)
      (effects (font (size 1.27 1.27)) hide)
    )
    (symbol "0805W8F1002T5E_0_1"
      (rectangle (start -1 0.4) (end 1 -0.4))
    )
  )
)
"#;

    fn resistor_details() -> ApiDetails {
        details(json!({
            "productIntroEn": "10kΩ ±1% 1/8W 0805 Thick Film Resistors RoHS",
            "catalogName": "Chip Resistor - Surface Mount",
            "brandNameEn": "UNI-ROYAL",
            "productModel": "0805W8F1002T5E",
        }))
    }

    #[test]
    fn no_details_is_noop() {
        let update = update_block(RESISTOR, "C17414", None);
        assert!(!update.changed());
        assert_eq!(update.document, RESISTOR);

        let empty = ApiDetails::from_result(json!({}));
        assert!(empty.is_none());
    }

    #[test]
    fn unknown_id_is_noop() {
        let update = update_block(RESISTOR, "C1", Some(&resistor_details()));
        assert!(!update.found);
        assert!(!update.changed());
        assert_eq!(update.document, RESISTOR);
    }

    #[test]
    fn resistor_value_description_keywords() {
        let update = update_block(RESISTOR, "C17414", Some(&resistor_details()));
        assert!(update.changed());
        assert_eq!(update.changes.value, FieldUpdate::Rewritten);
        assert_eq!(update.changes.description, FieldUpdate::Inserted);
        assert_eq!(update.changes.keywords, FieldUpdate::Rewritten);

        let doc = &update.document;
        assert!(doc.contains(r#"(property "Value" "10kΩ" (id 1)"#));
        assert!(doc.contains(
            r#"(property "Description" "10kΩ ±1% 1/8W 0805 Thick Film Resistors" (id 6) (at 0 0 0)"#
        ));
        assert!(doc.contains(r#"(property "ki_keywords" "C17414 UNI-ROYAL 0805W8F1002T5E""#));
    }

    #[test]
    fn description_inserted_right_after_datasheet() {
        let update = update_block(RESISTOR, "C17414", Some(&resistor_details()));
        let datasheet = update.document.find("(property \"Datasheet\"").unwrap();
        let description = update.document.find("(property \"Description\"").unwrap();
        let lcsc = update.document.find("(property \"LCSC\"").unwrap();
        assert!(datasheet < description && description < lcsc);
        assert!(update
            .document
            .contains("\n    (property \"Description\""));
    }

    #[test]
    fn second_update_changes_nothing() {
        let first = update_block(RESISTOR, "C17414", Some(&resistor_details()));
        let second = update_block(&first.document, "C17414", Some(&resistor_details()));
        assert!(first.changed());
        assert!(second.found);
        assert!(!second.changed());
        assert_eq!(second.document, first.document);
    }

    #[test]
    fn existing_description_replaced() {
        let doc = RESISTOR.replace(
            "    (property \"LCSC\"",
            "    (property \"Description\" \"old\" (id 9) (at 0 0 0))\n    (property \"LCSC\"",
        );
        let update = update_block(&doc, "C17414", Some(&resistor_details()));
        assert_eq!(update.changes.description, FieldUpdate::Rewritten);
        assert!(!update.document.contains("\"old\""));
        assert_eq!(update.document.matches("(property \"Description\"").count(), 1);
    }

    #[test]
    fn missing_datasheet_is_unsupported() {
        let doc = r#"(lib
  (symbol "ABCDEFGH"
    (property "Value" "10k" (id 1))
    (property "LCSC" "C9" (id 4))
  )
)"#;
        let d = details(json!({ "productIntroEn": "Widget" }));
        let update = update_block(doc, "C9", Some(&d));
        assert_eq!(update.changes.description, FieldUpdate::Unsupported);
        assert!(!update.changed());
        assert_eq!(update.document, doc);
    }

    #[test]
    fn crlf_document_keeps_crlf_line_endings() {
        let doc = RESISTOR.replace('\n', "\r\n");
        let update = update_block(&doc, "C17414", Some(&resistor_details()));
        assert_eq!(update.changes.description, FieldUpdate::Inserted);
        assert_eq!(
            update.document.matches('\n').count(),
            update.document.matches("\r\n").count()
        );
        assert!(update
            .document
            .contains("\r\n    (property \"Description\""));
    }

    #[test]
    fn datasheet_without_ids_gets_description_without_id() {
        let doc = r#"(lib
  (symbol "ABCDEFGH"
    (property "Datasheet" "x (rev 2)" (at 0 0 0)
      (effects (font (size 1.27 1.27)) hide)
    )
    (property "LCSC" "C9")
  )
)"#;
        let d = details(json!({ "productIntroEn": "Widget" }));
        let update = update_block(doc, "C9", Some(&d));
        assert_eq!(update.changes.description, FieldUpdate::Inserted);
        assert!(update.document.contains(
            "    )\n    (property \"Description\" \"Widget\" (at 0 0 0)\n      (effects (font (size 1.27 1.27)) hide)\n    )\n    (property \"LCSC\""
        ));
    }

    #[test]
    fn cleaned_value_is_not_clobbered() {
        let doc = RESISTOR.replace(
            "(property \"Value\" \"0805W8F1002T5E\"",
            "(property \"Value\" \"10k\"",
        );
        let update = update_block(&doc, "C17414", Some(&resistor_details()));
        assert_eq!(update.changes.value, FieldUpdate::Untouched);
        assert!(update.document.contains("(property \"Value\" \"10k\""));
    }

    #[test]
    fn curated_keywords_are_kept() {
        let doc = RESISTOR.replace("\"ki_keywords\" \"C17414\"", "\"ki_keywords\" \"pullup 10k\"");
        let update = update_block(&doc, "C17414", Some(&resistor_details()));
        assert_eq!(update.changes.keywords, FieldUpdate::Untouched);
        assert!(update.document.contains("\"pullup 10k\""));
    }

    #[test]
    fn other_blocks_untouched() {
        let other = "\n  (symbol \"OTHER123456\"\n    (property \"Value\" \"OTHER123456\")\n    (property \"LCSC\" \"C2\")\n  )";
        let doc = RESISTOR.replacen("\n  (symbol \"0805W8F1002T5E\"", &format!("{other}\n  (symbol \"0805W8F1002T5E\""), 1);
        let update = update_block(&doc, "C17414", Some(&resistor_details()));
        assert!(update.changed());

        let before = Document::parse(doc.as_str());
        let after = Document::parse(update.document.as_str());
        assert_eq!(before.header(), after.header());
        for (b, a) in before.blocks().zip(after.blocks()) {
            if b.external_id().as_deref() != Some("C17414") {
                assert_eq!(b.text(), a.text());
            }
        }
    }

    #[test]
    fn remove_whole_symbol_with_units() {
        let (updated, removed) = remove_block(RESISTOR, "C17414").unwrap();
        assert_eq!(removed.name, "0805W8F1002T5E");
        assert_eq!(
            updated,
            "(kicad_symbol_lib (version 20210201) (generator kicad-jlc-manager)\n)\n"
        );
        assert!(remove_block(&updated, "C17414").is_none());
    }

    #[test]
    fn backup_path_appends_suffix() {
        assert_eq!(
            backup_path(Path::new("lib/symbol/jlc_project.kicad_sym")),
            PathBuf::from("lib/symbol/jlc_project.kicad_sym.bak")
        );
    }
}
