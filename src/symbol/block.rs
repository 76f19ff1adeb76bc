//! Document and block model for `.kicad_sym` text.
//!
//! A [`Document`] is the full text of a symbol library split into a header
//! (everything before the first symbol declaration) and an ordered sequence
//! of [`Block`]s. A block starts wherever the text matches optional
//! whitespace, `(symbol` and a quoted name, and runs up to the next such
//! match. Nested unit symbols (`NAME_0_1`) therefore become blocks of their
//! own, and the closing parentheses of a parent symbol land at the end of
//! its last unit block.
//!
//! # Known limitation
//!
//! Splitting is a textual heuristic. A quoted string that itself contains
//! `(symbol "` would start a spurious block. Generator output never does
//! this, but the file is not validated against it.

use std::ops::Range;
use std::sync::OnceLock;

use regex::Regex;

/// Placeholder KiCad uses for a literal `/` inside symbol names and values.
pub const SLASH_TOKEN: &str = "{slash}";

fn block_start_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"\s*\(symbol\s+""#).expect("block start pattern is valid"))
}

fn block_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"\(symbol\s+"((?:[^"\\]|\\.)*)""#).expect("block name pattern is valid")
    })
}

fn sub_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^.+_\d+_\d+$").expect("sub-block pattern is valid"))
}

/// Symbol properties the manager reads or rewrites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Property {
    /// Supplier part number (`LCSC`), the reconciliation key.
    Lcsc,
    /// Displayed value (`Value`).
    Value,
    /// Free-text description (`Description`).
    Description,
    /// Datasheet URL (`Datasheet`).
    Datasheet,
    /// Search keywords (`ki_keywords`).
    Keywords,
    /// Footprint reference (`Footprint`), `library:name`.
    Footprint,
}

impl Property {
    const ALL: [Self; 6] = [
        Self::Lcsc,
        Self::Value,
        Self::Description,
        Self::Datasheet,
        Self::Keywords,
        Self::Footprint,
    ];

    /// Property key as written in the file.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Lcsc => "LCSC",
            Self::Value => "Value",
            Self::Description => "Description",
            Self::Datasheet => "Datasheet",
            Self::Keywords => "ki_keywords",
            Self::Footprint => "Footprint",
        }
    }

    const fn index(self) -> usize {
        match self {
            Self::Lcsc => 0,
            Self::Value => 1,
            Self::Description => 2,
            Self::Datasheet => 3,
            Self::Keywords => 4,
            Self::Footprint => 5,
        }
    }

    /// Pattern matching `(property "<key>" "<value>"`, value in group 1.
    pub(crate) fn pattern(self) -> &'static Regex {
        static PATTERNS: OnceLock<[Regex; 6]> = OnceLock::new();
        let patterns = PATTERNS.get_or_init(|| {
            Self::ALL.map(|property| {
                Regex::new(&format!(
                    r#"\(property\s+"{}"\s+"((?:[^"\\]|\\.)*)""#,
                    regex::escape(property.key())
                ))
                .expect("property pattern is valid")
            })
        });
        &patterns[self.index()]
    }
}

/// Location of a property inside a block's text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyMatch {
    /// Offset of the `(` opening the property list.
    pub open: usize,
    /// Span of the raw (still escaped) value between its quotes.
    pub value: Range<usize>,
}

/// Decodes a raw quoted value: `{slash}` becomes `/` and backslash escapes
/// are resolved.
///
/// Values written back by this crate use literal slashes; they are never
/// re-encoded to `{slash}`.
#[must_use]
pub fn decode_value(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        } else {
            out.push(ch);
        }
    }
    out.replace(SLASH_TOKEN, "/")
}

/// Escapes a value for placement between double quotes.
#[must_use]
pub fn encode_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Returns `true` if `name` is a nested unit symbol (`PARENT_<n>_<m>`).
///
/// Such blocks are pin/unit variants of their parent and never count as
/// components on their own.
#[must_use]
pub fn is_sub_block_name(name: &str) -> bool {
    name.contains('_') && sub_block_re().is_match(name)
}

/// Decoded name of the first symbol declared in `text`.
#[must_use]
pub fn declared_name(text: &str) -> Option<String> {
    block_name_re()
        .captures(text)
        .map(|caps| decode_value(&caps[1]))
}

/// Every symbol declaration in `text`: offset of its `(` and decoded name.
pub(crate) fn declarations(text: &str) -> impl Iterator<Item = (usize, String)> + '_ {
    block_name_re().captures_iter(text).filter_map(|caps| {
        let whole = caps.get(0)?;
        Some((whole.start(), decode_value(&caps[1])))
    })
}

/// A full symbol library text, split into header and blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    text: String,
    starts: Vec<usize>,
}

impl Document {
    /// Splits `text` into header and blocks.
    #[must_use]
    pub fn parse(text: impl Into<String>) -> Self {
        let text = text.into();
        let starts = block_start_re()
            .find_iter(&text)
            .map(|m| m.start())
            .collect();
        Self { text, starts }
    }

    /// Full document text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Text before the first block.
    #[must_use]
    pub fn header(&self) -> &str {
        let end = self.starts.first().copied().unwrap_or(self.text.len());
        &self.text[..end]
    }

    /// Number of blocks, unit blocks included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.starts.len()
    }

    /// Returns `true` if the document has no blocks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.starts.is_empty()
    }

    /// Blocks in document order.
    pub fn blocks(&self) -> impl Iterator<Item = Block<'_>> + '_ {
        self.starts.iter().enumerate().map(|(i, &start)| {
            let end = self.starts.get(i + 1).copied().unwrap_or(self.text.len());
            Block {
                text: &self.text[start..end],
                span: start..end,
            }
        })
    }

    /// First top-level block whose `LCSC` property equals `external_id`.
    #[must_use]
    pub fn find_component(&self, external_id: &str) -> Option<Block<'_>> {
        self.blocks()
            .filter(|block| !block.is_sub_block())
            .find(|block| block.external_id().as_deref() == Some(external_id))
    }
}

/// One block of a [`Document`]: a borrowed text span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block<'a> {
    text: &'a str,
    span: Range<usize>,
}

impl<'a> Block<'a> {
    /// Raw block text, leading whitespace included.
    #[must_use]
    pub const fn text(&self) -> &'a str {
        self.text
    }

    /// Byte range of this block within the document.
    #[must_use]
    pub fn span(&self) -> Range<usize> {
        self.span.clone()
    }

    /// Offset of the block's opening `(symbol` within [`Self::text`].
    #[must_use]
    pub fn open_offset(&self) -> usize {
        self.text.len() - self.text.trim_start().len()
    }

    /// Decoded symbol name, or `None` if the declaration cannot be parsed.
    #[must_use]
    pub fn name(&self) -> Option<String> {
        declared_name(self.text)
    }

    /// Returns `true` for nested unit blocks. Unnamed blocks are not sub-blocks.
    #[must_use]
    pub fn is_sub_block(&self) -> bool {
        self.name().is_some_and(|name| is_sub_block_name(&name))
    }

    /// Locates the first occurrence of `property` in this block.
    #[must_use]
    pub fn find_property(&self, property: Property) -> Option<PropertyMatch> {
        property.pattern().captures(self.text).map(|caps| {
            let whole = caps.get(0).map_or(0..0, |m| m.range());
            let value = caps.get(1).map_or(whole.end..whole.end, |m| m.range());
            PropertyMatch {
                open: whole.start,
                value,
            }
        })
    }

    /// Decoded value of `property`, if present.
    #[must_use]
    pub fn property(&self, property: Property) -> Option<String> {
        self.find_property(property)
            .map(|found| decode_value(&self.text[found.value]))
    }

    /// Supplier part number (`LCSC` property).
    #[must_use]
    pub fn external_id(&self) -> Option<String> {
        self.property(Property::Lcsc).filter(|id| !id.is_empty())
    }

    /// `Value` property, falling back to the block name.
    #[must_use]
    pub fn value_field(&self) -> Option<String> {
        self.property(Property::Value).or_else(|| self.name())
    }

    /// `Description` property, empty when absent.
    #[must_use]
    pub fn description_field(&self) -> String {
        self.property(Property::Description).unwrap_or_default()
    }
}
