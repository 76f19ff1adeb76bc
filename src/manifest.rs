//! Project manifest (`jlcproject.toml`).
//!
//! The manifest is the declarative source of truth: the ordered list of
//! parts the project wants, each with an optional one-line comment, plus the
//! library location.
//!
//! ```toml
//! components = [
//!     "C194349",  # Buck Converter IC
//!     "C23107",
//! ]
//!
//! [project]
//! lib-dir = "jlclib"
//! lib-name = "JLC_Project"
//! ```
//!
//! TOML parsers drop comments, so the per-part comments are recovered with a
//! line scan over the `components` array. The older table form
//! (`[components]` with `id = "comment"` pairs) is accepted on load and
//! rewritten as an array on save.

use std::fmt::Write as _;
use std::io;
use std::path::{Component, Path};
use std::sync::OnceLock;

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ManifestError;

/// Manifest file name, in the project root.
pub const MANIFEST_FILE: &str = "jlcproject.toml";

/// Default library directory, relative to the project root.
pub const DEFAULT_LIB_DIR: &str = "jlclib";

/// Default library name as registered in the KiCad library tables.
pub const DEFAULT_LIB_NAME: &str = "JLC_Project";

fn commented_entry_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"^\s*"((?:[^"\\]|\\.)*)"\s*,?\s*#\s?(.*)$"#)
            .expect("manifest comment pattern is valid")
    })
}

/// `[project]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ProjectSettings {
    /// Library directory, relative to the project root.
    #[serde(default = "default_lib_dir")]
    pub lib_dir: String,

    /// Library name used in `sym-lib-table` and `fp-lib-table`.
    #[serde(default = "default_lib_name")]
    pub lib_name: String,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            lib_dir: default_lib_dir(),
            lib_name: default_lib_name(),
        }
    }
}

impl ProjectSettings {
    /// Validates the settings.
    ///
    /// The library directory is deleted on a clean sync, so it must be a
    /// relative path that stays inside the project.
    ///
    /// # Errors
    ///
    /// Returns an error if a setting is empty or the library directory is
    /// absolute or escapes the project.
    pub fn validate(&self) -> Result<(), ManifestError> {
        let lib_dir = Path::new(&self.lib_dir);
        let inside = lib_dir
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
            && lib_dir.components().any(|c| matches!(c, Component::Normal(_)));
        if !inside {
            return Err(ManifestError::Invalid {
                message: format!(
                    "lib-dir '{}' must be a relative directory inside the project",
                    self.lib_dir
                ),
            });
        }

        if self.lib_name.trim().is_empty() || self.lib_name.contains('"') {
            return Err(ManifestError::Invalid {
                message: format!("lib-name '{}' is not a usable library name", self.lib_name),
            });
        }

        Ok(())
    }
}

fn default_lib_dir() -> String {
    DEFAULT_LIB_DIR.to_string()
}

fn default_lib_name() -> String {
    DEFAULT_LIB_NAME.to_string()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawComponents {
    List(Vec<String>),
    Table(IndexMap<String, String>),
}

#[derive(Deserialize)]
struct RawManifest {
    #[serde(default)]
    components: Option<RawComponents>,
    #[serde(default)]
    project: ProjectSettings,
}

/// Parsed project manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    components: IndexMap<String, String>,
    /// Library location settings.
    pub project: ProjectSettings,
}

impl Manifest {
    /// Creates an empty manifest with the given settings.
    #[must_use]
    pub fn new(project: ProjectSettings) -> Self {
        Self {
            components: IndexMap::new(),
            project,
        }
    }

    /// Parses manifest text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML or has the wrong shape.
    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        let raw: RawManifest = toml::from_str(text)?;

        let components = match raw.components {
            None => IndexMap::new(),
            Some(RawComponents::Table(table)) => table,
            Some(RawComponents::List(ids)) => {
                let comments: IndexMap<String, String> = text
                    .lines()
                    .filter_map(|line| commented_entry_re().captures(line))
                    .map(|caps| (caps[1].to_string(), caps[2].trim().to_string()))
                    .collect();
                ids.into_iter()
                    .map(|id| {
                        let comment = comments.get(&id).cloned().unwrap_or_default();
                        (id, comment)
                    })
                    .collect()
            }
        };

        Ok(Self {
            components,
            project: raw.project,
        })
    }

    /// Loads the manifest at `path`. A missing file loads as the default
    /// manifest.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or
    /// its `[project]` settings are invalid.
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No manifest, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ManifestError::Read {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };

        let manifest = Self::parse(&text).map_err(|e| ManifestError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        manifest.project.validate()?;
        Ok(manifest)
    }

    /// Writes the manifest to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), ManifestError> {
        std::fs::write(path, self.to_toml_string()).map_err(|e| ManifestError::Write {
            path: path.to_path_buf(),
            source: e,
        })?;
        tracing::debug!(path = %path.display(), components = self.len(), "Saved manifest");
        Ok(())
    }

    /// Renders the manifest: components array first, then `[project]`.
    #[must_use]
    pub fn to_toml_string(&self) -> String {
        let mut out = String::from("components = [\n");
        for (id, comment) in &self.components {
            let id = quote(id);
            let comment = comment.replace(['\r', '\n'], " ");
            let comment = comment.trim();
            if comment.is_empty() {
                let _ = writeln!(out, "    {id},");
            } else {
                let _ = writeln!(out, "    {id},  # {comment}");
            }
        }
        out.push_str("]\n\n[project]\n");
        let _ = writeln!(out, "lib-dir = {}", quote(&self.project.lib_dir));
        let _ = writeln!(out, "lib-name = {}", quote(&self.project.lib_name));
        out
    }

    /// Part ids in manifest order.
    pub fn ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.components.keys().map(String::as_str)
    }

    /// Part ids paired with their comments, in manifest order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.components
            .iter()
            .map(|(id, comment)| (id.as_str(), comment.as_str()))
    }

    /// Comment recorded for `id`, if it is listed.
    #[must_use]
    pub fn comment(&self, id: &str) -> Option<&str> {
        self.components.get(id).map(String::as_str)
    }

    /// Returns `true` if `id` is listed.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.components.contains_key(id)
    }

    /// Lists `id` with `comment`. An id already listed keeps its position and
    /// has its comment replaced. Returns `true` if the id was new.
    pub fn add(&mut self, id: &str, comment: &str) -> bool {
        self.components
            .insert(id.to_string(), comment.to_string())
            .is_none()
    }

    /// Unlists `id`, keeping the order of the rest. Returns `true` if it was
    /// listed.
    pub fn remove(&mut self, id: &str) -> bool {
        self.components.shift_remove(id).is_some()
    }

    /// Number of listed parts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Returns `true` if no parts are listed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

fn quote(value: &str) -> String {
    toml::Value::String(value.to_string()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"components = [
    "C194349",  # Buck Converter IC
    "C23107",
    "C17414",  # 10kΩ ±1% 1/8W 0805 Thick Film Resistors
]

[project]
lib-dir = "parts"
lib-name = "Board_Parts"
"#;

    #[test]
    fn parse_array_with_comments() {
        let manifest = Manifest::parse(MANIFEST).unwrap();
        assert_eq!(manifest.ids().collect::<Vec<_>>(), ["C194349", "C23107", "C17414"]);
        assert_eq!(manifest.comment("C194349"), Some("Buck Converter IC"));
        assert_eq!(manifest.comment("C23107"), Some(""));
        assert_eq!(
            manifest.comment("C17414"),
            Some("10kΩ ±1% 1/8W 0805 Thick Film Resistors")
        );
        assert_eq!(manifest.project.lib_dir, "parts");
        assert_eq!(manifest.project.lib_name, "Board_Parts");
    }

    #[test]
    fn render_matches_hand_written_layout() {
        let manifest = Manifest::parse(MANIFEST).unwrap();
        assert_eq!(manifest.to_toml_string(), MANIFEST);
    }

    #[test]
    fn parse_legacy_table() {
        let text = r#"[project]
lib-dir = "jlclib"

[components]
C1 = "first"
C2 = ""
"#;
        let manifest = Manifest::parse(text).unwrap();
        assert_eq!(manifest.len(), 2);
        assert_eq!(manifest.comment("C1"), Some("first"));
        assert_eq!(manifest.project.lib_name, DEFAULT_LIB_NAME);
    }

    #[test]
    fn empty_text_is_default() {
        let manifest = Manifest::parse("").unwrap();
        assert!(manifest.is_empty());
        assert_eq!(manifest.project, ProjectSettings::default());
    }

    #[test]
    fn add_keeps_position_and_replaces_comment() {
        let mut manifest = Manifest::parse(MANIFEST).unwrap();
        assert!(!manifest.add("C23107", "Resistor"));
        assert!(manifest.add("C5", ""));
        assert_eq!(
            manifest.ids().collect::<Vec<_>>(),
            ["C194349", "C23107", "C17414", "C5"]
        );
        assert_eq!(manifest.comment("C23107"), Some("Resistor"));
    }

    #[test]
    fn remove_keeps_order() {
        let mut manifest = Manifest::parse(MANIFEST).unwrap();
        assert!(manifest.remove("C194349"));
        assert!(!manifest.remove("C194349"));
        assert_eq!(manifest.ids().collect::<Vec<_>>(), ["C23107", "C17414"]);
    }

    #[test]
    fn comments_with_newlines_stay_on_one_line() {
        let mut manifest = Manifest::default();
        manifest.add("C1", "two\nlines");
        let reparsed = Manifest::parse(&manifest.to_toml_string()).unwrap();
        assert_eq!(reparsed.comment("C1"), Some("two lines"));
    }

    #[test]
    fn load_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = Manifest::load(&dir.path().join(MANIFEST_FILE)).unwrap();
        assert_eq!(manifest, Manifest::default());
    }

    #[test]
    fn load_invalid_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(MANIFEST_FILE);
        std::fs::write(&path, "components = [").unwrap();
        assert!(matches!(
            Manifest::load(&path),
            Err(ManifestError::Parse { .. })
        ));
    }

    #[test]
    fn settings_must_stay_inside_project() {
        let valid = ProjectSettings::default();
        assert!(valid.validate().is_ok());

        for lib_dir in ["", ".", "..", "../shared", "/abs/lib", "lib/../.."] {
            let settings = ProjectSettings {
                lib_dir: lib_dir.to_string(),
                ..ProjectSettings::default()
            };
            assert!(settings.validate().is_err(), "{lib_dir} should be rejected");
        }

        let nested = ProjectSettings {
            lib_dir: "libs/jlc".to_string(),
            ..ProjectSettings::default()
        };
        assert!(nested.validate().is_ok());
    }

    #[test]
    fn load_rejects_escaping_lib_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(MANIFEST_FILE);
        std::fs::write(&path, "components = []\n\n[project]\nlib-dir = \"..\"\n").unwrap();
        assert!(matches!(
            Manifest::load(&path),
            Err(ManifestError::Invalid { .. })
        ));
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(MANIFEST_FILE);
        let mut manifest = Manifest::default();
        manifest.add("C194349", "Buck Converter IC");
        manifest.save(&path).unwrap();
        assert_eq!(Manifest::load(&path).unwrap(), manifest);
    }
}
