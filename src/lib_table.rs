//! KiCad library table registration and `.gitignore` upkeep.
//!
//! KiCad finds project-local libraries through `sym-lib-table` and
//! `fp-lib-table` in the project root. Entries use `${KIPRJMOD}` so the
//! project can be moved.

use std::io;
use std::path::Path;

use crate::error::ProjectError;

/// Comment line written above the ignored library directory.
pub const GITIGNORE_COMMENT: &str = "# JLC component libraries (generated)";

/// Which library table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    /// `sym-lib-table`
    Symbol,
    /// `fp-lib-table`
    Footprint,
}

impl TableKind {
    /// Table file name in the project root.
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Symbol => "sym-lib-table",
            Self::Footprint => "fp-lib-table",
        }
    }

    const fn root_token(self) -> &'static str {
        match self {
            Self::Symbol => "sym_lib_table",
            Self::Footprint => "fp_lib_table",
        }
    }

    const fn description(self) -> &'static str {
        match self {
            Self::Symbol => "Project-local JLC components",
            Self::Footprint => "Project-local JLC component footprints",
        }
    }
}

/// `${KIPRJMOD}`-relative URI of the symbol library.
#[must_use]
pub fn symbol_uri(lib_dir: &str, symbol_lib: &str) -> String {
    format!("${{KIPRJMOD}}/{lib_dir}/symbol/{symbol_lib}.kicad_sym")
}

/// `${KIPRJMOD}`-relative URI of the footprint directory.
#[must_use]
pub fn footprint_uri(lib_dir: &str) -> String {
    format!("${{KIPRJMOD}}/{lib_dir}/footprint")
}

/// One `(lib ...)` table entry.
#[must_use]
pub fn table_entry(kind: TableKind, name: &str, uri: &str) -> String {
    format!(
        "(lib (name \"{name}\")(type \"KiCad\")(uri \"{uri}\")(options \"\")(descr \"{}\"))",
        kind.description()
    )
}

fn new_table(kind: TableKind, name: &str, uri: &str) -> String {
    format!(
        "({}\n  (version 7)\n  {}\n)\n",
        kind.root_token(),
        table_entry(kind, name, uri)
    )
}

/// Returns the table text with `name` registered, or `None` if it already
/// is.
///
/// A missing table is created. A new entry goes before the final `)`; a
/// table without one is rewritten from scratch.
#[must_use]
pub fn with_library(existing: Option<&str>, kind: TableKind, name: &str, uri: &str) -> Option<String> {
    let Some(content) = existing else {
        return Some(new_table(kind, name, uri));
    };

    if content.contains(&format!("(name \"{name}\")")) {
        return None;
    }

    match content.rfind(')') {
        Some(close) => {
            let mut updated = String::with_capacity(content.len() + 128);
            updated.push_str(&content[..close]);
            if !updated.ends_with('\n') {
                updated.push('\n');
            }
            updated.push_str("  ");
            updated.push_str(&table_entry(kind, name, uri));
            updated.push('\n');
            updated.push_str(&content[close..]);
            Some(updated)
        }
        None => Some(new_table(kind, name, uri)),
    }
}

/// Registers `name` in the `kind` table of the project at `root`.
///
/// Returns `true` if the table was written.
///
/// # Errors
///
/// Returns an error if the table cannot be read or written.
pub fn register_library(
    root: &Path,
    kind: TableKind,
    name: &str,
    uri: &str,
) -> Result<bool, ProjectError> {
    let path = root.join(kind.file_name());
    let existing = match std::fs::read_to_string(&path) {
        Ok(text) => Some(text),
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) => return Err(ProjectError::io(path, e)),
    };

    let Some(updated) = with_library(existing.as_deref(), kind, name, uri) else {
        tracing::debug!(table = kind.file_name(), name, "Library already registered");
        return Ok(false);
    };

    std::fs::write(&path, updated).map_err(|e| ProjectError::io(&path, e))?;
    tracing::info!(table = kind.file_name(), name, uri, "Registered library");
    Ok(true)
}

/// Returns the `.gitignore` text with `lib_dir` ignored, or `None` if it
/// already is.
#[must_use]
pub fn with_ignored_dir(existing: &str, lib_dir: &str) -> Option<String> {
    let entry = format!("{}/", lib_dir.trim_end_matches('/'));
    let bare = entry.trim_end_matches('/');
    if existing
        .lines()
        .map(str::trim)
        .any(|line| line == entry || line == bare)
    {
        return None;
    }

    let mut lines: Vec<&str> = existing.lines().collect();
    if lines.last().is_some_and(|line| !line.is_empty()) {
        lines.push("");
    }
    lines.push(GITIGNORE_COMMENT);
    lines.push(&entry);
    Some(lines.join("\n") + "\n")
}

/// Makes sure the project's `.gitignore` ignores the library directory.
///
/// Returns `true` if the file was written.
///
/// # Errors
///
/// Returns an error if `.gitignore` cannot be read or written.
pub fn ensure_gitignore(root: &Path, lib_dir: &str) -> Result<bool, ProjectError> {
    let path = root.join(".gitignore");
    let existing = match std::fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(ProjectError::io(path, e)),
    };

    let Some(updated) = with_ignored_dir(&existing, lib_dir) else {
        return Ok(false);
    };
    std::fs::write(&path, updated).map_err(|e| ProjectError::io(&path, e))?;
    tracing::info!(lib_dir, "Added library directory to .gitignore");
    Ok(true)
}
