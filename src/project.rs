//! KiCad project discovery and library layout.
//!
//! A project is any directory holding a `*.kicad_pro` file. The managed
//! library lives below it:
//!
//! ```text
//! <project>/
//! ├── jlcproject.toml
//! └── <lib-dir>/
//!     ├── symbol/<symbol_lib>.kicad_sym
//!     ├── footprint/*.kicad_mod
//!     └── 3dmodels/
//! ```

use std::path::{Path, PathBuf};

use crate::error::ProjectError;
use crate::symbol::EMPTY_LIBRARY;

/// Extension of KiCad project files.
pub const PROJECT_EXTENSION: &str = "kicad_pro";

/// A KiCad project directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KicadProject {
    root: PathBuf,
    project_file: PathBuf,
}

impl KicadProject {
    /// Opens `dir` as a project if it directly contains a `*.kicad_pro` file.
    ///
    /// With several project files the alphabetically first one names the
    /// project.
    #[must_use]
    pub fn open(dir: &Path) -> Option<Self> {
        let pattern = format!(
            "{}/*.{PROJECT_EXTENSION}",
            glob::Pattern::escape(&dir.to_string_lossy())
        );
        let project_file = glob::glob(&pattern)
            .ok()?
            .filter_map(Result::ok)
            .filter(|p| p.is_file())
            .min()?;

        Some(Self {
            root: dir.to_path_buf(),
            project_file,
        })
    }

    /// Project root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The `*.kicad_pro` file.
    #[must_use]
    pub fn project_file(&self) -> &Path {
        &self.project_file
    }

    /// Project name: the project file stem.
    #[must_use]
    pub fn name(&self) -> String {
        self.project_file
            .file_stem()
            .map_or_else(|| "unknown".to_string(), |s| s.to_string_lossy().into_owned())
    }
}

/// Searches `start` and then each parent directory for a KiCad project.
///
/// # Errors
///
/// Returns an error if `start` cannot be resolved or no project is found.
pub fn find_kicad_project(start: &Path) -> Result<KicadProject, ProjectError> {
    let start = start
        .canonicalize()
        .map_err(|e| ProjectError::io(start, e))?;

    let project = start.ancestors().find_map(KicadProject::open);
    match project {
        Some(project) => {
            tracing::debug!(root = %project.root.display(), name = %project.name(), "Found KiCad project");
            Ok(project)
        }
        None => Err(ProjectError::NotFound { start }),
    }
}

/// Paths of the managed library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryPaths {
    /// Library root directory.
    pub lib_dir: PathBuf,
    /// Shared symbol library file.
    pub symbol_lib: PathBuf,
    /// Footprint directory (`.pretty`-style, one file per footprint).
    pub footprint_dir: PathBuf,
    /// 3D model directory.
    pub model_dir: PathBuf,
}

impl LibraryPaths {
    /// Layout rooted at `lib_dir`.
    #[must_use]
    pub fn new(lib_dir: PathBuf, symbol_lib: &str) -> Self {
        Self {
            symbol_lib: lib_dir
                .join("symbol")
                .join(format!("{symbol_lib}.kicad_sym")),
            footprint_dir: lib_dir.join("footprint"),
            model_dir: lib_dir.join("3dmodels"),
            lib_dir,
        }
    }

    /// Creates the directories and an empty symbol library where missing.
    /// Existing files are left alone.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory or the symbol library cannot be
    /// created.
    pub fn ensure(&self) -> Result<(), ProjectError> {
        let symbol_dir = self
            .symbol_lib
            .parent()
            .map_or_else(|| self.lib_dir.join("symbol"), Path::to_path_buf);

        for dir in [&symbol_dir, &self.footprint_dir, &self.model_dir] {
            std::fs::create_dir_all(dir).map_err(|e| ProjectError::io(dir, e))?;
        }

        if !self.symbol_lib.exists() {
            std::fs::write(&self.symbol_lib, EMPTY_LIBRARY)
                .map_err(|e| ProjectError::io(&self.symbol_lib, e))?;
            tracing::info!(path = %self.symbol_lib.display(), "Created empty symbol library");
        }

        Ok(())
    }

    /// Deletes the whole library directory, if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory exists but cannot be removed.
    pub fn clean(&self) -> Result<(), ProjectError> {
        match std::fs::remove_dir_all(&self.lib_dir) {
            Ok(()) => {
                tracing::info!(path = %self.lib_dir.display(), "Removed library directory");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ProjectError::io(&self.lib_dir, e)),
        }
    }

    /// Footprint file for a `library:name` footprint reference.
    ///
    /// Returns `None` for empty names or names that would leave the
    /// footprint directory.
    #[must_use]
    pub fn footprint_file(&self, footprint: &str) -> Option<PathBuf> {
        let name = footprint
            .rsplit_once(':')
            .map_or(footprint, |(_, name)| name)
            .trim();
        if name.is_empty() || name.contains(['/', '\\']) || name == ".." {
            return None;
        }
        Some(self.footprint_dir.join(format!("{name}.kicad_mod")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_paths() {
        let paths = LibraryPaths::new(PathBuf::from("/p/jlclib"), "jlc_project");
        assert_eq!(
            paths.symbol_lib,
            PathBuf::from("/p/jlclib/symbol/jlc_project.kicad_sym")
        );
        assert_eq!(paths.footprint_dir, PathBuf::from("/p/jlclib/footprint"));
        assert_eq!(paths.model_dir, PathBuf::from("/p/jlclib/3dmodels"));
    }

    #[test]
    fn footprint_reference_to_file() {
        let paths = LibraryPaths::new(PathBuf::from("lib"), "jlc_project");
        assert_eq!(
            paths.footprint_file("JLC_Project:SOT-23-3_L2.9-W1.3-P1.90-LS2.4-BR"),
            Some(PathBuf::from(
                "lib/footprint/SOT-23-3_L2.9-W1.3-P1.90-LS2.4-BR.kicad_mod"
            ))
        );
        assert_eq!(
            paths.footprint_file("R0805"),
            Some(PathBuf::from("lib/footprint/R0805.kicad_mod"))
        );
        assert_eq!(paths.footprint_file("lib:"), None);
        assert_eq!(paths.footprint_file("lib:../../etc"), None);
    }

    #[test]
    fn ensure_creates_layout_once() {
        let dir = tempfile::tempdir().unwrap();
        let paths = LibraryPaths::new(dir.path().join("jlclib"), "jlc_project");
        paths.ensure().unwrap();
        assert!(paths.footprint_dir.is_dir());
        assert!(paths.model_dir.is_dir());
        assert_eq!(
            std::fs::read_to_string(&paths.symbol_lib).unwrap(),
            EMPTY_LIBRARY
        );

        std::fs::write(&paths.symbol_lib, "(kicad_symbol_lib)").unwrap();
        paths.ensure().unwrap();
        assert_eq!(
            std::fs::read_to_string(&paths.symbol_lib).unwrap(),
            "(kicad_symbol_lib)"
        );
    }

    #[test]
    fn clean_missing_directory_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let paths = LibraryPaths::new(dir.path().join("jlclib"), "jlc_project");
        paths.clean().unwrap();
        paths.ensure().unwrap();
        paths.clean().unwrap();
        assert!(!paths.lib_dir.exists());
    }

    #[test]
    fn finds_project_in_parent() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("board.kicad_pro"), "{}").unwrap();
        let nested = dir.path().join("docs").join("notes");
        std::fs::create_dir_all(&nested).unwrap();

        let project = find_kicad_project(&nested).unwrap();
        assert_eq!(project.name(), "board");
        assert_eq!(project.root(), dir.path().canonicalize().unwrap());
        assert!(project.project_file().ends_with("board.kicad_pro"));
    }

    #[test]
    fn directory_without_project_is_not_a_project() {
        let dir = tempfile::tempdir().unwrap();
        assert!(KicadProject::open(dir.path()).is_none());
    }
}
