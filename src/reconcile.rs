//! Manifest-driven reconciliation.
//!
//! The manifest says which parts should exist; the symbol library says which
//! do. [`Reconciler`] closes the gap by driving the external generator and
//! the symbol writer, one part at a time.
//!
//! Failure policy:
//!
//! - Generator and manifest errors abort the single part being processed.
//!   `sync` records the failure and carries on with the next part.
//! - Enrichment is best-effort. Missing supplier data or a broken write never
//!   fails a part; it is reported through [`EnrichOutcome`].
//! - A missing generator stops further generator runs in a `sync`, since every
//!   remaining part would fail the same way.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::error::{GeneratorError, ManifestError, ProjectError};
use crate::generator::Generator;
use crate::lib_table::{ensure_gitignore, footprint_uri, register_library, symbol_uri, TableKind};
use crate::manifest::{Manifest, ProjectSettings, MANIFEST_FILE};
use crate::project::LibraryPaths;
use crate::supplier::DetailsSource;
use crate::symbol::{
    enrich_symbol_file, extract_id_to_name, installed_ids, installed_records, read_document,
    remove_symbol_file, EnrichOutcome, RemovedSymbol, SymbolError,
};

/// Public part page, shown in detailed listings.
pub const PART_URL_PREFIX: &str = "https://jlcpcb.com/partdetail/";

/// Errors that abort a reconciliation step.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Manifest could not be read, parsed or written.
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// Library layout or table files could not be written.
    #[error(transparent)]
    Project(#[from] ProjectError),

    /// The generator failed for the part being processed.
    #[error(transparent)]
    Generator(#[from] GeneratorError),

    /// The symbol library could not be rewritten during removal.
    #[error(transparent)]
    Symbol(#[from] SymbolError),
}

/// Result of [`Reconciler::add`].
#[derive(Debug)]
pub struct AddReport {
    /// Part that was added.
    pub external_id: String,
    /// `false` if the part was already in the manifest.
    pub newly_listed: bool,
    /// Comment recorded in the manifest.
    pub comment: String,
    /// What enrichment did to the generated symbol.
    pub enrichment: EnrichOutcome,
}

/// Result of [`Reconciler::remove`].
#[derive(Debug, Default)]
pub struct RemoveReport {
    /// The part was listed in the manifest.
    pub unlisted: bool,
    /// The symbol removed from the library, if it was installed.
    pub symbol: Option<RemovedSymbol>,
    /// Footprint file deleted with it.
    pub footprint: Option<PathBuf>,
}

impl RemoveReport {
    /// Returns `true` if anything was removed.
    #[must_use]
    pub const fn removed_anything(&self) -> bool {
        self.unlisted || self.symbol.is_some()
    }
}

/// Options for [`Reconciler::sync`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    /// Delete the whole library directory and regenerate every part.
    pub clean: bool,
}

/// A part that failed during a sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncFailure {
    /// Part id.
    pub external_id: String,
    /// Human-readable reason.
    pub reason: String,
}

/// Tally of a [`Reconciler::sync`] run.
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Parts generated successfully, in manifest order.
    pub synced: Vec<String>,
    /// Parts whose generation failed.
    pub failed: Vec<SyncFailure>,
    /// Installed parts removed because the manifest no longer lists them.
    pub removed: Vec<String>,
    /// Parts whose symbol was rewritten with supplier data.
    pub enriched: Vec<String>,
}

impl SyncReport {
    /// Returns `true` if no part failed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Number of parts attempted.
    #[must_use]
    pub fn attempted(&self) -> usize {
        self.synced.len() + self.failed.len()
    }
}

/// An installed part the manifest does not list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtraPart {
    /// Part id.
    pub external_id: String,
    /// Owning symbol name, when it can be determined.
    pub symbol: Option<String>,
}

/// Difference between the manifest and the installed library.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncPlan {
    /// Listed but not installed, in manifest order.
    pub missing: Vec<String>,
    /// Installed but not listed, sorted by id.
    pub extra: Vec<ExtraPart>,
}

impl SyncPlan {
    /// Returns `true` if the library matches the manifest.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.extra.is_empty()
    }
}

/// One manifest entry joined with its installed symbol, for listing and
/// export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListedComponent {
    /// Part id.
    pub external_id: String,
    /// Manifest comment.
    pub comment: String,
    /// Whether a symbol for the part is installed.
    pub installed: bool,
    /// Symbol name, empty when not installed.
    pub part_number: String,
    /// Symbol `Value`, empty when not installed.
    pub value: String,
    /// Symbol `Description`, empty when not installed or absent.
    pub description: String,
    /// Public part page.
    pub url: String,
}

/// Drives a generator and a details source against one project.
#[derive(Debug)]
pub struct Reconciler<G, S> {
    root: PathBuf,
    symbol_lib: String,
    generator: G,
    source: S,
}

impl<G: Generator, S: DetailsSource> Reconciler<G, S> {
    /// Creates a reconciler for the project at `root`. `symbol_lib` is the
    /// stem of the symbol library file the generator writes.
    pub fn new(
        root: impl Into<PathBuf>,
        symbol_lib: impl Into<String>,
        generator: G,
        source: S,
    ) -> Self {
        Self {
            root: root.into(),
            symbol_lib: symbol_lib.into(),
            generator,
            source,
        }
    }

    /// Project root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the project manifest.
    #[must_use]
    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    /// Returns `true` once `init` (or `add`) has written a manifest.
    #[must_use]
    pub fn is_initialised(&self) -> bool {
        self.manifest_path().is_file()
    }

    /// Loads the manifest, or the default one when absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest exists but is unreadable or invalid.
    pub fn load_manifest(&self) -> Result<Manifest, ReconcileError> {
        Ok(Manifest::load(&self.manifest_path())?)
    }

    /// Library layout for `settings`.
    #[must_use]
    pub fn library_paths(&self, settings: &ProjectSettings) -> LibraryPaths {
        LibraryPaths::new(self.root.join(&settings.lib_dir), &self.symbol_lib)
    }

    fn prepare_library(&self, settings: &ProjectSettings) -> Result<LibraryPaths, ReconcileError> {
        let paths = self.library_paths(settings);
        paths.ensure()?;
        register_library(
            &self.root,
            TableKind::Symbol,
            &settings.lib_name,
            &symbol_uri(&settings.lib_dir, &self.symbol_lib),
        )?;
        register_library(
            &self.root,
            TableKind::Footprint,
            &settings.lib_name,
            &footprint_uri(&settings.lib_dir),
        )?;
        Ok(paths)
    }

    /// Sets up the project: `.gitignore` entry, library layout, library
    /// tables and the manifest. Overrides replace the manifest settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings are invalid or any file cannot be
    /// written.
    pub fn init(
        &self,
        lib_dir: Option<&str>,
        lib_name: Option<&str>,
    ) -> Result<ProjectSettings, ReconcileError> {
        let mut manifest = self.load_manifest()?;
        if let Some(lib_dir) = lib_dir {
            manifest.project.lib_dir = lib_dir.to_string();
        }
        if let Some(lib_name) = lib_name {
            manifest.project.lib_name = lib_name.to_string();
        }
        manifest.project.validate()?;

        ensure_gitignore(&self.root, &manifest.project.lib_dir)?;
        self.prepare_library(&manifest.project)?;
        manifest.save(&self.manifest_path())?;

        tracing::info!(
            lib_dir = %manifest.project.lib_dir,
            lib_name = %manifest.project.lib_name,
            "Project library initialised"
        );
        Ok(manifest.project)
    }

    async fn enrich_with(&self, paths: &LibraryPaths, external_id: &str) -> EnrichOutcome {
        let details = self.source.fetch_details(external_id).await;
        enrich_symbol_file(&paths.symbol_lib, external_id, details.as_ref())
    }

    /// Generates one part, enriches its symbol and lists it in the manifest.
    ///
    /// # Errors
    ///
    /// Returns an error if the generator fails or the manifest or library
    /// layout cannot be written. Enrichment problems are not errors.
    pub async fn add(&self, external_id: &str) -> Result<AddReport, ReconcileError> {
        let mut manifest = self.load_manifest()?;
        let paths = self.prepare_library(&manifest.project)?;

        self.generator.generate(external_id, &paths.lib_dir)?;

        let details = self.source.fetch_details(external_id).await;
        let enrichment = enrich_symbol_file(&paths.symbol_lib, external_id, details.as_ref());

        let comment = details
            .as_ref()
            .and_then(|d| d.summary())
            .or_else(|| manifest.comment(external_id).map(str::to_string))
            .unwrap_or_default();
        let newly_listed = manifest.add(external_id, &comment);
        manifest.save(&self.manifest_path())?;

        tracing::info!(external_id, newly_listed, enriched = enrichment.changed(), "Added component");
        Ok(AddReport {
            external_id: external_id.to_string(),
            newly_listed,
            comment,
            enrichment,
        })
    }

    /// Re-applies supplier data to an installed part without regenerating it.
    ///
    /// # Errors
    ///
    /// Returns an error only if the manifest cannot be loaded.
    pub async fn enrich(&self, external_id: &str) -> Result<EnrichOutcome, ReconcileError> {
        let manifest = self.load_manifest()?;
        let paths = self.library_paths(&manifest.project);
        Ok(self.enrich_with(&paths, external_id).await)
    }

    fn remove_installed(
        paths: &LibraryPaths,
        external_id: &str,
    ) -> Result<(Option<RemovedSymbol>, Option<PathBuf>), ReconcileError> {
        let Some(symbol) = remove_symbol_file(&paths.symbol_lib, external_id)? else {
            return Ok((None, None));
        };

        let footprint = match &symbol.footprint {
            Some(reference) if !symbol.footprint_shared => paths
                .footprint_file(reference)
                .and_then(delete_footprint),
            _ => None,
        };

        Ok((Some(symbol), footprint))
    }

    /// Unlists a part and removes its symbol and, when no other symbol uses
    /// it, its footprint.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest or symbol library cannot be
    /// rewritten.
    pub fn remove(&self, external_id: &str) -> Result<RemoveReport, ReconcileError> {
        let mut manifest = self.load_manifest()?;
        let paths = self.library_paths(&manifest.project);
        let (symbol, footprint) = Self::remove_installed(&paths, external_id)?;

        let unlisted = manifest.remove(external_id);
        if unlisted {
            manifest.save(&self.manifest_path())?;
        }

        tracing::info!(external_id, unlisted, installed = symbol.is_some(), "Removed component");
        Ok(RemoveReport {
            unlisted,
            symbol,
            footprint,
        })
    }

    /// Compares the manifest with the installed library.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest cannot be loaded.
    pub fn plan(&self) -> Result<SyncPlan, ReconcileError> {
        let manifest = self.load_manifest()?;
        let paths = self.library_paths(&manifest.project);
        Ok(plan_for(&manifest, &paths.symbol_lib))
    }

    /// Manifest entries joined with their installed symbols.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest cannot be loaded.
    pub fn list(&self) -> Result<Vec<ListedComponent>, ReconcileError> {
        let manifest = self.load_manifest()?;
        let paths = self.library_paths(&manifest.project);
        let records = installed_records(&paths.symbol_lib);

        Ok(manifest
            .entries()
            .map(|(id, comment)| {
                let record = records.get(id);
                ListedComponent {
                    external_id: id.to_string(),
                    comment: comment.to_string(),
                    installed: record.is_some(),
                    part_number: record.map(|r| r.part_number.clone()).unwrap_or_default(),
                    value: record.map(|r| r.value.clone()).unwrap_or_default(),
                    description: record.map(|r| r.description.clone()).unwrap_or_default(),
                    url: format!("{PART_URL_PREFIX}{id}"),
                }
            })
            .collect())
    }

    /// Brings the library in line with the manifest.
    ///
    /// Parts the manifest no longer lists are removed (unless `clean`
    /// already wiped the library), then every listed part is generated and
    /// enriched in manifest order. A failing part is recorded and the loop
    /// moves on.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest cannot be loaded or the library
    /// layout cannot be prepared. Per-part failures are in the report.
    pub async fn sync(&self, options: SyncOptions) -> Result<SyncReport, ReconcileError> {
        let manifest = self.load_manifest()?;
        let mut report = SyncReport::default();

        if options.clean {
            self.library_paths(&manifest.project).clean()?;
        }
        let paths = self.prepare_library(&manifest.project)?;

        if !options.clean {
            for extra in plan_for(&manifest, &paths.symbol_lib).extra {
                match Self::remove_installed(&paths, &extra.external_id) {
                    Ok((Some(_), _)) => report.removed.push(extra.external_id),
                    Ok((None, _)) => {
                        tracing::debug!(external_id = %extra.external_id, "Unlisted id has no removable symbol");
                    }
                    Err(e) => {
                        tracing::warn!(external_id = %extra.external_id, error = %e, "Could not remove unlisted part");
                    }
                }
            }
        }

        let mut generator_missing: Option<String> = None;
        for external_id in manifest.ids() {
            if let Some(reason) = &generator_missing {
                report.failed.push(SyncFailure {
                    external_id: external_id.to_string(),
                    reason: reason.clone(),
                });
                continue;
            }

            match self.generator.generate(external_id, &paths.lib_dir) {
                Ok(()) => {
                    if self.enrich_with(&paths, external_id).await.changed() {
                        report.enriched.push(external_id.to_string());
                    }
                    report.synced.push(external_id.to_string());
                }
                Err(e) => {
                    tracing::warn!(external_id, error = %e, "Failed to sync component");
                    if matches!(e, GeneratorError::NotInstalled { .. }) {
                        generator_missing = Some(e.to_string());
                    }
                    report.failed.push(SyncFailure {
                        external_id: external_id.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            synced = report.synced.len(),
            failed = report.failed.len(),
            removed = report.removed.len(),
            "Sync finished"
        );
        Ok(report)
    }
}

fn delete_footprint(file: PathBuf) -> Option<PathBuf> {
    match std::fs::remove_file(&file) {
        Ok(()) => {
            tracing::debug!(path = %file.display(), "Deleted footprint");
            Some(file)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => {
            tracing::warn!(path = %file.display(), error = %e, "Could not delete footprint");
            None
        }
    }
}

fn plan_for(manifest: &Manifest, symbol_lib: &Path) -> SyncPlan {
    let installed = installed_ids(symbol_lib);
    let listed: BTreeSet<&str> = manifest.ids().collect();

    let missing = manifest
        .ids()
        .filter(|id| !installed.contains(*id))
        .map(str::to_string)
        .collect();

    let extra_ids: Vec<&String> = installed
        .iter()
        .filter(|id| !listed.contains(id.as_str()))
        .collect();
    let names = if extra_ids.is_empty() {
        Default::default()
    } else {
        read_document(symbol_lib)
            .map(|doc| extract_id_to_name(doc.text()))
            .unwrap_or_default()
    };
    let extra = extra_ids
        .into_iter()
        .map(|id| ExtraPart {
            external_id: id.clone(),
            symbol: names.get(id).cloned(),
        })
        .collect();

    SyncPlan { missing, extra }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_tally() {
        let report = SyncReport {
            synced: vec!["C1".to_string()],
            failed: vec![SyncFailure {
                external_id: "C2".to_string(),
                reason: "boom".to_string(),
            }],
            ..SyncReport::default()
        };
        assert!(!report.is_success());
        assert_eq!(report.attempted(), 2);
    }

    #[test]
    fn plan_from_manifest_and_library() {
        let dir = tempfile::tempdir().unwrap();
        let lib = dir.path().join("lib.kicad_sym");
        std::fs::write(
            &lib,
            "(kicad_symbol_lib\n  (symbol \"A\" (property \"LCSC\" \"C1\"))\n  (symbol \"B\" (property \"LCSC\" \"C3\"))\n)\n",
        )
        .unwrap();

        let mut manifest = Manifest::default();
        manifest.add("C2", "");
        manifest.add("C1", "");

        let plan = plan_for(&manifest, &lib);
        assert_eq!(plan.missing, ["C2"]);
        assert_eq!(
            plan.extra,
            [ExtraPart {
                external_id: "C3".to_string(),
                symbol: Some("B".to_string()),
            }]
        );
        assert!(!plan.is_clean());
    }

    #[test]
    fn plan_without_library_lists_everything_missing() {
        let dir = tempfile::tempdir().unwrap();
        let mut manifest = Manifest::default();
        manifest.add("C9", "");
        let plan = plan_for(&manifest, &dir.path().join("absent.kicad_sym"));
        assert_eq!(plan.missing, ["C9"]);
        assert!(plan.extra.is_empty());
    }
}
