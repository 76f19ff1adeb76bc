//! External library generator.
//!
//! Symbols, footprints and 3D models are produced by `JLC2KiCadLib`, run once
//! per part. It appends the symbol to the shared `.kicad_sym` file, which is
//! why the symbol writer only ever edits text in place.

use std::ffi::OsString;
use std::io;
use std::path::Path;
use std::process::Command;

use crate::config::GeneratorConfig;
use crate::error::GeneratorError;

/// Produces library files for one part.
pub trait Generator {
    /// Generates `external_id` into the library directory `lib_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the generator is missing, cannot be started or
    /// reports failure.
    fn generate(&self, external_id: &str, lib_dir: &Path) -> Result<(), GeneratorError>;
}

/// Drives the `JLC2KiCadLib` command-line tool.
#[derive(Debug, Clone)]
pub struct Jlc2KicadLib {
    program: String,
    symbol_lib: String,
    skip_existing: bool,
}

impl Jlc2KicadLib {
    /// Creates a driver from generator settings.
    #[must_use]
    pub fn new(settings: &GeneratorConfig) -> Self {
        Self {
            program: settings.program.clone(),
            symbol_lib: settings.symbol_lib.clone(),
            skip_existing: settings.skip_existing,
        }
    }

    /// Program that will be run.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Command-line arguments for one part.
    #[must_use]
    pub fn args(&self, external_id: &str, lib_dir: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            external_id.into(),
            "-dir".into(),
            lib_dir.as_os_str().to_owned(),
            "-symbol_lib".into(),
            self.symbol_lib.as_str().into(),
        ];
        if self.skip_existing {
            args.push("--skip_existing".into());
        }
        args
    }
}

impl Generator for Jlc2KicadLib {
    fn generate(&self, external_id: &str, lib_dir: &Path) -> Result<(), GeneratorError> {
        tracing::info!(external_id, program = %self.program, "Running library generator");

        let output = Command::new(&self.program)
            .args(self.args(external_id, lib_dir))
            .output()
            .map_err(|e| {
                if e.kind() == io::ErrorKind::NotFound {
                    GeneratorError::NotInstalled {
                        program: self.program.clone(),
                    }
                } else {
                    GeneratorError::Io {
                        program: self.program.clone(),
                        source: e,
                    }
                }
            })?;

        if output.status.success() {
            tracing::debug!(external_id, "Generator finished");
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        Err(GeneratorError::Failed {
            external_id: external_id.to_string(),
            status: output.status.to_string(),
            stderr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_arguments() {
        let generator = Jlc2KicadLib::new(&GeneratorConfig::default());
        let args = generator.args("C194349", Path::new("/proj/jlclib"));
        assert_eq!(
            args,
            [
                "C194349",
                "-dir",
                "/proj/jlclib",
                "-symbol_lib",
                "jlc_project",
                "--skip_existing"
            ]
            .map(OsString::from)
        );
    }

    #[test]
    fn skip_existing_can_be_disabled() {
        let settings = GeneratorConfig {
            skip_existing: false,
            ..GeneratorConfig::default()
        };
        let args = Jlc2KicadLib::new(&settings).args("C1", Path::new("lib"));
        assert!(!args.iter().any(|a| a == "--skip_existing"));
    }

    #[test]
    fn missing_program_is_not_installed() {
        let settings = GeneratorConfig {
            program: "jlcmgr-test-no-such-generator".to_string(),
            ..GeneratorConfig::default()
        };
        let dir = tempfile::tempdir().unwrap();
        let result = Jlc2KicadLib::new(&settings).generate("C1", dir.path());
        assert!(matches!(result, Err(GeneratorError::NotInstalled { .. })));
    }
}
