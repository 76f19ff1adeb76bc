//! Error types for kicad-jlc-manager.
//!
//! Symbol library errors live beside the code that raises them in
//! [`crate::symbol::SymbolError`]; reconciliation errors that wrap all of these
//! live in [`crate::reconcile::ReconcileError`].

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("failed to read configuration file: {path}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Configuration file could not be parsed.
    #[error("failed to parse configuration file: {path}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Configuration file not found.
    #[error("configuration file not found: {path}")]
    NotFound {
        /// Path where the configuration file was expected.
        path: PathBuf,
    },

    /// Configuration validation failed.
    #[error("configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation failure.
        message: String,
    },
}

/// Errors that can occur while reading or writing `jlcproject.toml`.
#[derive(Error, Debug)]
pub enum ManifestError {
    /// Manifest could not be read.
    #[error("failed to read manifest: {path}")]
    Read {
        /// Path to the manifest.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Manifest is not valid TOML or has the wrong shape.
    #[error("failed to parse manifest: {path}")]
    Parse {
        /// Path to the manifest.
        path: PathBuf,
        /// The underlying TOML error.
        #[source]
        source: toml::de::Error,
    },

    /// Manifest settings are unusable.
    #[error("invalid manifest settings: {message}")]
    Invalid {
        /// Description of the problem.
        message: String,
    },

    /// Manifest could not be written.
    #[error("failed to write manifest: {path}")]
    Write {
        /// Path to the manifest.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Errors from project discovery and library layout.
#[derive(Error, Debug)]
pub enum ProjectError {
    /// No `*.kicad_pro` file in the start directory or any parent.
    #[error("no KiCad project found in {start} or any parent directory")]
    NotFound {
        /// Directory the search started from.
        start: PathBuf,
    },

    /// A project file or directory could not be read or written.
    #[error("I/O error on {path}")]
    Io {
        /// Path that failed.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl ProjectError {
    /// Creates an I/O error for `path`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors from the external library generator.
#[derive(Error, Debug)]
pub enum GeneratorError {
    /// The generator program is not on `PATH`.
    #[error("{program} not found, install it with: pip install JLC2KiCadLib")]
    NotInstalled {
        /// Program that was looked up.
        program: String,
    },

    /// The generator ran but reported failure.
    #[error("failed to generate {external_id} ({status}): {stderr}")]
    Failed {
        /// Component that was being generated.
        external_id: String,
        /// Exit status as reported by the OS.
        status: String,
        /// Trimmed standard error output.
        stderr: String,
    },

    /// The generator could not be started.
    #[error("failed to run {program}")]
    Io {
        /// Program that was started.
        program: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Errors from the supplier product API.
///
/// These never escape the [`crate::supplier::DetailsSource`] boundary; they
/// are logged and turned into "no details".
#[derive(Error, Debug)]
pub enum SupplierError {
    /// The HTTP request failed (connection, timeout, body decoding).
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("supplier API returned HTTP {status}")]
    Status {
        /// HTTP status code.
        status: u16,
    },

    /// The response carried no `result` object.
    #[error("no product details for {external_id}")]
    NoResult {
        /// Component that was looked up.
        external_id: String,
    },
}
