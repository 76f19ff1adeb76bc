//! Error types for symbol library file operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for symbol library operations.
pub type SymbolResult<T> = Result<T, SymbolError>;

/// Errors that can occur while reading or rewriting a `.kicad_sym` file.
///
/// Text-level problems (a block without a parsable name, a property that
/// cannot be found) are not errors: they are absorbed by the reader and the
/// writer. Only file-system failures surface here.
#[derive(Debug, Error)]
pub enum SymbolError {
    /// Failed to open or read the file.
    #[error("Failed to read symbol library: {path}")]
    FileRead {
        /// Path to the file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Failed to write the file.
    #[error("Failed to write symbol library: {path}")]
    FileWrite {
        /// Path to the file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Failed to copy the file to its backup location.
    #[error("Failed to create backup: {path}")]
    Backup {
        /// Backup path that could not be written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

impl SymbolError {
    /// Creates a file read error.
    pub fn file_read(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    /// Creates a file write error.
    pub fn file_write(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::FileWrite {
            path: path.into(),
            source,
        }
    }

    /// Creates a backup error.
    pub fn backup(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Backup {
            path: path.into(),
            source,
        }
    }
}
