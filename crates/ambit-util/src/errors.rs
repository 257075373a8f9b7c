use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Unified error type for all Ambit operations.
#[derive(Debug, Error, Diagnostic)]
pub enum AmbitError {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid scan configuration (e.g. a configured path outside every root).
    #[error("Configuration error: {message}")]
    #[diagnostic(help("Check that paths-to-extract and dirs-to-skip lie inside a scan root"))]
    Config { message: String },

    /// The max-inodes quota was exceeded during a walk.
    #[error("Inode quota exceeded: visited {visited} inodes, limit is {limit}")]
    Quota { visited: u64, limit: u64 },

    /// Filesystem access failed in strict mode.
    #[error("Filesystem error at {path}: {message}")]
    Fs { path: String, message: String },

    /// A detector broke the advisory invariant (missing identity or
    /// mismatched bodies for the same advisory).
    #[error("Detector invariant violated: {message}")]
    Detector { message: String },

    /// The scan was cancelled by the caller.
    #[error("Scan cancelled")]
    Cancelled,

    /// Reading a dependency manifest failed.
    #[error("Failed to read manifest {path}: {message}")]
    ManifestRead { path: PathBuf, message: String },

    /// Writing a patched manifest failed.
    #[error("Failed to write manifest {path}: {message}")]
    ManifestWrite { path: PathBuf, message: String },

    /// A registry client reported an error.
    #[error("Registry error: {message}")]
    Registry { message: String },

    /// Catch-all for miscellaneous errors.
    #[error("{message}")]
    Generic { message: String },
}

impl AmbitError {
    /// Whether this error should abort an in-progress walk.
    ///
    /// Extractor and non-strict FS errors are isolated per inode; quota,
    /// cancellation and detector invariant violations are not.
    pub fn is_fatal_for_walk(&self) -> bool {
        matches!(
            self,
            AmbitError::Quota { .. } | AmbitError::Cancelled | AmbitError::Detector { .. }
        )
    }
}

/// Convenience alias for `miette::Result<T>`.
pub type AmbitResult<T> = miette::Result<T>;
