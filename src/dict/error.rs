//! Custom error types for the dictconv crate.

use thiserror::Error;

/// The primary error type for all operations in this crate.
#[derive(Debug, Error)]
pub enum DictError {
    /// An error originating from I/O operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is structurally invalid or does not conform to the format specification.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// A required `key=value` line is missing from a StarDict .ifo file.
    #[error("No '{0}' key found in the .ifo file")]
    MissingIfoKey(&'static str),

    /// The .ifo file declares a version other than "2.4.2" or "3.0.0".
    #[error("Unsupported StarDict version '{0}'. Only 2.4.2 and 3.0.0 are supported.")]
    UnsupportedVersion(String),

    /// The .ifo file declares a sametypesequence outside the supported set.
    #[error("Unsupported sametypesequence value '{0}' (must be one of m|l|g|t|x|y|k|w|h)")]
    UnsupportedSameTypeSequence(String),

    /// A package is missing a required member (e.g., no .ifo inside a StarDict zip).
    #[error("Cannot find {0} in the given package")]
    MissingArtifact(String),

    /// A required external executable was not found or exited with a failure.
    #[error("External tool '{tool}' failed: {reason}")]
    ExternalTool { tool: String, reason: String },

    /// An error from the embedded SQLite index of the Bookeen format.
    #[error("Index error: {0}")]
    Index(#[from] rusqlite::Error),

    /// An error reading or writing a zip container.
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
}

/// A convenience `Result` type alias using the crate's `DictError` type.
pub type Result<T> = std::result::Result<T, DictError>;
