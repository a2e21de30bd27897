//! Core dictionary conversion module.

pub mod bookeen;
pub mod collation;
pub mod error;
pub mod group;
pub mod models;
pub mod stardict;
mod store;

use std::path::{Path, PathBuf};
use std::str::FromStr;

pub use error::{DictError, Result};
pub use store::{Dictionary, MergeStrategy};

use models::ConvertOptions;

/// An on-disk dictionary format handled by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Stardict,
    Bookeen,
}

impl FromStr for Format {
    type Err = DictError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "stardict" => Ok(Self::Stardict),
            "bookeen" => Ok(Self::Bookeen),
            other => Err(DictError::InvalidFormat(format!(
                "unknown dictionary format '{other}' (expected stardict or bookeen)"
            ))),
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stardict => write!(f, "stardict"),
            Self::Bookeen => write!(f, "bookeen"),
        }
    }
}

/// Read the input file in the given format into `dictionary`.
pub fn read_dictionary(
    dictionary: &mut Dictionary,
    path: &Path,
    format: Format,
    options: &ConvertOptions,
) -> Result<()> {
    match format {
        Format::Stardict => stardict::read(dictionary, path, options),
        Format::Bookeen => bookeen::read(dictionary, path, options),
    }
}

/// Write `dictionary` to the output path in the given format, returning
/// the paths placed at the destination.
pub fn write_dictionary(
    dictionary: &mut Dictionary,
    path: &Path,
    format: Format,
    options: &ConvertOptions,
) -> Result<Vec<PathBuf>> {
    match format {
        Format::Stardict => stardict::write(dictionary, path, options),
        Format::Bookeen => bookeen::write(dictionary, path, options),
    }
}
