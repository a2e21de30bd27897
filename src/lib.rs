//! # dictconv
//!
//! A converter between on-disk dictionary formats used by eReader devices.
//! Supports the StarDict layout (.ifo/.idx/.dict/.syn) and the Bookeen
//! chunked layout backed by an embedded SQLite index.
pub mod dict;

// Re-export the main types for convenience
pub use dict::{
    collation::{Collation, DefaultCollation, GermanCollation},
    error::{DictError, Result},
    group::{DefaultPrefix, EntryGroups, PrefixStrategy},
    models::{ConvertOptions, DictCompression, DictionaryEntry, DictionaryMetadata, SortOptions},
    Dictionary, Format,
};
