//! Data structures shared across the dictionary codecs.

use std::path::PathBuf;
use std::sync::Arc;

use encoding_rs::Encoding;
use uuid::Uuid;

use super::collation::{Collation, DefaultCollation};

/// A single dictionary entry: a headword, its definition, and the synonym
/// strings attached to it (insertion order, repeats allowed).
#[derive(Debug, Clone)]
pub struct DictionaryEntry {
    pub headword: String,
    pub definition: String,
    synonyms: Vec<String>,
}

impl DictionaryEntry {
    pub fn new(headword: impl Into<String>, definition: impl Into<String>) -> Self {
        Self {
            headword: headword.into(),
            definition: definition.into(),
            synonyms: Vec::new(),
        }
    }

    pub fn add_synonym(&mut self, synonym: impl Into<String>) {
        self.synonyms.push(synonym.into());
    }

    pub fn synonyms(&self) -> &[String] {
        &self.synonyms
    }
}

/// Dictionary-level metadata carried through a conversion.
///
/// The identifier defaults to a generated UUID; every other field is
/// optional and written out empty when absent.
#[derive(Debug, Clone)]
pub struct DictionaryMetadata {
    pub identifier: String,
    pub author: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub title: Option<String>,
    pub copyright: Option<String>,
    pub license: Option<String>,
    pub year: Option<String>,
    /// ISO 639-1 code of the headword language.
    pub language_from: Option<String>,
    /// ISO 639-1 code of the definition language.
    pub language_to: Option<String>,
    pub description: Option<String>,
}

impl Default for DictionaryMetadata {
    fn default() -> Self {
        Self {
            identifier: Uuid::new_v4().simple().to_string(),
            author: None,
            email: None,
            website: None,
            title: None,
            copyright: None,
            license: None,
            year: None,
            language_from: None,
            language_to: None,
            description: None,
        }
    }
}

impl DictionaryMetadata {
    pub fn is_monolingual(&self) -> bool {
        match &self.language_from {
            Some(from) => Some(from) == self.language_to.as_ref(),
            None => false,
        }
    }

    pub fn is_bilingual(&self) -> bool {
        match &self.language_from {
            Some(from) => Some(from) != self.language_to.as_ref(),
            None => false,
        }
    }
}

/// Sort parameters for [`Dictionary::sort`](super::Dictionary::sort).
///
/// With neither `by_headword` nor `by_definition` set, sorting resets the
/// order to insertion order.
#[derive(Debug, Clone, Copy, Default)]
pub struct SortOptions {
    pub by_headword: bool,
    pub by_definition: bool,
    pub reverse: bool,
    pub ignore_case: bool,
}

impl SortOptions {
    /// Sort by headword only, optionally case-insensitive.
    pub fn by_headword(ignore_case: bool) -> Self {
        Self {
            by_headword: true,
            ignore_case,
            ..Self::default()
        }
    }
}

/// How the StarDict `.dict` payload is compressed on write.
#[derive(Debug, Clone, Default)]
pub enum DictCompression {
    /// Leave the `.dict` file uncompressed.
    #[default]
    None,
    /// Compress to `.dict.dz` with the builtin gzip encoder.
    Gzip,
    /// Run the external `dictzip -k` executable, from `path` or from `$PATH`.
    Dictzip { path: Option<PathBuf> },
}

/// Immutable configuration for one conversion, constructed once and passed
/// by reference through the read/transform/write pipeline.
#[derive(Clone)]
pub struct ConvertOptions {
    /// Encoding used to decode definition bytes on read. Headwords are
    /// always UTF-8.
    pub encoding: &'static Encoding,
    /// Lowercase headwords while reading.
    pub ignore_case: bool,
    /// Skip synonym tables on both read and write.
    pub ignore_synonyms: bool,
    /// Accept .ifo files without a (supported) sametypesequence value.
    pub ignore_sametypesequence: bool,
    /// Compression applied to the StarDict `.dict` payload.
    pub dict_compression: DictCompression,
    /// Produce a single Bookeen `.install` zip instead of the
    /// `.dict.idx`/`.dict` pair.
    pub bookeen_install_file: bool,
    /// Comparator registered with the Bookeen index as `IcuNoCase`.
    pub collation: Arc<dyn Collation>,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            encoding: encoding_rs::UTF_8,
            ignore_case: false,
            ignore_synonyms: false,
            ignore_sametypesequence: false,
            dict_compression: DictCompression::None,
            bookeen_install_file: false,
            collation: Arc::new(DefaultCollation),
        }
    }
}

impl std::fmt::Debug for ConvertOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConvertOptions")
            .field("encoding", &self.encoding.name())
            .field("ignore_case", &self.ignore_case)
            .field("ignore_synonyms", &self.ignore_synonyms)
            .field("ignore_sametypesequence", &self.ignore_sametypesequence)
            .field("dict_compression", &self.dict_compression)
            .field("bookeen_install_file", &self.bookeen_install_file)
            .finish_non_exhaustive()
    }
}
