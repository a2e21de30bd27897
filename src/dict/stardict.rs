//! Read/write StarDict dictionaries (.ifo/.idx/.dict/.syn).
//!
//! File layout:
//! - .idx: repeated records of UTF-8 headword bytes, one 0x00 terminator,
//!   4-byte big-endian signed offset, 4-byte big-endian signed length.
//! - .dict: concatenated definition bytes, sliced by the .idx offsets.
//! - .syn (optional): UTF-8 synonym bytes, 0x00, 4-byte big-endian signed
//!   position of the owning entry in the sorted entries sequence.
//! - .ifo: UTF-8 `key=value` lines.
//!
//! A package is either a zip container or a plain directory holding the
//! files; .idx and .dict members may be gzip-compressed (.idx.gz,
//! .dict.dz, .dz).

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use log::{debug, info, warn};
use tempfile::TempDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::error::{DictError, Result};
use super::models::{ConvertOptions, DictCompression, SortOptions};
use super::store::Dictionary;

/// Supported `sametypesequence` values. All are UTF-8 encoded except "l".
const SAMETYPESEQUENCE_SUPPORTED: &[&str] = &["m", "l", "g", "t", "x", "y", "k", "w", "h"];

const DICTZIP: &str = "dictzip";

/// Read a StarDict package (zip file or directory) into `dictionary`.
pub fn read(dictionary: &mut Dictionary, path: &Path, options: &ConvertOptions) -> Result<()> {
    info!("Reading StarDict package: {}", path.display());
    let scratch = TempDir::new()?;
    debug!("Working in temp dir {}", scratch.path().display());

    let extracted = unpack_package(path, scratch.path())?;
    let has_syn = extracted.syn.is_some() && !options.ignore_synonyms;
    if extracted.syn.is_some() && options.ignore_synonyms {
        debug!("Package has a .syn file, but synonyms are ignored");
    }

    let ifo_bytes = fs::read(&extracted.ifo)?;
    let ifo_text = String::from_utf8(ifo_bytes)
        .map_err(|_| DictError::InvalidFormat("the .ifo file is not valid UTF-8".to_string()))?;
    let ifo = parse_ifo(&ifo_text, has_syn, options.ignore_sametypesequence)?;
    debug!(
        "Read .ifo: version={}, wordcount={}, idxfilesize={}, synwordcount={:?}",
        ifo.version, ifo.wordcount, ifo.idxfilesize, ifo.synwordcount
    );

    let dict_bytes = fs::read(&extracted.dict)?;
    let idx_bytes = fs::read(&extracted.idx)?;
    let entry_count = parse_idx(&idx_bytes, &dict_bytes, dictionary, options)?;
    info!("Read {} entries from .idx/.dict", entry_count);

    if has_syn {
        if let Some(syn_path) = &extracted.syn {
            let syn_bytes = fs::read(syn_path)?;
            let synonym_count = parse_syn(&syn_bytes, dictionary)?;
            info!("Read {} synonyms from .syn", synonym_count);
        }
    }

    Ok(())
}

/// Write `dictionary` as a StarDict package.
///
/// An output path ending in `.zip` produces a zip container; any other
/// path is treated as a directory receiving the individual files. All
/// files are built in a scratch directory and copied over only on success.
/// Returns the paths placed at the destination.
pub fn write(
    dictionary: &mut Dictionary,
    output_path: &Path,
    options: &ConvertOptions,
) -> Result<Vec<PathBuf>> {
    info!(
        "Writing StarDict package with {} entries to {}",
        dictionary.len(),
        output_path.display()
    );
    let scratch = TempDir::new()?;
    debug!("Working in temp dir {}", scratch.path().display());

    let base = package_base_name(output_path);

    // The .idx format requires a case-insensitive sort over the UTF-8
    // encoding; byte-wise comparison of the case-folded strings.
    dictionary.sort(SortOptions::by_headword(true));

    let (idx_bytes, dict_bytes) = encode_idx_dict(dictionary)?;
    let idx_name = format!("{base}.idx");
    let dict_name = format!("{base}.dict");
    fs::write(scratch.path().join(&idx_name), &idx_bytes)?;
    fs::write(scratch.path().join(&dict_name), &dict_bytes)?;
    debug!(
        "Wrote .idx ({} bytes) and .dict ({} bytes)",
        idx_bytes.len(),
        dict_bytes.len()
    );

    let mut package_members = vec![format!("{base}.ifo"), idx_name.clone()];

    let mut synonym_count = 0;
    if dictionary.has_synonyms() {
        if options.ignore_synonyms {
            debug!("Dictionary has synonyms, but ignoring them");
        } else {
            let pairs = dictionary.synonyms_with_position();
            let syn_bytes = encode_syn(&pairs)?;
            synonym_count = pairs.len();
            let syn_name = format!("{base}.syn");
            fs::write(scratch.path().join(&syn_name), &syn_bytes)?;
            package_members.push(syn_name);
            debug!("Wrote .syn with {} synonyms", synonym_count);
        }
    }

    match &options.dict_compression {
        DictCompression::None => {
            package_members.push(dict_name);
        }
        DictCompression::Gzip => {
            let dz_name = format!("{dict_name}.dz");
            let mut encoder = GzEncoder::new(
                File::create(scratch.path().join(&dz_name))?,
                Compression::default(),
            );
            encoder.write_all(&dict_bytes)?;
            encoder.finish()?;
            package_members.push(dz_name);
            debug!("Compressed .dict with builtin gzip");
        }
        DictCompression::Dictzip { path } => {
            run_dictzip(path.as_deref(), scratch.path(), &dict_name)?;
            package_members.push(format!("{dict_name}.dz"));
        }
    }

    let ifo_text = render_ifo(dictionary, idx_bytes.len(), synonym_count);
    fs::write(scratch.path().join(format!("{base}.ifo")), ifo_text)?;

    package_files(scratch.path(), &package_members, output_path)
}

// --- Package handling ---

struct ExtractedFiles {
    ifo: PathBuf,
    idx: PathBuf,
    dict: PathBuf,
    syn: Option<PathBuf>,
}

/// Member names inside a package, located by extension from the .ifo base.
struct PackageMembers {
    ifo: String,
    idx: Option<String>,
    idx_gz: Option<String>,
    dict: Option<String>,
    dict_dz: Option<String>,
    syn: Option<String>,
}

fn locate_members(names: &[String]) -> Result<PackageMembers> {
    let ifo = names
        .iter()
        .find(|name| name.ends_with(".ifo"))
        .ok_or_else(|| DictError::MissingArtifact(".ifo file".to_string()))?
        .clone();
    let base = ifo[..ifo.len() - 4].to_string();
    let find = |suffix: &str| {
        let wanted = format!("{base}{suffix}");
        names.iter().find(|name| **name == wanted).cloned()
    };
    let idx = find(".idx");
    let idx_gz = find(".idx.gz");
    if idx.is_none() && idx_gz.is_none() {
        return Err(DictError::MissingArtifact(".idx or .idx.gz file".to_string()));
    }
    let dict = find(".dict");
    let dict_dz = find(".dict.dz").or_else(|| find(".dz"));
    if dict.is_none() && dict_dz.is_none() {
        return Err(DictError::MissingArtifact(
            ".dict, .dict.dz, or .dz file".to_string(),
        ));
    }
    Ok(PackageMembers {
        ifo,
        idx,
        idx_gz,
        dict,
        dict_dz,
        syn: find(".syn"),
    })
}

/// Extract (and gunzip where needed) the package members into `scratch`,
/// returning the paths of the uncompressed .ifo/.idx/.dict and optional .syn.
fn unpack_package(path: &Path, scratch: &Path) -> Result<ExtractedFiles> {
    let mut extract: Box<dyn FnMut(&str, &Path) -> Result<()>>;
    let names: Vec<String>;

    if path.is_dir() {
        names = fs::read_dir(path)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        let source = path.to_path_buf();
        extract = Box::new(move |name, target| {
            fs::copy(source.join(name), target)?;
            Ok(())
        });
    } else {
        let mut archive = ZipArchive::new(File::open(path)?)?;
        names = archive.file_names().map(String::from).collect();
        extract = Box::new(move |name, target| {
            let mut member = archive.by_name(name)?;
            let mut file = File::create(target)?;
            std::io::copy(&mut member, &mut file)?;
            Ok(())
        });
    }

    let members = locate_members(&names)?;

    let ifo = scratch.join("d.ifo");
    extract(&members.ifo, &ifo)?;

    let idx = scratch.join("d.idx");
    match (&members.idx, &members.idx_gz) {
        (Some(name), _) => extract(name, &idx)?,
        (None, Some(name)) => {
            let compressed = scratch.join("d.idx.gz");
            extract(name, &compressed)?;
            gunzip(&compressed, &idx)?;
        }
        (None, None) => unreachable!("locate_members guarantees an index member"),
    }

    let dict = scratch.join("d.dict");
    match (&members.dict, &members.dict_dz) {
        (Some(name), _) => extract(name, &dict)?,
        (None, Some(name)) => {
            let compressed = scratch.join("d.dict.dz");
            extract(name, &compressed)?;
            gunzip(&compressed, &dict)?;
        }
        (None, None) => unreachable!("locate_members guarantees a dict member"),
    }

    let syn = match &members.syn {
        Some(name) => {
            let target = scratch.join("d.syn");
            extract(name, &target)?;
            Some(target)
        }
        None => None,
    };

    Ok(ExtractedFiles { ifo, idx, dict, syn })
}

fn gunzip(source: &Path, target: &Path) -> Result<()> {
    let mut decoder = GzDecoder::new(File::open(source)?);
    let mut file = File::create(target)?;
    std::io::copy(&mut decoder, &mut file)?;
    debug!("Uncompressed {}", target.display());
    Ok(())
}

/// The package base name: the output file name with any `.zip` stripped.
fn package_base_name(output_path: &Path) -> String {
    let name = output_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "dictionary".to_string());
    match name.strip_suffix(".zip") {
        Some(stripped) => stripped.to_string(),
        None => name,
    }
}

/// Place the produced files at the destination: a deflated zip for a
/// `.zip` output path, individual files into a directory otherwise.
fn package_files(scratch: &Path, members: &[String], output_path: &Path) -> Result<Vec<PathBuf>> {
    if output_path.extension().is_some_and(|ext| ext == "zip") {
        let staged = scratch.join("package.zip");
        let mut archive = ZipWriter::new(File::create(&staged)?);
        let zip_options =
            FileOptions::default().compression_method(CompressionMethod::Deflated);
        for member in members {
            archive.start_file(member.as_str(), zip_options)?;
            let bytes = fs::read(scratch.join(member))?;
            archive.write_all(&bytes)?;
        }
        archive.finish()?;
        fs::copy(&staged, output_path)?;
        info!("Wrote package {}", output_path.display());
        Ok(vec![output_path.to_path_buf()])
    } else {
        fs::create_dir_all(output_path)?;
        let mut placed = Vec::with_capacity(members.len());
        for member in members {
            let target = output_path.join(member);
            fs::copy(scratch.join(member), &target)?;
            placed.push(target);
        }
        info!("Wrote {} files into {}", placed.len(), output_path.display());
        Ok(placed)
    }
}

// --- .ifo handling ---

#[derive(Debug)]
struct IfoFile {
    version: String,
    wordcount: u64,
    idxfilesize: u64,
    synwordcount: Option<u64>,
}

fn parse_ifo(text: &str, has_syn: bool, ignore_sametypesequence: bool) -> Result<IfoFile> {
    let mut fields: HashMap<&str, &str> = HashMap::new();
    for line in text.lines() {
        if let Some((key, value)) = line.split_once('=') {
            fields.insert(key, value);
        }
    }

    let version = *fields
        .get("version")
        .ok_or(DictError::MissingIfoKey("version"))?;
    if version != "2.4.2" && version != "3.0.0" {
        return Err(DictError::UnsupportedVersion(version.to_string()));
    }

    fields
        .get("bookname")
        .ok_or(DictError::MissingIfoKey("bookname"))?;
    let wordcount = parse_ifo_number(&fields, "wordcount")?;
    let idxfilesize = parse_ifo_number(&fields, "idxfilesize")?;
    let synwordcount = if has_syn {
        Some(parse_ifo_number(&fields, "synwordcount")?)
    } else {
        None
    };

    if ignore_sametypesequence {
        debug!("Ignoring sametypesequence value");
    } else {
        let sequence = *fields
            .get("sametypesequence")
            .ok_or(DictError::MissingIfoKey("sametypesequence"))?;
        if !SAMETYPESEQUENCE_SUPPORTED.contains(&sequence) {
            return Err(DictError::UnsupportedSameTypeSequence(sequence.to_string()));
        }
    }

    Ok(IfoFile {
        version: version.to_string(),
        wordcount,
        idxfilesize,
        synwordcount,
    })
}

fn parse_ifo_number(fields: &HashMap<&str, &str>, key: &'static str) -> Result<u64> {
    let value = fields.get(key).ok_or(DictError::MissingIfoKey(key))?;
    value
        .parse()
        .map_err(|_| DictError::InvalidFormat(format!("'{key}' value '{value}' is not an integer")))
}

fn render_ifo(dictionary: &Dictionary, idx_size: usize, synonym_count: usize) -> String {
    let field = |value: &Option<String>| value.clone().unwrap_or_default();
    let metadata = &dictionary.metadata;
    let mut text = String::new();
    text.push_str("StarDict's dict ifo file\n");
    text.push_str("version=2.4.2\n");
    text.push_str(&format!("wordcount={}\n", dictionary.len()));
    text.push_str(&format!("idxfilesize={idx_size}\n"));
    text.push_str(&format!("bookname={}\n", field(&metadata.title)));
    text.push_str(&format!("date={}\n", field(&metadata.year)));
    text.push_str("sametypesequence=m\n");
    text.push_str(&format!("description={}\n", field(&metadata.description)));
    text.push_str(&format!("author={}\n", field(&metadata.author)));
    text.push_str(&format!("email={}\n", field(&metadata.email)));
    text.push_str(&format!("website={}\n", field(&metadata.website)));
    if synonym_count > 0 {
        text.push_str(&format!("synwordcount={synonym_count}\n"));
    }
    text
}

// --- Binary index encoding/decoding ---

/// Encode the .idx and .dict payloads for the current sort order.
fn encode_idx_dict(dictionary: &Dictionary) -> Result<(Vec<u8>, Vec<u8>)> {
    let mut idx = Vec::new();
    let mut dict = Vec::new();
    let mut offset: i32 = 0;
    for entry in dictionary.entries_in_order() {
        let definition = entry.definition.as_bytes();
        let size = i32::try_from(definition.len()).map_err(|_| {
            DictError::InvalidFormat(format!(
                "definition of '{}' exceeds the 4-byte length field",
                entry.headword
            ))
        })?;
        idx.extend_from_slice(entry.headword.as_bytes());
        idx.push(0);
        idx.write_i32::<BigEndian>(offset)?;
        idx.write_i32::<BigEndian>(size)?;
        dict.extend_from_slice(definition);
        offset = offset.checked_add(size).ok_or_else(|| {
            DictError::InvalidFormat(".dict payload exceeds the 4-byte offset field".to_string())
        })?;
    }
    Ok((idx, dict))
}

/// Encode the .syn payload from (synonym, sorted position) pairs: synonym
/// bytes, 0x00, 4-byte big-endian position of the owning entry in the
/// current sort order.
fn encode_syn(pairs: &[(&str, usize)]) -> Result<Vec<u8>> {
    let mut syn = Vec::new();
    for &(synonym, position) in pairs {
        let position = i32::try_from(position).map_err(|_| {
            DictError::InvalidFormat("entry position exceeds the 4-byte index field".to_string())
        })?;
        syn.extend_from_slice(synonym.as_bytes());
        syn.push(0);
        syn.write_i32::<BigEndian>(position)?;
    }
    Ok(syn)
}

/// Parse .idx records against the .dict payload, appending entries to the
/// dictionary. Returns the number of entries added.
fn parse_idx(
    idx: &[u8],
    dict: &[u8],
    dictionary: &mut Dictionary,
    options: &ConvertOptions,
) -> Result<usize> {
    let mut cursor = 0;
    let mut count = 0;
    while cursor < idx.len() {
        let (headword, [offset, size], next) = parse_terminated_record::<2>(idx, cursor, ".idx")?;
        let start = usize::try_from(offset).map_err(|_| negative_field(".idx", "offset"))?;
        let length = usize::try_from(size).map_err(|_| negative_field(".idx", "length"))?;
        let end = start
            .checked_add(length)
            .filter(|&end| end <= dict.len())
            .ok_or_else(|| {
                DictError::InvalidFormat(format!(
                    "record '{headword}' points outside the .dict payload ({start}+{length} > {})",
                    dict.len()
                ))
            })?;
        let (definition, _, _) = options.encoding.decode(&dict[start..end]);
        let headword = if options.ignore_case {
            headword.to_lowercase()
        } else {
            headword
        };
        dictionary.add_entry(headword, definition.into_owned());
        count += 1;
        cursor = next;
    }
    Ok(count)
}

/// Parse .syn records. A record whose index references a nonexistent entry
/// is dropped with a warning; parsing continues. Returns the number of
/// synonyms attached.
fn parse_syn(syn: &[u8], dictionary: &mut Dictionary) -> Result<usize> {
    let mut cursor = 0;
    let mut count = 0;
    while cursor < syn.len() {
        let (synonym, [index], next) = parse_terminated_record::<1>(syn, cursor, ".syn")?;
        match usize::try_from(index).ok().filter(|&i| i < dictionary.len()) {
            Some(position) => {
                dictionary.add_synonym(synonym, position);
                count += 1;
            }
            None => {
                warn!(
                    "Synonym '{synonym}' points to entry {index} but only {} entries exist, dropping it",
                    dictionary.len()
                );
            }
        }
        cursor = next;
    }
    Ok(count)
}

/// Parse one record at `cursor`: text bytes, a 0x00 terminator, then
/// `FIELDS` 4-byte big-endian signed integers (.idx records carry two,
/// .syn records one). Returns the decoded text, the integers, and the
/// cursor position after the record.
fn parse_terminated_record<const FIELDS: usize>(
    data: &[u8],
    cursor: usize,
    file: &'static str,
) -> Result<(String, [i32; FIELDS], usize)> {
    let nul = data[cursor..]
        .iter()
        .position(|&byte| byte == 0)
        .ok_or_else(|| {
            DictError::InvalidFormat(format!("unterminated record in {file} file"))
        })?;
    let text_bytes = &data[cursor..cursor + nul];
    let fields_start = cursor + nul + 1;
    let fields_end = fields_start + 4 * FIELDS;
    if data.len() < fields_end {
        return Err(DictError::InvalidFormat(format!(
            "truncated record fields in {file} file"
        )));
    }
    let mut fields = [0i32; FIELDS];
    for (position, field) in fields.iter_mut().enumerate() {
        let at = fields_start + 4 * position;
        *field = BigEndian::read_i32(&data[at..at + 4]);
    }
    let text = String::from_utf8(text_bytes.to_vec()).map_err(|_| {
        DictError::InvalidFormat(format!("record text in {file} file is not valid UTF-8"))
    })?;
    Ok((text, fields, fields_end))
}

fn negative_field(file: &'static str, field: &'static str) -> DictError {
    DictError::InvalidFormat(format!("negative {field} in {file} record"))
}

fn run_dictzip(tool_path: Option<&Path>, scratch: &Path, dict_name: &str) -> Result<()> {
    let tool = tool_path
        .map(|path| path.to_string_lossy().into_owned())
        .unwrap_or_else(|| DICTZIP.to_string());
    info!("Running '{tool}' on {dict_name}");
    let output = Command::new(&tool)
        .arg("-k")
        .arg(dict_name)
        .current_dir(scratch)
        .output()
        .map_err(|error| DictError::ExternalTool {
            tool: tool.clone(),
            reason: error.to_string(),
        })?;
    if !output.status.success() {
        return Err(DictError::ExternalTool {
            tool,
            reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}
