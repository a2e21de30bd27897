//! Read/write Bookeen dictionaries.
//!
//! A Bookeen dictionary is an SQLite index file (`<base>.dict.idx`, table
//! `T_DictIndex` of `(reserved, headword, offset, size, chunk)` rows) plus
//! `<base>.dict`, a zip of flat chunk files `c_1`, `c_2`, ... holding the
//! UTF-8 definition bytes. Headword lookup order comes from a collation
//! registered with SQLite as `IcuNoCase`; the comparator is pluggable via
//! the [`Collation`] trait.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info};
use rusqlite::{params, Connection};
use tempfile::TempDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::collation::Collation;
use super::error::{DictError, Result};
use super::models::ConvertOptions;
use super::store::Dictionary;

const CHUNK_FILE_PREFIX: &str = "c_";
/// Cumulative content threshold (2^18 bytes) after which the next chunk
/// file is opened. A definition is never split across chunks, so a chunk
/// may exceed the threshold by one definition.
pub const CHUNK_SIZE: u64 = 262_144;
const COLLATION_NAME: &str = "IcuNoCase";

fn xhtml_header(language: &str) -> String {
    format!(
        "<!DOCTYPE html PUBLIC \"-//W3C//DTD XHTML 1.0 Strict//EN\"  \
         \"http://www.w3.org/TR/xhtml1/DTD/xhtml1-strict.dtd\" \
         [<!ENTITY ns \"&#8226;\">]><html xml:lang=\"{language}\" \
         xmlns=\"http://www.w3.org/1999/xhtml\"><head><title></title></head><body>"
    )
}

/// Read a Bookeen dictionary into `dictionary`.
///
/// `path` is either a `.install` zip, a `<name>.dict` file with its
/// `<name>.dict.idx` next to it, or the bare `<name>` prefix of such a pair.
pub fn read(dictionary: &mut Dictionary, path: &Path, options: &ConvertOptions) -> Result<()> {
    info!("Reading Bookeen dictionary: {}", path.display());
    let scratch = TempDir::new()?;
    debug!("Working in temp dir {}", scratch.path().display());

    let (idx_path, dict_path) = resolve_input(path, scratch.path())?;

    // unzip chunk files
    let mut archive = ZipArchive::new(File::open(&dict_path)?)?;
    for member_index in 0..archive.len() {
        let mut member = archive.by_index(member_index)?;
        if member.is_dir() {
            continue;
        }
        let base_name = member
            .name()
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        let mut file = File::create(scratch.path().join(base_name))?;
        std::io::copy(&mut member, &mut file)?;
    }

    // load all index rows, grouped by chunk
    let connection = Connection::open(&idx_path)?;
    let mut statement =
        connection.prepare("SELECT F_Word, F_Offset, F_Size, F_ChunkNum FROM T_DictIndex")?;
    let mut chunks: BTreeMap<i64, Vec<(String, u64, usize)>> = BTreeMap::new();
    let mut rows = statement.query([])?;
    while let Some(row) = rows.next()? {
        let headword: String = row.get(0)?;
        let offset: i64 = row.get(1)?;
        let size: i64 = row.get(2)?;
        let chunk: i64 = row.get(3)?;
        let offset = u64::try_from(offset)
            .map_err(|_| DictError::InvalidFormat("negative offset in index row".to_string()))?;
        let size = usize::try_from(size)
            .map_err(|_| DictError::InvalidFormat("negative size in index row".to_string()))?;
        chunks.entry(chunk).or_default().push((headword, offset, size));
    }
    drop(rows);
    drop(statement);

    // read definitions chunk by chunk
    let mut entry_count = 0;
    for (chunk, rows) in &chunks {
        let chunk_path = scratch.path().join(format!("{CHUNK_FILE_PREFIX}{chunk}"));
        debug!("Reading {} entries from {}", rows.len(), chunk_path.display());
        let mut chunk_file = File::open(&chunk_path)?;
        for (headword, offset, size) in rows {
            chunk_file.seek(SeekFrom::Start(*offset))?;
            let mut definition_bytes = vec![0u8; *size];
            chunk_file.read_exact(&mut definition_bytes)?;
            let (definition, _, _) = options.encoding.decode(&definition_bytes);
            let headword = if options.ignore_case {
                headword.to_lowercase()
            } else {
                headword.clone()
            };
            dictionary.add_entry(headword, definition.into_owned());
            entry_count += 1;
        }
    }
    info!("Read {} entries from {} chunks", entry_count, chunks.len());
    Ok(())
}

/// Write `dictionary` as a Bookeen dictionary.
///
/// Produces either a single `.install` zip or the `.dict.idx`/`.dict`
/// pair, per [`ConvertOptions::bookeen_install_file`]. Everything is built
/// in a scratch directory and copied to the destination on success.
/// Returns the paths placed at the destination.
pub fn write(
    dictionary: &Dictionary,
    output_path: &Path,
    options: &ConvertOptions,
) -> Result<Vec<PathBuf>> {
    info!(
        "Writing Bookeen dictionary with {} entries to {}",
        dictionary.len(),
        output_path.display()
    );
    let scratch = TempDir::new()?;
    debug!("Working in temp dir {}", scratch.path().display());

    let base = base_name(output_path);
    let idx_name = format!("{base}.dict.idx");
    let dict_name = format!("{base}.dict");
    let idx_path = scratch.path().join(&idx_name);

    let mut connection = Connection::open(&idx_path)?;
    let collation = Arc::clone(&options.collation);
    connection.create_collation(COLLATION_NAME, move |a, b| collation.collate(a, b))?;
    create_schema(&connection)?;

    // entries ordered by the registered collation, stable by insertion position
    let mut order: Vec<usize> = (0..dictionary.len()).collect();
    order.sort_by(|&a, &b| {
        let entries = dictionary.entries();
        options
            .collation
            .collate(&entries[a].headword, &entries[b].headword)
            .then(a.cmp(&b))
    });

    let (chunks, index_rows) =
        build_chunks(dictionary, &order, options.ignore_synonyms, CHUNK_SIZE);
    debug!(
        "Writing {} chunk files, {} index rows",
        chunks.len(),
        index_rows.len()
    );

    let mut chunk_names = Vec::with_capacity(chunks.len());
    for (position, chunk) in chunks.iter().enumerate() {
        let chunk_file_name = format!("{}{}", CHUNK_FILE_PREFIX, position + 1);
        fs::write(scratch.path().join(&chunk_file_name), chunk)?;
        chunk_names.push(chunk_file_name);
    }

    let transaction = connection.transaction()?;
    {
        let mut insert = transaction
            .prepare("INSERT INTO T_DictIndex VALUES (?1, ?2, ?3, ?4, ?5)")?;
        for row in &index_rows {
            insert.execute(params![0i64, row.headword, row.offset, row.size, row.chunk])?;
        }
    }
    transaction.commit()?;

    // zip the chunk files into the .dict container
    let mut dict_archive = ZipWriter::new(File::create(scratch.path().join(&dict_name))?);
    let zip_options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    for chunk_file_name in &chunk_names {
        dict_archive.start_file(chunk_file_name.as_str(), zip_options)?;
        let bytes = fs::read(scratch.path().join(chunk_file_name))?;
        dict_archive.write_all(&bytes)?;
    }
    dict_archive.finish()?;

    write_index_metadata(&connection, dictionary)?;
    connection.execute("VACUUM", [])?;
    connection.close().map_err(|(_, error)| error)?;

    package_output(scratch.path(), &idx_name, &dict_name, &base, output_path, options)
}

// --- Index schema and metadata ---

fn create_schema(connection: &Connection) -> Result<()> {
    connection.execute_batch(
        "CREATE TABLE T_DictIndex (
            F_Reserved INTEGER,
            F_Word TEXT COLLATE IcuNoCase,
            F_Offset INTEGER,
            F_Size INTEGER,
            F_ChunkNum INTEGER
         );
         CREATE TABLE T_DictInfo (
            F_xhtmlHeader TEXT,
            F_LangFrom TEXT,
            F_LangTo TEXT,
            F_Licence TEXT,
            F_Copyright TEXT,
            F_Title TEXT,
            F_Description TEXT,
            F_Year TEXT,
            F_Alphabet TEXT,
            F_CollationLevel TEXT
         );
         CREATE TABLE T_DictVersion (
            F_DictType TEXT,
            F_Version TEXT
         );",
    )?;
    Ok(())
}

fn write_index_metadata(connection: &Connection, dictionary: &Dictionary) -> Result<()> {
    debug!("Updating index metadata");
    let metadata = &dictionary.metadata;
    let field = |value: &Option<String>| value.clone().unwrap_or_default();
    let language_from = field(&metadata.language_from);
    connection.execute(
        "INSERT INTO T_DictInfo VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            xhtml_header(&language_from),
            language_from,
            field(&metadata.language_to),
            field(&metadata.license),
            field(&metadata.copyright),
            field(&metadata.title),
            field(&metadata.description),
            field(&metadata.year),
            // the meaning of the following two is unknown
            "Z",
            "1",
        ],
    )?;
    connection.execute(
        "INSERT INTO T_DictVersion VALUES (?1, ?2)",
        params!["stardict", "11"],
    )?;
    Ok(())
}

// --- Chunk building ---

struct IndexRow {
    headword: String,
    offset: i64,
    size: i64,
    chunk: i64,
}

/// Lay the definitions of `order` out into chunk buffers, producing one
/// index row per headword and (unless ignored) one per synonym pointing at
/// the same offset/size/chunk. The chunk advances once its cumulative size
/// exceeds `chunk_size`.
fn build_chunks(
    dictionary: &Dictionary,
    order: &[usize],
    ignore_synonyms: bool,
    chunk_size: u64,
) -> (Vec<Vec<u8>>, Vec<IndexRow>) {
    let mut chunks: Vec<Vec<u8>> = vec![Vec::new()];
    let mut index_rows = Vec::new();
    let mut current_offset: u64 = 0;
    let mut chunk: i64 = 1;
    for &position in order {
        let entry = &dictionary.entries()[position];
        let definition = entry.definition.as_bytes();
        let size = definition.len() as i64;
        // chunks and current_offset stay in step
        if let Some(current) = chunks.last_mut() {
            current.extend_from_slice(definition);
        }
        index_rows.push(IndexRow {
            headword: entry.headword.clone(),
            offset: current_offset as i64,
            size,
            chunk,
        });
        if !ignore_synonyms {
            for synonym in entry.synonyms() {
                index_rows.push(IndexRow {
                    headword: synonym.clone(),
                    offset: current_offset as i64,
                    size,
                    chunk,
                });
            }
        }
        current_offset += definition.len() as u64;
        if current_offset > chunk_size {
            chunks.push(Vec::new());
            chunk += 1;
            current_offset = 0;
        }
    }
    (chunks, index_rows)
}

// --- Input/output resolution ---

/// Resolve the input into (index path, dict path), extracting from a
/// `.install` zip when needed.
fn resolve_input(path: &Path, scratch: &Path) -> Result<(PathBuf, PathBuf)> {
    if path.extension().is_some_and(|ext| ext == "install") {
        debug!("Unzipping .install file");
        let mut archive = ZipArchive::new(File::open(path)?)?;
        let mut idx_path = None;
        let mut dict_path = None;
        for member_index in 0..archive.len() {
            let mut member = archive.by_index(member_index)?;
            let target = if member.name().ends_with(".dict.idx") {
                idx_path.get_or_insert(scratch.join("d.dict.idx")).clone()
            } else if member.name().ends_with(".dict") {
                dict_path.get_or_insert(scratch.join("d.dict")).clone()
            } else {
                continue;
            };
            let mut file = File::create(target)?;
            std::io::copy(&mut member, &mut file)?;
        }
        match (idx_path, dict_path) {
            (Some(idx), Some(dict)) => Ok((idx, dict)),
            _ => Err(DictError::MissingArtifact(
                ".dict.idx and .dict members in the .install file".to_string(),
            )),
        }
    } else {
        let dict = if path.extension().is_some_and(|ext| ext == "dict") {
            path.to_path_buf()
        } else {
            PathBuf::from(format!("{}.dict", path.display()))
        };
        let idx = PathBuf::from(format!("{}.idx", dict.display()));
        for file in [&idx, &dict] {
            if !file.is_file() {
                return Err(DictError::MissingArtifact(format!(
                    "file '{}'",
                    file.display()
                )));
            }
        }
        Ok((idx, dict))
    }
}

/// The output base name with any `.install` or `.zip` suffix stripped.
fn base_name(output_path: &Path) -> String {
    let name = output_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "dictionary".to_string());
    for suffix in [".install", ".zip"] {
        if let Some(stripped) = name.strip_suffix(suffix) {
            return stripped.to_string();
        }
    }
    name
}

fn package_output(
    scratch: &Path,
    idx_name: &str,
    dict_name: &str,
    base: &str,
    output_path: &Path,
    options: &ConvertOptions,
) -> Result<Vec<PathBuf>> {
    let parent = match output_path.parent() {
        Some(parent) if parent != Path::new("") => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)?;

    if options.bookeen_install_file {
        debug!("Creating .install file");
        let staged = scratch.join("package.install");
        let mut archive = ZipWriter::new(File::create(&staged)?);
        let zip_options = FileOptions::default().compression_method(CompressionMethod::Deflated);
        for member in [dict_name, idx_name] {
            archive.start_file(member, zip_options)?;
            let bytes = fs::read(scratch.join(member))?;
            archive.write_all(&bytes)?;
        }
        archive.finish()?;
        let target = parent.join(format!("{base}.install"));
        fs::copy(&staged, &target)?;
        info!("Wrote package {}", target.display());
        Ok(vec![target])
    } else {
        debug!("Copying .dict.idx and .dict files");
        let idx_target = parent.join(idx_name);
        let dict_target = parent.join(dict_name);
        fs::copy(scratch.join(idx_name), &idx_target)?;
        fs::copy(scratch.join(dict_name), &dict_target)?;
        info!("Wrote {} and {}", idx_target.display(), dict_target.display());
        Ok(vec![idx_target, dict_target])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order_of(dictionary: &Dictionary) -> Vec<usize> {
        (0..dictionary.len()).collect()
    }

    #[test]
    fn chunks_split_when_threshold_is_exceeded() {
        let mut dictionary = Dictionary::default();
        dictionary.add_entry("a", "12345");
        dictionary.add_entry("b", "67890");
        dictionary.add_entry("c", "x");
        let (chunks, rows) = build_chunks(&dictionary, &order_of(&dictionary), false, 4);
        // 5 bytes exceed the threshold of 4, so each entry opens a new chunk
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0], b"12345");
        assert_eq!(chunks[1], b"67890");
        assert_eq!(chunks[2], b"x");
        let placements: Vec<(i64, i64)> = rows.iter().map(|r| (r.chunk, r.offset)).collect();
        assert_eq!(placements, vec![(1, 0), (2, 0), (3, 0)]);
    }

    #[test]
    fn definitions_are_never_split_across_chunks() {
        let mut dictionary = Dictionary::default();
        dictionary.add_entry("a", "12");
        dictionary.add_entry("b", "3456789");
        let (chunks, rows) = build_chunks(&dictionary, &order_of(&dictionary), false, 4);
        // the second definition lands whole in chunk 1, then the chunk closes
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], b"123456789");
        assert!(chunks[1].is_empty());
        assert_eq!(rows[1].offset, 2);
        assert_eq!(rows[1].chunk, 1);
    }

    #[test]
    fn synonym_rows_share_the_entry_placement() {
        let mut dictionary = Dictionary::default();
        dictionary.add_entry("colour", "a hue");
        dictionary.add_synonym("color", 0);
        let (_, rows) = build_chunks(&dictionary, &order_of(&dictionary), false, CHUNK_SIZE);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].headword, "color");
        assert_eq!((rows[1].offset, rows[1].size, rows[1].chunk), (rows[0].offset, rows[0].size, rows[0].chunk));
    }

    #[test]
    fn ignoring_synonyms_skips_their_rows() {
        let mut dictionary = Dictionary::default();
        dictionary.add_entry("colour", "a hue");
        dictionary.add_synonym("color", 0);
        let (_, rows) = build_chunks(&dictionary, &order_of(&dictionary), true, CHUNK_SIZE);
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn base_name_strips_packaging_suffixes() {
        assert_eq!(base_name(Path::new("/out/mydict.install")), "mydict");
        assert_eq!(base_name(Path::new("/out/mydict.zip")), "mydict");
        assert_eq!(base_name(Path::new("mydict")), "mydict");
    }
}
