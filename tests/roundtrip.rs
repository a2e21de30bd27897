//! End-to-end tests: write real packages into temp dirs and read them back.

use std::fs;
use std::sync::Arc;

use byteorder::{BigEndian, WriteBytesExt};
use tempfile::TempDir;

use dictconv::dict::{bookeen, stardict};
use dictconv::{ConvertOptions, DictCompression, Dictionary, GermanCollation};

fn sample_dictionary() -> Dictionary {
    let mut dictionary = Dictionary::default();
    dictionary.add_entry("apple", "a fruit");
    dictionary.add_entry("Banana", "a longer fruit");
    dictionary.add_entry("cherry", "a small fruit");
    dictionary.metadata.title = Some("Fruits".to_string());
    dictionary.metadata.language_from = Some("en".to_string());
    dictionary.metadata.language_to = Some("en".to_string());
    dictionary
}

fn pairs(dictionary: &Dictionary) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = dictionary
        .entries()
        .iter()
        .map(|entry| (entry.headword.clone(), entry.definition.clone()))
        .collect();
    pairs.sort();
    pairs
}

#[test]
fn stardict_zip_roundtrip_preserves_entries() {
    let dir = TempDir::new().unwrap();
    let package = dir.path().join("fruits.zip");
    let options = ConvertOptions::default();

    let mut source = sample_dictionary();
    let placed = stardict::write(&mut source, &package, &options).unwrap();
    assert_eq!(placed, vec![package.clone()]);

    let mut target = Dictionary::default();
    stardict::read(&mut target, &package, &options).unwrap();
    assert_eq!(pairs(&target), pairs(&source));
}

#[test]
fn stardict_directory_output_holds_the_expected_files() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("unpacked");
    let options = ConvertOptions::default();

    let mut source = sample_dictionary();
    let placed = stardict::write(&mut source, &output, &options).unwrap();
    let names: Vec<String> = placed
        .iter()
        .map(|path| path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["unpacked.ifo", "unpacked.idx", "unpacked.dict"]);
    for path in &placed {
        assert!(path.is_file());
    }

    // a directory package reads back like a zip package
    let mut target = Dictionary::default();
    stardict::read(&mut target, &output, &options).unwrap();
    assert_eq!(pairs(&target), pairs(&source));
}

#[test]
fn stardict_gzip_compressed_dict_reads_back() {
    let dir = TempDir::new().unwrap();
    let package = dir.path().join("fruits.zip");
    let options = ConvertOptions {
        dict_compression: DictCompression::Gzip,
        ..ConvertOptions::default()
    };

    let mut source = sample_dictionary();
    stardict::write(&mut source, &package, &options).unwrap();

    let mut target = Dictionary::default();
    stardict::read(&mut target, &package, &ConvertOptions::default()).unwrap();
    assert_eq!(pairs(&target), pairs(&source));
}

#[test]
fn stardict_synonyms_roundtrip_to_their_entries() {
    let dir = TempDir::new().unwrap();
    let package = dir.path().join("syn.zip");
    let options = ConvertOptions::default();

    let mut source = sample_dictionary();
    source.add_synonym("pomme", 0);
    source.add_synonym("kirsche", 2);
    stardict::write(&mut source, &package, &options).unwrap();

    let mut target = Dictionary::default();
    stardict::read(&mut target, &package, &options).unwrap();
    assert!(target.has_synonyms());
    let apple = target
        .entries()
        .iter()
        .find(|entry| entry.headword == "apple")
        .unwrap();
    assert_eq!(apple.synonyms(), &["pomme"]);
    let cherry = target
        .entries()
        .iter()
        .find(|entry| entry.headword == "cherry")
        .unwrap();
    assert_eq!(cherry.synonyms(), &["kirsche"]);
}

#[test]
fn stardict_ignore_synonyms_skips_the_syn_file() {
    let dir = TempDir::new().unwrap();
    let package = dir.path().join("syn.zip");

    let mut source = sample_dictionary();
    source.add_synonym("pomme", 0);
    stardict::write(&mut source, &package, &ConvertOptions::default()).unwrap();

    let options = ConvertOptions {
        ignore_synonyms: true,
        ..ConvertOptions::default()
    };
    let mut target = Dictionary::default();
    stardict::read(&mut target, &package, &options).unwrap();
    assert!(!target.has_synonyms());
}

#[test]
fn stardict_out_of_range_synonym_is_dropped_not_fatal() {
    // hand-built package: 1 entry, .syn record pointing at entry 5
    let dir = TempDir::new().unwrap();
    let package = dir.path().join("broken");
    fs::create_dir(&package).unwrap();

    let mut idx: Vec<u8> = Vec::new();
    idx.extend_from_slice(b"cat\0");
    idx.write_i32::<BigEndian>(0).unwrap();
    idx.write_i32::<BigEndian>(8).unwrap();
    fs::write(package.join("d.idx"), &idx).unwrap();
    fs::write(package.join("d.dict"), b"a feline").unwrap();

    let mut syn: Vec<u8> = Vec::new();
    syn.extend_from_slice(b"kitty\0");
    syn.write_i32::<BigEndian>(5).unwrap();
    fs::write(package.join("d.syn"), &syn).unwrap();

    let ifo = "StarDict's dict ifo file\nversion=2.4.2\nbookname=Broken\nwordcount=1\nidxfilesize=12\nsametypesequence=m\nsynwordcount=1\n";
    fs::write(package.join("d.ifo"), ifo).unwrap();

    let mut target = Dictionary::default();
    stardict::read(&mut target, &package, &ConvertOptions::default()).unwrap();
    assert_eq!(target.len(), 1);
    assert_eq!(target.get_definitions("cat"), vec!["a feline"]);
    assert!(!target.has_synonyms());
}

#[test]
fn stardict_package_without_ifo_is_a_format_error() {
    let dir = TempDir::new().unwrap();
    let package = dir.path().join("empty");
    fs::create_dir(&package).unwrap();
    let mut target = Dictionary::default();
    let error = stardict::read(&mut target, &package, &ConvertOptions::default()).unwrap_err();
    assert!(error.to_string().contains(".ifo"));
}

#[test]
fn bookeen_pair_roundtrip_preserves_entries() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("fruits");
    let options = ConvertOptions::default();

    let source = sample_dictionary();
    let placed = bookeen::write(&source, &output, &options).unwrap();
    let names: Vec<String> = placed
        .iter()
        .map(|path| path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["fruits.dict.idx", "fruits.dict"]);

    let mut target = Dictionary::default();
    bookeen::read(&mut target, &output, &options).unwrap();
    assert_eq!(pairs(&target), pairs(&source));
}

#[test]
fn bookeen_install_roundtrip_preserves_entries() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("fruits.install");
    let options = ConvertOptions {
        bookeen_install_file: true,
        ..ConvertOptions::default()
    };

    let source = sample_dictionary();
    let placed = bookeen::write(&source, &output, &options).unwrap();
    assert_eq!(placed, vec![output.clone()]);

    let mut target = Dictionary::default();
    bookeen::read(&mut target, &output, &ConvertOptions::default()).unwrap();
    assert_eq!(pairs(&target), pairs(&source));
}

#[test]
fn bookeen_synonyms_become_rows_with_the_same_definition() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("syn");
    let options = ConvertOptions::default();

    let mut source = sample_dictionary();
    source.add_synonym("pomme", 0);
    bookeen::write(&source, &output, &options).unwrap();

    let mut target = Dictionary::default();
    bookeen::read(&mut target, &output, &options).unwrap();
    assert_eq!(target.len(), 4);
    assert_eq!(target.get_definitions("pomme"), vec!["a fruit"]);
    assert_eq!(target.get_definitions("apple"), vec!["a fruit"]);
}

#[test]
fn bookeen_rows_follow_the_registered_collation() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("german");
    let options = ConvertOptions {
        collation: Arc::new(GermanCollation),
        ..ConvertOptions::default()
    };

    let mut source = Dictionary::default();
    source.add_entry("Zug", "train");
    source.add_entry("Öl", "oil");
    source.add_entry("Ofen", "oven");
    bookeen::write(&source, &output, &options).unwrap();

    // rows come back in insertion order, which followed the collation
    let mut target = Dictionary::default();
    bookeen::read(&mut target, &output, &ConvertOptions::default()).unwrap();
    let headwords: Vec<&str> = target
        .entries()
        .iter()
        .map(|entry| entry.headword.as_str())
        .collect();
    assert_eq!(headwords, vec!["Ofen", "Öl", "Zug"]);
}

#[test]
fn stardict_to_bookeen_conversion() {
    let dir = TempDir::new().unwrap();
    let stardict_package = dir.path().join("fruits.zip");
    let bookeen_output = dir.path().join("converted");
    let options = ConvertOptions::default();

    let mut source = sample_dictionary();
    stardict::write(&mut source, &stardict_package, &options).unwrap();

    let mut intermediate = Dictionary::default();
    stardict::read(&mut intermediate, &stardict_package, &options).unwrap();
    bookeen::write(&intermediate, &bookeen_output, &options).unwrap();

    let mut target = Dictionary::default();
    bookeen::read(&mut target, &bookeen_output, &options).unwrap();
    assert_eq!(pairs(&target), pairs(&source));
}
