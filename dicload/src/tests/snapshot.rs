use std::fs::File;
use std::io::{BufReader, BufWriter};

use tempfile::NamedTempFile;

use crate::dictionary::{DynamicDictionaries, SNAPSHOT_MAGIC};
use crate::errors::LoaderError;
use crate::loader::DictionaryLoader;
use crate::test_utils::sample_fetcher;

fn load_sample() -> DynamicDictionaries {
    DictionaryLoader::new("dic", sample_fetcher("dic"))
        .unwrap()
        .load()
        .unwrap()
}

#[test]
fn test_snapshot_roundtrip() {
    let dict = load_sample();

    let file = NamedTempFile::new().unwrap();
    dict.write(BufWriter::new(file.reopen().unwrap())).unwrap();

    let restored =
        DynamicDictionaries::read(BufReader::new(File::open(file.path()).unwrap())).unwrap();
    assert_eq!(restored, dict);
    assert_eq!(restored.lookup_tokens("東京"), &[1]);
}

#[test]
fn test_snapshot_starts_with_magic() {
    let mut bytes = vec![];
    load_sample().write(&mut bytes).unwrap();
    assert!(bytes.starts_with(SNAPSHOT_MAGIC));
    assert_eq!(bytes[SNAPSHOT_MAGIC.len()], 0xFF);
}

#[test]
fn test_snapshot_bad_magic() {
    let mut bytes = vec![];
    load_sample().write(&mut bytes).unwrap();
    bytes[0] ^= 0xFF;

    let err = DynamicDictionaries::read(bytes.as_slice()).unwrap_err();
    assert!(matches!(err, LoaderError::InvalidFormat(_)));
}

#[test]
fn test_snapshot_corrupted_body() {
    let mut bytes = vec![];
    load_sample().write(&mut bytes).unwrap();
    bytes.truncate(bytes.len() / 2);

    let err = DynamicDictionaries::read(bytes.as_slice()).unwrap_err();
    assert!(matches!(err, LoaderError::InvalidState(_)));
}

fn read_back(dict: &DynamicDictionaries) -> Result<DynamicDictionaries, LoaderError> {
    let mut bytes = vec![];
    dict.write(&mut bytes).unwrap();
    DynamicDictionaries::read(bytes.as_slice())
}

fn expect_invalid_format(result: Result<DynamicDictionaries, LoaderError>, arg: &str) {
    match result {
        Err(LoaderError::InvalidFormat(e)) => assert_eq!(e.arg, arg),
        Err(e) => panic!("expected an invalid format error, got: {e}"),
        Ok(_) => panic!("a broken snapshot was accepted"),
    }
}

#[test]
fn test_snapshot_rejects_mismatched_matrix_dimensions() {
    let mut dict = load_sample();
    dict.connection_costs.forward_dimension = 5;
    dict.connection_costs.backward_dimension = 5;
    dict.connection_costs.buffer[0] = 5;
    dict.connection_costs.buffer[1] = 5;

    expect_invalid_format(read_back(&dict), "connection_costs");
}

#[test]
fn test_snapshot_rejects_header_disagreeing_with_dimensions() {
    let mut dict = load_sample();
    dict.connection_costs.buffer[0] = 1;

    expect_invalid_format(read_back(&dict), "connection_costs");
}

#[test]
fn test_snapshot_rejects_uneven_trie_arrays() {
    let mut dict = load_sample();
    dict.trie.check.pop();

    expect_invalid_format(read_back(&dict), "base");
}

#[test]
fn test_snapshot_rejects_unsorted_target_map() {
    let mut dict = load_sample();
    dict.token_info.target_map.reverse();

    expect_invalid_format(read_back(&dict), "target_map");
}

#[test]
fn test_snapshot_rejects_missing_categories() {
    let mut dict = load_sample();
    dict.unknown.character_definition.classes.clear();

    expect_invalid_format(read_back(&dict), "invoke_definitions");
}

#[test]
fn test_snapshot_rejects_undefined_category() {
    let mut dict = load_sample();
    dict.unknown.character_definition.category_map[usize::from(b'x')] = 9;

    expect_invalid_format(read_back(&dict), "category_map");
}
