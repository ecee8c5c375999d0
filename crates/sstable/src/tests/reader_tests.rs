use crate::format::FOOTER_SIZE;
use crate::{Lookup, SsTableReader, SsTableWriter, SstError};
use memtable::Entry;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn put(key: &[u8], value: &[u8]) -> Entry {
    Entry {
        key: key.to_vec(),
        value: value.to_vec(),
        tombstone: false,
    }
}

fn tomb(key: &[u8]) -> Entry {
    Entry {
        key: key.to_vec(),
        value: Vec::new(),
        tombstone: true,
    }
}

fn write_sample(dir: &Path) -> PathBuf {
    let path = dir.join("sample.sst");
    let entries = vec![put(b"a", b"1"), put(b"b", b"hello"), tomb(b"c")];
    SsTableWriter::write_table(&path, &entries).unwrap();
    path
}

/// 100 fixed-size records: "key000".."key099" -> "v". Each record is 16
/// bytes, so record i starts at offset 8 + 16*i and the stride points are
/// key000/key032/key064/key096.
fn write_striped(dir: &Path) -> PathBuf {
    let path = dir.join("striped.sst");
    let entries: Vec<Entry> = (0..100)
        .map(|i| put(format!("key{:03}", i).as_bytes(), b"v"))
        .collect();
    SsTableWriter::write_table(&path, &entries).unwrap();
    path
}

// -------------------- Round trip --------------------

#[test]
fn get_found_deleted_and_not_found() {
    let dir = tempdir().unwrap();
    let path = write_sample(dir.path());

    assert_eq!(
        SsTableReader::get(&path, b"a").unwrap(),
        Lookup::Found(b"1".to_vec())
    );
    assert_eq!(
        SsTableReader::get(&path, b"b").unwrap(),
        Lookup::Found(b"hello".to_vec())
    );
    assert_eq!(SsTableReader::get(&path, b"c").unwrap(), Lookup::Deleted);
    assert_eq!(SsTableReader::get(&path, b"z").unwrap(), Lookup::NotFound);
}

#[test]
fn every_key_in_large_table_is_found() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("large.sst");
    let entries: Vec<Entry> = (0..500)
        .map(|i| put(format!("key{:04}", i).as_bytes(), format!("val{}", i).as_bytes()))
        .collect();
    SsTableWriter::write_table(&path, &entries).unwrap();

    for i in 0..500 {
        let key = format!("key{:04}", i).into_bytes();
        let expected = format!("val{}", i).into_bytes();
        assert_eq!(
            SsTableReader::get(&path, &key).unwrap(),
            Lookup::Found(expected),
            "key{:04} wrong",
            i
        );
    }
}

#[test]
fn absent_keys_between_present_ones_miss_cleanly() {
    let dir = tempdir().unwrap();
    let path = write_striped(dir.path());

    // Sorts after key050 but before key051, inside a stride block.
    assert_eq!(
        SsTableReader::get(&path, b"key050x").unwrap(),
        Lookup::NotFound
    );
    // Before every key.
    assert_eq!(SsTableReader::get(&path, b"aaa").unwrap(), Lookup::NotFound);
}

#[test]
fn empty_value_is_distinct_from_tombstone() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("t.sst");
    SsTableWriter::write_table(&path, &[put(b"empty", b""), tomb(b"gone")]).unwrap();

    assert_eq!(
        SsTableReader::get(&path, b"empty").unwrap(),
        Lookup::Found(Vec::new())
    );
    assert_eq!(SsTableReader::get(&path, b"gone").unwrap(), Lookup::Deleted);
}

#[test]
fn large_value_roundtrip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("big.sst");
    let big = vec![b'x'; 500_000];
    SsTableWriter::write_table(&path, &[put(b"big", &big)]).unwrap();

    assert_eq!(
        SsTableReader::get(&path, b"big").unwrap(),
        Lookup::Found(big)
    );
}

#[test]
fn empty_table_misses_everything() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("empty.sst");
    SsTableWriter::write_table(&path, &[]).unwrap();

    assert_eq!(SsTableReader::get(&path, b"any").unwrap(), Lookup::NotFound);
}

// -------------------- Header validation --------------------

#[test]
fn zeroed_header_is_corrupt() {
    let dir = tempdir().unwrap();
    let path = write_sample(dir.path());

    let mut data = fs::read(&path).unwrap();
    for b in data.iter_mut().take(8) {
        *b = 0;
    }
    fs::write(&path, &data).unwrap();

    let result = SsTableReader::get(&path, b"a");
    assert!(matches!(result, Err(SstError::Corrupt)));
}

#[test]
fn all_zero_file_is_corrupt() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("zero.sst");
    fs::write(&path, vec![0u8; 64]).unwrap();

    let result = SsTableReader::get(&path, b"any");
    assert!(matches!(result, Err(SstError::Corrupt)));
}

#[test]
fn truncated_file_is_corrupt() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tiny.sst");
    fs::write(&path, b"short").unwrap();

    let result = SsTableReader::get(&path, b"any");
    assert!(matches!(result, Err(SstError::Corrupt)));
}

#[test]
fn missing_file_is_io_error() {
    let result = SsTableReader::get(Path::new("/no/such/file.sst"), b"k");
    assert!(matches!(result, Err(SstError::Io(_))));
}

// -------------------- Footer validation --------------------

#[test]
fn footer_offsets_outside_file_are_corrupt() {
    let dir = tempdir().unwrap();
    let path = write_sample(dir.path());

    let mut data = fs::read(&path).unwrap();
    let footer_start = data.len() - FOOTER_SIZE as usize;
    data[footer_start..footer_start + 8].copy_from_slice(&u64::MAX.to_le_bytes());
    fs::write(&path, &data).unwrap();

    let result = SsTableReader::get(&path, b"a");
    assert!(matches!(result, Err(SstError::Corrupt)));
}

#[test]
fn footer_with_bloom_before_index_is_corrupt() {
    let dir = tempdir().unwrap();
    let path = write_sample(dir.path());

    let mut data = fs::read(&path).unwrap();
    let footer_start = data.len() - FOOTER_SIZE as usize;
    let index_start = u64::from_le_bytes(data[footer_start..footer_start + 8].try_into().unwrap());
    // bloom_start <= index_start violates the region ordering
    data[footer_start + 8..footer_start + 16].copy_from_slice(&index_start.to_le_bytes());
    fs::write(&path, &data).unwrap();

    let result = SsTableReader::get(&path, b"a");
    assert!(matches!(result, Err(SstError::Corrupt)));
}

// -------------------- Bloom short-circuit --------------------

#[test]
fn bloom_negative_survives_damaged_index() {
    let dir = tempdir().unwrap();
    let path = write_striped(dir.path());

    // Overwrite the whole index region with garbage.
    let mut data = fs::read(&path).unwrap();
    let footer_start = data.len() - FOOTER_SIZE as usize;
    let index_start =
        u64::from_le_bytes(data[footer_start..footer_start + 8].try_into().unwrap()) as usize;
    let bloom_start =
        u64::from_le_bytes(data[footer_start + 8..footer_start + 16].try_into().unwrap()) as usize;
    for b in &mut data[index_start..bloom_start] {
        *b = 0xFF;
    }
    fs::write(&path, &data).unwrap();

    // A key the bloom filter excludes must still miss cleanly...
    assert_eq!(
        SsTableReader::get(&path, b"definitely-not-present").unwrap(),
        Lookup::NotFound
    );
    // ...while a key that passes the filter now hits the damaged index.
    let result = SsTableReader::get(&path, b"key050");
    assert!(matches!(result, Err(SstError::Corrupt)));
}

// -------------------- Index narrowing --------------------

#[test]
fn scan_range_ignores_damage_before_it() {
    let dir = tempdir().unwrap();
    let path = write_striped(dir.path());

    // key050 lives in the stride block [key032, key064): bytes
    // [8 + 16*32, 8 + 16*64). Damage everything before that block.
    let start = 8 + 16 * 32;
    let mut data = fs::read(&path).unwrap();
    for b in &mut data[8..start] {
        *b = 0xAA;
    }
    fs::write(&path, &data).unwrap();

    assert_eq!(
        SsTableReader::get(&path, b"key050").unwrap(),
        Lookup::Found(b"v".to_vec())
    );
}

#[test]
fn damage_inside_scan_range_is_corrupt() {
    let dir = tempdir().unwrap();
    let path = write_striped(dir.path());

    let start = 8 + 16 * 32;
    let end = 8 + 16 * 64;
    let mut data = fs::read(&path).unwrap();
    for b in &mut data[start..end] {
        *b = 0xFF;
    }
    fs::write(&path, &data).unwrap();

    let result = SsTableReader::get(&path, b"key050");
    assert!(matches!(result, Err(SstError::Corrupt)));
}

#[test]
fn zeroed_scan_range_is_corrupt() {
    let dir = tempdir().unwrap();
    let path = write_striped(dir.path());

    let start = 8 + 16 * 32;
    let end = 8 + 16 * 64;
    let mut data = fs::read(&path).unwrap();
    for b in &mut data[start..end] {
        *b = 0;
    }
    fs::write(&path, &data).unwrap();

    let result = SsTableReader::get(&path, b"key050");
    assert!(matches!(result, Err(SstError::Corrupt)));
}

// -------------------- Record invariants --------------------

#[test]
fn tombstone_with_nonzero_val_len_is_corrupt_on_read() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("t.sst");
    SsTableWriter::write_table(&path, &[put(b"a", b"1")]).unwrap();

    // Record at offset 8: key_len(4) val_len(4) tomb(1). Flip tomb to 1
    // while val_len stays 1.
    let mut data = fs::read(&path).unwrap();
    data[16] = 1;
    fs::write(&path, &data).unwrap();

    let result = SsTableReader::get(&path, b"a");
    assert!(matches!(result, Err(SstError::Corrupt)));
}

#[test]
fn garbage_tomb_byte_is_corrupt() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("t.sst");
    SsTableWriter::write_table(&path, &[put(b"a", b"1")]).unwrap();

    let mut data = fs::read(&path).unwrap();
    data[16] = 9;
    fs::write(&path, &data).unwrap();

    let result = SsTableReader::get(&path, b"a");
    assert!(matches!(result, Err(SstError::Corrupt)));
}

// -------------------- Index validation --------------------

#[test]
fn non_ascending_index_keys_are_corrupt() {
    let dir = tempdir().unwrap();
    let path = write_striped(dir.path());

    let mut data = fs::read(&path).unwrap();
    let footer_start = data.len() - FOOTER_SIZE as usize;
    let index_start =
        u64::from_le_bytes(data[footer_start..footer_start + 8].try_into().unwrap()) as usize;

    // Entry layout: count(4) then [key_len(4) key(6) offset(8)] each.
    // Swap the keys of entries 0 and 1 to break the ordering.
    let e0_key = index_start + 4 + 4;
    let e1_key = index_start + 4 + 18 + 4;
    let k0: Vec<u8> = data[e0_key..e0_key + 6].to_vec();
    let k1: Vec<u8> = data[e1_key..e1_key + 6].to_vec();
    data[e0_key..e0_key + 6].copy_from_slice(&k1);
    data[e1_key..e1_key + 6].copy_from_slice(&k0);
    fs::write(&path, &data).unwrap();

    // key050 passes the bloom filter, forcing an index load.
    let result = SsTableReader::get(&path, b"key050");
    assert!(matches!(result, Err(SstError::Corrupt)));
}

#[test]
fn index_offset_outside_data_region_is_corrupt() {
    let dir = tempdir().unwrap();
    let path = write_striped(dir.path());

    let mut data = fs::read(&path).unwrap();
    let footer_start = data.len() - FOOTER_SIZE as usize;
    let index_start =
        u64::from_le_bytes(data[footer_start..footer_start + 8].try_into().unwrap()) as usize;

    // Point entry 0's offset at the footer.
    let e0_offset = index_start + 4 + 4 + 6;
    data[e0_offset..e0_offset + 8].copy_from_slice(&(footer_start as u64).to_le_bytes());
    fs::write(&path, &data).unwrap();

    let result = SsTableReader::get(&path, b"key050");
    assert!(matches!(result, Err(SstError::Corrupt)));
}

#[test]
fn impossible_index_count_is_corrupt() {
    let dir = tempdir().unwrap();
    let path = write_striped(dir.path());

    let mut data = fs::read(&path).unwrap();
    let footer_start = data.len() - FOOTER_SIZE as usize;
    let index_start =
        u64::from_le_bytes(data[footer_start..footer_start + 8].try_into().unwrap()) as usize;

    // index_count far above the 2^20 cap.
    data[index_start..index_start + 4].copy_from_slice(&u32::MAX.to_le_bytes());
    fs::write(&path, &data).unwrap();

    let result = SsTableReader::get(&path, b"key050");
    assert!(matches!(result, Err(SstError::Corrupt)));
}

#[test]
fn zero_index_count_with_entries_is_corrupt() {
    let dir = tempdir().unwrap();
    let path = write_striped(dir.path());

    let mut data = fs::read(&path).unwrap();
    let footer_start = data.len() - FOOTER_SIZE as usize;
    let index_start =
        u64::from_le_bytes(data[footer_start..footer_start + 8].try_into().unwrap()) as usize;

    data[index_start..index_start + 4].copy_from_slice(&0u32.to_le_bytes());
    fs::write(&path, &data).unwrap();

    let result = SsTableReader::get(&path, b"key050");
    assert!(matches!(result, Err(SstError::Corrupt)));
}

// -------------------- Bloom region validation --------------------

#[test]
fn zeroed_bloom_parameters_are_corrupt() {
    let dir = tempdir().unwrap();
    let path = write_sample(dir.path());

    let mut data = fs::read(&path).unwrap();
    let footer_start = data.len() - FOOTER_SIZE as usize;
    let bloom_start =
        u64::from_le_bytes(data[footer_start + 8..footer_start + 16].try_into().unwrap()) as usize;

    // m = 0 is invalid.
    data[bloom_start..bloom_start + 4].copy_from_slice(&0u32.to_le_bytes());
    fs::write(&path, &data).unwrap();

    let result = SsTableReader::get(&path, b"a");
    assert!(matches!(result, Err(SstError::Corrupt)));
}
