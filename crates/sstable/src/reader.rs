use bloom::BloomFilter;
use byteorder::{LittleEndian, ReadBytesExt};
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use crate::format::{Footer, FOOTER_SIZE, HEADER_SIZE, MAX_INDEX_COUNT, MAX_KEY_BYTES, SSTABLE_MAGIC};
use crate::{Lookup, SstError};

/// Size of the read-side buffer.
const READ_BUF_SIZE: usize = 64 * 1024;

/// One sparse-index entry: the key of a stride record and its absolute file
/// offset.
struct IndexEntry {
    key: Vec<u8>,
    offset: u64,
}

pub struct SsTableReader;

impl SsTableReader {
    /// Point lookup of `target` in the SSTable at `path`.
    ///
    /// The file is opened, read, and closed within this call; no state is
    /// kept between lookups.
    ///
    /// # Lookup order
    ///
    /// 1. Validate the header magic and read the entry count.
    /// 2. Validate the footer against the file size.
    /// 3. Check the bloom filter; a negative answer returns
    ///    [`Lookup::NotFound`] without ever loading the index.
    /// 4. Load and validate the sparse index.
    /// 5. Scan the narrowed record range `[start, end)` for the target.
    ///
    /// # Errors
    ///
    /// [`SstError::Io`] if the file cannot be opened or stat'ed;
    /// [`SstError::Corrupt`] for any format violation (see [`SstError`]).
    pub fn get(path: &Path, target: &[u8]) -> Result<Lookup, SstError> {
        let mut f = File::open(path)?;

        // 1) Header.
        let magic = f.read_u32::<LittleEndian>().map_err(|_| SstError::Corrupt)?;
        if magic != SSTABLE_MAGIC {
            return Err(SstError::Corrupt);
        }
        let count = f.read_u32::<LittleEndian>().map_err(|_| SstError::Corrupt)?;

        // 2) Footer.
        let file_size = f.metadata()?.len();
        let footer = Footer::read(&mut f, file_size)?;

        // 3) Bloom filter, checked before the index so a negative lookup
        //    succeeds even when the index region is damaged.
        let bloom_len = (file_size - FOOTER_SIZE - footer.bloom_start) as usize;
        f.seek(SeekFrom::Start(footer.bloom_start))?;
        let mut bloom_bytes = vec![0u8; bloom_len];
        f.read_exact(&mut bloom_bytes).map_err(|_| SstError::Corrupt)?;
        let filter = BloomFilter::from_bytes(&bloom_bytes).ok_or(SstError::Corrupt)?;
        if !filter.may_contain(target) {
            return Ok(Lookup::NotFound);
        }

        // 4) Sparse index.
        let index = load_index(&mut f, &footer, count)?;
        if index.is_empty() {
            return Ok(Lookup::NotFound);
        }

        // 5) Bounded scan.
        let (start, end) = pick_scan_range(&index, footer.index_start, target);
        scan_range(&mut f, start, end, target)
    }
}

/// Loads the sparse index, validating counts, key sizes, offsets, and strict
/// key ordering.
fn load_index(f: &mut File, footer: &Footer, entry_count: u32) -> Result<Vec<IndexEntry>, SstError> {
    f.seek(SeekFrom::Start(footer.index_start))?;
    let mut r = BufReader::with_capacity(READ_BUF_SIZE, f);

    let index_count = r.read_u32::<LittleEndian>().map_err(|_| SstError::Corrupt)?;
    if index_count > MAX_INDEX_COUNT {
        return Err(SstError::Corrupt);
    }
    if index_count == 0 {
        // A non-empty table must index at least record 0.
        if entry_count > 0 {
            return Err(SstError::Corrupt);
        }
        return Ok(Vec::new());
    }

    let mut entries: Vec<IndexEntry> = Vec::with_capacity(index_count as usize);
    for _ in 0..index_count {
        let key_len = r.read_u32::<LittleEndian>().map_err(|_| SstError::Corrupt)?;
        if key_len == 0 || key_len > MAX_KEY_BYTES {
            return Err(SstError::Corrupt);
        }
        let mut key = vec![0u8; key_len as usize];
        r.read_exact(&mut key).map_err(|_| SstError::Corrupt)?;

        let offset = r.read_u64::<LittleEndian>().map_err(|_| SstError::Corrupt)?;
        // Every indexed record must lie inside the data region.
        if offset < HEADER_SIZE || offset >= footer.index_start {
            return Err(SstError::Corrupt);
        }

        if let Some(prev) = entries.last() {
            if prev.key >= key {
                return Err(SstError::Corrupt);
            }
        }
        entries.push(IndexEntry { key, offset });
    }

    Ok(entries)
}

/// Picks the scan range `[start, end)` for `target`.
///
/// `start` is the offset of the greatest index entry whose key is <= target
/// (entry 0 if the target precedes every index key); `end` is the next index
/// entry's offset when that narrows the range, else the end of the data
/// region.
fn pick_scan_range(index: &[IndexEntry], index_start: u64, target: &[u8]) -> (u64, u64) {
    let mut end = index_start;

    let pos = index.partition_point(|e| e.key.as_slice() <= target);
    let i = pos.saturating_sub(1);
    let start = index[i].offset;

    if i + 1 < index.len() {
        let next = index[i + 1].offset;
        if next > start && next < end {
            end = next;
        }
    }
    (start, end)
}

/// Sequentially decodes records in `[start, end)` looking for `target`.
///
/// The data region is sorted, so the scan stops as soon as a key greater
/// than the target appears.
fn scan_range(f: &mut File, start: u64, end: u64, target: &[u8]) -> Result<Lookup, SstError> {
    f.seek(SeekFrom::Start(start))?;
    let mut r = BufReader::with_capacity(READ_BUF_SIZE, f);

    let mut pos = start;
    while pos < end {
        let key_len = r.read_u32::<LittleEndian>().map_err(|_| SstError::Corrupt)?;
        let val_len = r.read_u32::<LittleEndian>().map_err(|_| SstError::Corrupt)?;
        let tomb = r.read_u8().map_err(|_| SstError::Corrupt)?;

        if key_len == 0 || key_len > MAX_KEY_BYTES {
            return Err(SstError::Corrupt);
        }
        if tomb > 1 || (tomb == 1 && val_len != 0) {
            return Err(SstError::Corrupt);
        }
        let record_len = 9 + key_len as u64 + val_len as u64;
        if pos + record_len > end {
            // Records never straddle a stride boundary or the index region.
            return Err(SstError::Corrupt);
        }

        let mut key = vec![0u8; key_len as usize];
        r.read_exact(&mut key).map_err(|_| SstError::Corrupt)?;
        let mut value = Vec::new();
        if val_len > 0 {
            value = vec![0u8; val_len as usize];
            r.read_exact(&mut value).map_err(|_| SstError::Corrupt)?;
        }

        if key.as_slice() == target {
            return Ok(if tomb == 1 {
                Lookup::Deleted
            } else {
                Lookup::Found(value)
            });
        }
        if key.as_slice() > target {
            return Ok(Lookup::NotFound);
        }

        pos += record_len;
    }

    Ok(Lookup::NotFound)
}
