use bloom::BloomFilter;
use byteorder::{LittleEndian, WriteBytesExt};
use memtable::Entry;
use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::format::{BLOOM_BITS, BLOOM_HASHES, INDEX_STRIDE, SSTABLE_MAGIC};
use crate::SstError;

/// Size of the write-side buffer.
const WRITE_BUF_SIZE: usize = 64 * 1024;

/// Tracks the absolute file offset across buffered writes.
///
/// `BufWriter` hides the underlying position, but the sparse index and the
/// footer both need absolute offsets of bytes that are still sitting in the
/// buffer, so the writer counts every byte it accepts.
struct CountingWriter<W: Write> {
    inner: W,
    offset: u64,
}

impl<W: Write> CountingWriter<W> {
    fn new(inner: W) -> Self {
        Self { inner, offset: 0 }
    }

    fn offset(&self) -> u64 {
        self.offset
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.offset += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

pub struct SsTableWriter;

impl SsTableWriter {
    /// Writes one SSTable at `path` from entries already sorted ascending by
    /// key (each key exactly once). Tombstones are written with `val_len = 0`;
    /// a tombstone entry carrying value bytes is rejected.
    ///
    /// The file is written in place -- atomic publish (write to a temp path,
    /// then rename) is the caller's concern.
    pub fn write_table(path: &Path, entries: &[Entry]) -> Result<(), SstError> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        let mut w = CountingWriter::new(BufWriter::with_capacity(WRITE_BUF_SIZE, file));

        // 1) Header: magic + entry count.
        w.write_u32::<LittleEndian>(SSTABLE_MAGIC)?;
        w.write_u32::<LittleEndian>(entries.len() as u32)?;

        let mut filter = BloomFilter::new(BLOOM_BITS, BLOOM_HASHES);
        let mut index: Vec<(&[u8], u64)> = Vec::new();

        // 2) Data region, noting every stride-th record offset.
        for (i, e) in entries.iter().enumerate() {
            if e.tombstone && !e.value.is_empty() {
                return Err(SstError::Io(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "tombstone entry carries value bytes",
                )));
            }

            let offset = w.offset();
            if i % INDEX_STRIDE == 0 {
                index.push((e.key.as_slice(), offset));
            }

            w.write_u32::<LittleEndian>(e.key.len() as u32)?;
            w.write_u32::<LittleEndian>(e.value.len() as u32)?;
            w.write_u8(e.tombstone as u8)?;
            w.write_all(&e.key)?;
            if !e.value.is_empty() {
                w.write_all(&e.value)?;
            }

            filter.insert(&e.key);
        }

        // 3) Sparse index.
        let index_start = w.offset();
        w.write_u32::<LittleEndian>(index.len() as u32)?;
        for (key, offset) in &index {
            w.write_u32::<LittleEndian>(key.len() as u32)?;
            w.write_all(key)?;
            w.write_u64::<LittleEndian>(*offset)?;
        }

        // 4) Bloom filter.
        let bloom_start = w.offset();
        filter.write_to(&mut w)?;

        // 5) Footer.
        w.write_u64::<LittleEndian>(index_start)?;
        w.write_u64::<LittleEndian>(bloom_start)?;

        w.flush()?;
        Ok(())
    }
}
