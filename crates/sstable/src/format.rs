//! Format constants and footer handling shared by the writer and reader.

use byteorder::{LittleEndian, ReadBytesExt};
use std::fs::File;
use std::io::{Seek, SeekFrom};

use crate::SstError;

/// Magic identifying a ForgeDB SSTable ("FSDB").
pub const SSTABLE_MAGIC: u32 = 0x4653_4442;

/// magic (u32) + count (u32).
pub const HEADER_SIZE: u64 = 8;

/// index_start_offset (u64) + bloom_start_offset (u64).
pub const FOOTER_SIZE: u64 = 16;

/// One sparse-index entry is emitted per this many data records.
pub const INDEX_STRIDE: usize = 32;

/// Bloom filter sizing for freshly written tables.
pub const BLOOM_BITS: u32 = 1 << 20;
pub const BLOOM_HASHES: u8 = 7;

/// Caps on attacker-controlled counts, so a malformed file cannot force an
/// enormous allocation.
pub(crate) const MAX_INDEX_COUNT: u32 = 1 << 20;
pub(crate) const MAX_KEY_BYTES: u32 = 1 << 20;

/// Parsed footer: absolute start offsets of the index and bloom regions.
pub(crate) struct Footer {
    pub index_start: u64,
    pub bloom_start: u64,
}

impl Footer {
    /// Reads and validates the footer from the last 16 bytes of the file.
    ///
    /// Region layout must satisfy
    /// `HEADER_SIZE <= index_start < bloom_start < file_size - FOOTER_SIZE`;
    /// anything else is corruption.
    pub(crate) fn read(f: &mut File, file_size: u64) -> Result<Self, SstError> {
        if file_size < HEADER_SIZE + FOOTER_SIZE {
            return Err(SstError::Corrupt);
        }
        let footer_start = file_size - FOOTER_SIZE;

        f.seek(SeekFrom::Start(footer_start))?;
        let index_start = f.read_u64::<LittleEndian>().map_err(|_| SstError::Corrupt)?;
        let bloom_start = f.read_u64::<LittleEndian>().map_err(|_| SstError::Corrupt)?;

        if index_start < HEADER_SIZE || index_start >= footer_start {
            return Err(SstError::Corrupt);
        }
        if bloom_start <= index_start || bloom_start >= footer_start {
            return Err(SstError::Corrupt);
        }

        Ok(Self {
            index_start,
            bloom_start,
        })
    }
}
