//! # SSTable - Sorted String Table
//!
//! Immutable, on-disk storage files for the ForgeDB storage engine.
//!
//! When the engine flushes, the memtable is drained in key order and written
//! out as one SSTable. SSTables are *write-once, read-many* -- once published
//! they are never modified.
//!
//! ## File layout
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │ HEADER (8 bytes)                                              │
//! │   magic (u32 = 0x46534442) | count (u32)                      │
//! ├───────────────────────────────────────────────────────────────┤
//! │ DATA REGION (count records, ascending key order)              │
//! │                                                               │
//! │   key_len (u32) | val_len (u32) | tomb (u8) | key | value     │
//! │                                                               │
//! │   Tombstones carry val_len = 0 and no value bytes.            │
//! ├───────────────────────────────────────────────────────────────┤
//! │ SPARSE INDEX (one entry per 32nd record, starting at 0)       │
//! │                                                               │
//! │   index_count (u32)                                           │
//! │   key_len (u32) | key | record_offset (u64)   ... repeated    │
//! ├───────────────────────────────────────────────────────────────┤
//! │ BLOOM FILTER (all keys; m = 2^20 bits, k = 7 taps)            │
//! │                                                               │
//! │   m (u32) | k (u8) | pad (3) | bitset_len (u32) | bitset      │
//! ├───────────────────────────────────────────────────────────────┤
//! │ FOOTER (always last 16 bytes)                                 │
//! │                                                               │
//! │   index_start_offset (u64) | bloom_start_offset (u64)         │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! All integers are little-endian; offsets are absolute file positions.
//!
//! ## Lookup path
//!
//! A point lookup opens the file, validates header and footer, and checks
//! the bloom filter **before** touching the index: a negative lookup returns
//! without loading the index at all (and still succeeds if the index region
//! is damaged). On a bloom hit the sparse index narrows the scan to the
//! records between two stride points, which are then read sequentially.

mod format;
mod reader;
mod writer;

use std::io;
use thiserror::Error;

pub use format::{
    BLOOM_BITS, BLOOM_HASHES, FOOTER_SIZE, HEADER_SIZE, INDEX_STRIDE, SSTABLE_MAGIC,
};
pub use reader::SsTableReader;
pub use writer::SsTableWriter;

/// Errors from reading or writing SSTable files.
#[derive(Debug, Error)]
pub enum SstError {
    /// A transport-level failure (open, stat, seek, create).
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// The file violates the format: bad magic, footer offsets out of range,
    /// index anomalies, invalid bloom parameters, or a short read inside an
    /// expected region.
    #[error("corrupt sstable")]
    Corrupt,
}

/// Outcome of a point lookup against one SSTable.
///
/// `Deleted` is distinct from `NotFound` so the engine can stop walking the
/// stack when it meets a tombstone instead of resurrecting an older value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// The key is present with this value.
    Found(Vec<u8>),
    /// The key is present as a tombstone.
    Deleted,
    /// The key is not in this table.
    NotFound,
}

#[cfg(test)]
mod tests;
