//! # Engine - ForgeDB Storage Engine
//!
//! The central orchestrator that ties together the [`memtable`], [`wal`], and
//! [`sstable`] crates into a complete LSM-tree key-value store.
//!
//! ## Architecture
//!
//! ```text
//! Client
//!   |
//!   v
//! ┌───────────────────────────────────────────────┐
//! │                     DB                        │
//! │                                               │
//! │ write.rs → WAL append → Memtable insert       │
//! │              |                                │
//! │              |  (explicit flush)              │
//! │              v                                │
//! │           flush() → new SSTable               │
//! │              |        rename + WAL truncate   │
//! │              v                                │
//! │ read.rs → Memtable → SSTables newest-first    │
//! │            (Found / Deleted short-circuit)    │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! ## On-disk layout
//!
//! ```text
//! <dir>/forge.wal          write-ahead log
//! <dir>/sst/NNNNNN.sst     immutable SSTables, six-digit decimal ids
//! <dir>/sst/NNNNNN.sst.tmp transient; removed at open, ignored otherwise
//! ```
//!
//! ## Crash Safety
//!
//! Every write is appended to the WAL **before** the Memtable update. A
//! flush publishes the SSTable via temp-file + rename, then resets the
//! Memtable, and only then truncates the WAL -- a crash anywhere in between
//! replays into state the new SSTable already covers.
//!
//! The engine is single-writer and synchronous: no background threads, no
//! compaction, no timers.

mod read;
mod recovery;
mod write;

use anyhow::{Context, Result};
use memtable::Memtable;
use std::path::{Path, PathBuf};
use wal::Wal;

/// Name of the write-ahead log file inside the store directory.
const WAL_FILE: &str = "forge.wal";

/// Name of the SSTable subdirectory inside the store directory.
const SST_DIR: &str = "sst";

/// An embedded, single-node, ordered key-value store.
///
/// # Write Path
///
/// 1. Append the record to the WAL (durability point).
/// 2. Apply the mutation to the in-memory Memtable.
///
/// # Read Path
///
/// 1. Check the Memtable (freshest data, includes tombstones).
/// 2. Check SSTables from newest to oldest; the first `Found` or `Deleted`
///    answer wins, so tombstones shadow older values.
///
/// # Recovery
///
/// [`Db::open`] replays the WAL into a fresh Memtable and scans the SSTable
/// directory, ordering tables newest-first by file id.
pub struct Db {
    pub(crate) mem: Memtable,
    /// Always `Some` while the store is open; taken during WAL truncation
    /// and on close.
    pub(crate) wal: Option<Wal>,
    pub(crate) wal_path: PathBuf,
    pub(crate) sst_dir: PathBuf,
    /// SSTable paths ordered newest-first.
    pub(crate) sstables: Vec<PathBuf>,
    /// Id for the next flushed SSTable. Ids increase monotonically and are
    /// never reused.
    pub(crate) next_id: u64,
}

impl Db {
    /// Opens (or creates) a store rooted at `dir`, replaying the WAL and
    /// discovering existing SSTables.
    ///
    /// # Errors
    ///
    /// Fails on directory creation, a corrupt WAL, or an unreadable SSTable
    /// directory. On failure all acquired file handles are released.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating store directory {}", dir.display()))?;
        let sst_dir = dir.join(SST_DIR);
        std::fs::create_dir_all(&sst_dir)
            .with_context(|| format!("creating sstable directory {}", sst_dir.display()))?;

        recovery::remove_stale_tmp_files(&sst_dir);

        let wal_path = dir.join(WAL_FILE);
        let wal = Wal::open(&wal_path)
            .with_context(|| format!("opening wal {}", wal_path.display()))?;

        // Replay before accepting writes. An error here drops (and thereby
        // closes) the WAL handle.
        let mut mem = Memtable::new();
        recovery::replay_wal_into(&wal_path, &mut mem).context("replaying wal")?;

        let (sstables, next_id) = recovery::scan_sstables(&sst_dir)
            .with_context(|| format!("scanning {}", sst_dir.display()))?;

        tracing::debug!(
            replayed = mem.len(),
            sstables = sstables.len(),
            next_id,
            "store opened"
        );

        Ok(Self {
            mem,
            wal: Some(wal),
            wal_path,
            sst_dir,
            sstables,
            next_id,
        })
    }

    /// Flushes and closes the WAL handle.
    ///
    /// Pending memtable contents are *not* flushed to an SSTable; they are
    /// already durable in the WAL and will be replayed on the next open.
    pub fn close(mut self) -> Result<()> {
        if let Some(w) = self.wal.take() {
            w.close().context("closing wal")?;
        }
        Ok(())
    }

    /// Number of SSTables currently in the stack.
    #[must_use]
    pub fn sstable_count(&self) -> usize {
        self.sstables.len()
    }

    /// Number of entries (including tombstones) in the memtable.
    #[must_use]
    pub fn memtable_len(&self) -> usize {
        self.mem.len()
    }

    pub(crate) fn wal(&self) -> Result<&Wal> {
        self.wal
            .as_ref()
            .context("wal handle missing (store mid-truncation or closed)")
    }
}

impl std::fmt::Debug for Db {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Db")
            .field("wal_path", &self.wal_path)
            .field("sst_dir", &self.sst_dir)
            .field("memtable_entries", &self.mem.len())
            .field("sstable_count", &self.sstables.len())
            .field("next_id", &self.next_id)
            .finish()
    }
}

#[cfg(test)]
mod tests;
