//! Write path: `put()`, `delete()`, and `flush()`.
//!
//! All mutations flow through this module. Each write is first appended to
//! the WAL, then applied to the in-memory Memtable; a failed append leaves
//! the Memtable untouched. Flushing is explicit -- there is no size
//! threshold and no background work.

use anyhow::{ensure, Context, Result};
use memtable::Memtable;
use sstable::SsTableWriter;
use std::fs;
use wal::Wal;

use crate::Db;

impl Db {
    /// Inserts or updates a key-value pair.
    ///
    /// The record is appended to the WAL before the Memtable is touched; if
    /// the append fails the write is aborted and memory is unchanged.
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        ensure!(!key.is_empty(), "key must not be empty");

        self.wal()?.append_put(key, value).context("wal append")?;
        self.mem.put(key, value);
        Ok(())
    }

    /// Deletes a key by writing a tombstone.
    ///
    /// The tombstone shadows any older value in the SSTable stack, both in
    /// memory and (after a flush) on disk.
    pub fn delete(&mut self, key: &[u8]) -> Result<()> {
        ensure!(!key.is_empty(), "key must not be empty");

        self.wal()?.append_delete(key).context("wal append")?;
        self.mem.delete(key);
        Ok(())
    }

    /// Persists the memtable as a new SSTable and truncates the WAL.
    ///
    /// A flush of an empty memtable is a no-op: no file is created and the
    /// stack is unchanged.
    ///
    /// # Protocol
    ///
    /// 1. Drain the memtable in key order, tombstones included.
    /// 2. Write `<id>.sst.tmp`, then rename to `<id>.sst` (atomic publish).
    ///    Any failure deletes the temp file and leaves memtable and WAL
    ///    untouched so the caller may retry.
    /// 3. Prepend the new table to the stack and reset the memtable.
    /// 4. Truncate the WAL: close it, clobber the file with zero bytes,
    ///    reopen. Only now is it safe -- a crash before this point replays
    ///    operations the new SSTable already covers.
    pub fn flush(&mut self) -> Result<()> {
        let entries = self.mem.range_all(b"", b"");
        if entries.is_empty() {
            return Ok(());
        }

        let name = format!("{:06}.sst", self.next_id);
        let path = self.sst_dir.join(&name);
        let tmp = self.sst_dir.join(format!("{}.tmp", name));

        if let Err(e) = SsTableWriter::write_table(&tmp, &entries) {
            let _ = fs::remove_file(&tmp);
            return Err(e).with_context(|| format!("writing {}", tmp.display()));
        }
        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(e).with_context(|| format!("publishing {}", path.display()));
        }

        self.sstables.insert(0, path.clone());
        self.next_id += 1;
        self.mem = Memtable::new();

        if let Some(w) = self.wal.take() {
            w.close().context("closing wal for truncation")?;
        }
        fs::write(&self.wal_path, b"").context("truncating wal")?;
        self.wal = Some(Wal::open(&self.wal_path).context("reopening wal")?);

        tracing::debug!(
            table = %path.display(),
            entries = entries.len(),
            "memtable flushed"
        );
        Ok(())
    }
}
