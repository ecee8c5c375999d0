//! Read path: `get()`.
//!
//! Point lookups check the memtable first (freshest data, including
//! tombstones), then walk the SSTable stack newest-first. The first table to
//! answer `Found` or `Deleted` wins -- the short-circuit on `Deleted` is what
//! keeps a resurrected value in an older table from leaking out.

use sstable::{Lookup, SsTableReader};

use crate::Db;

impl Db {
    /// Looks up a key, returning a copy of its value or `None` if the key is
    /// absent or deleted.
    ///
    /// An SSTable that fails to read is logged and treated as not containing
    /// the key; the walk continues with the next-older table.
    #[must_use]
    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        // 1) Memtable. A tombstone here shadows everything on disk.
        if let Some(entry) = self.mem.get_entry(key) {
            if entry.tombstone {
                return None;
            }
            return Some(entry.value);
        }

        // 2) SSTables, newest -> oldest.
        for path in &self.sstables {
            match SsTableReader::get(path, key) {
                Ok(Lookup::Found(value)) => return Some(value),
                Ok(Lookup::Deleted) => return None,
                Ok(Lookup::NotFound) => continue,
                Err(e) => {
                    tracing::warn!(
                        table = %path.display(),
                        error = %e,
                        "sstable unreadable during get; skipping"
                    );
                    continue;
                }
            }
        }

        None
    }
}
