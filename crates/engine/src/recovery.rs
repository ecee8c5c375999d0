//! Cold-start recovery: WAL replay and SSTable discovery.

use anyhow::Result;
use memtable::Memtable;
use std::path::{Path, PathBuf};
use wal::WalRecord;

/// Replays the WAL at `path` into `mem`, applying records in append order.
///
/// A missing file is a fresh store and replays nothing.
pub(crate) fn replay_wal_into(path: &Path, mem: &mut Memtable) -> Result<()> {
    for record in wal::replay(path)? {
        match record {
            WalRecord::Put { key, value } => mem.put(&key, &value),
            WalRecord::Delete { key } => mem.delete(&key),
        }
    }
    Ok(())
}

/// Enumerates `*.sst` files in `sst_dir`, returning them newest-first along
/// with the next free table id.
///
/// Basenames are parsed as zero-padded decimal ids; the newest table is the
/// one with the highest id. Files that don't parse are skipped with a
/// warning and take no part in ordering or id allocation.
pub(crate) fn scan_sstables(sst_dir: &Path) -> Result<(Vec<PathBuf>, u64)> {
    let mut tables: Vec<(u64, PathBuf)> = Vec::new();

    for entry in std::fs::read_dir(sst_dir)? {
        let path = entry?.path();
        if path.extension().map_or(true, |e| e != "sst") {
            continue;
        }
        match parse_sst_id(&path) {
            Some(id) => tables.push((id, path)),
            None => {
                tracing::warn!(path = %path.display(), "ignoring unparseable sstable name");
            }
        }
    }

    let next_id = tables.iter().map(|(id, _)| *id).max().unwrap_or(0) + 1;

    // Newest first.
    tables.sort_by(|a, b| b.0.cmp(&a.0));
    let paths = tables.into_iter().map(|(_, p)| p).collect();

    Ok((paths, next_id))
}

/// Removes leftover `.sst.tmp` files from interrupted flushes. Best-effort;
/// a tmp file that survives is ignored anyway because it was never renamed.
pub(crate) fn remove_stale_tmp_files(sst_dir: &Path) {
    let Ok(entries) = std::fs::read_dir(sst_dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let is_tmp = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(".sst.tmp"));
        if is_tmp {
            tracing::warn!(path = %path.display(), "removing stale sstable temp file");
            let _ = std::fs::remove_file(&path);
        }
    }
}

/// Parses `NNNNNN.sst` into its numeric id.
fn parse_sst_id(path: &Path) -> Option<u64> {
    path.file_stem()?.to_str()?.parse().ok()
}
