use crate::Db;
use std::path::Path;

/// Opens a store under a test directory.
pub fn open_db(dir: &Path) -> Db {
    Db::open(dir).expect("open store")
}

/// Lists `*.sst` basenames in the store's sst directory, sorted.
pub fn sst_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir.join("sst"))
        .map(|entries| {
            entries
                .flatten()
                .filter_map(|e| e.file_name().into_string().ok())
                .filter(|n| n.ends_with(".sst"))
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}
