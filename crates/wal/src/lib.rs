//! # WAL — Write-Ahead Log
//!
//! Provides crash-safe durability for the ForgeDB storage engine.
//!
//! Every mutation (`PUT` or `DELETE`) is serialized into a binary record and
//! appended to the WAL **before** the corresponding in-memory update. On
//! restart the WAL is replayed to reconstruct the memtable, guaranteeing that
//! no acknowledged write is lost.
//!
//! ## Binary Record Format
//!
//! ```text
//! [op: u8][key_len: u32 LE][val_len: u32 LE][key bytes][value bytes]
//! ```
//!
//! `op` is `0` for Put and `1` for Delete. Delete records carry
//! `val_len = 0` and no value bytes. There is no framing and no checksum;
//! corruption is detected structurally (unknown op byte, truncation inside a
//! record).
//!
//! ## Durability
//!
//! Appends go through a 64 KiB userspace buffer which is flushed to the OS
//! before the append returns. There is deliberately no per-record fsync: a
//! process crash loses nothing that was acknowledged, while whole-machine
//! durability is left to the page cache. Callers needing stronger guarantees
//! can fsync the file themselves.
//!
//! ## Example
//!
//! ```rust,no_run
//! use wal::{replay, Wal};
//!
//! let w = Wal::open("forge.wal").unwrap();
//! w.append_put(b"hello", b"world").unwrap();
//! w.close().unwrap();
//!
//! for rec in replay("forge.wal").unwrap() {
//!     println!("{:?}", rec);
//! }
//! ```

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::Mutex;

use thiserror::Error;

const OP_PUT: u8 = 0;
const OP_DELETE: u8 = 1;

/// Size of the append-side write buffer.
const WRITE_BUF_SIZE: usize = 64 * 1024;

/// A single WAL record: either a key-value insertion or a deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalRecord {
    /// A key-value insertion.
    Put { key: Vec<u8>, value: Vec<u8> },
    /// A key deletion (tombstone).
    Delete { key: Vec<u8> },
}

/// Errors that can occur during WAL operations.
#[derive(Debug, Error)]
pub enum WalError {
    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// A record was truncated mid-way or contained an unknown op byte.
    #[error("corrupt wal record")]
    Corrupt,
}

/// Append-only WAL handle.
///
/// Appends are serialized by an internal mutex so that each record reaches
/// the file as one contiguous unit even if the single-writer assumption is
/// violated. The buffer is flushed before every append returns; that flush
/// is the durability point the engine relies on.
pub struct Wal {
    writer: Mutex<BufWriter<File>>,
}

impl Wal {
    /// Opens (or creates) a WAL file in append mode.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, WalError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self {
            writer: Mutex::new(BufWriter::with_capacity(WRITE_BUF_SIZE, file)),
        })
    }

    /// Appends a Put record and flushes the write buffer.
    pub fn append_put(&self, key: &[u8], value: &[u8]) -> Result<(), WalError> {
        let mut w = self.lock()?;
        w.write_u8(OP_PUT)?;
        w.write_u32::<LittleEndian>(key.len() as u32)?;
        w.write_u32::<LittleEndian>(value.len() as u32)?;
        w.write_all(key)?;
        if !value.is_empty() {
            w.write_all(value)?;
        }
        w.flush()?;
        Ok(())
    }

    /// Appends a Delete record (`val_len = 0`) and flushes the write buffer.
    pub fn append_delete(&self, key: &[u8]) -> Result<(), WalError> {
        let mut w = self.lock()?;
        w.write_u8(OP_DELETE)?;
        w.write_u32::<LittleEndian>(key.len() as u32)?;
        w.write_u32::<LittleEndian>(0)?;
        w.write_all(key)?;
        w.flush()?;
        Ok(())
    }

    /// Flushes any buffered bytes and closes the file.
    pub fn close(self) -> Result<(), WalError> {
        let mut w = self
            .writer
            .into_inner()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
        w.flush()?;
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BufWriter<File>>, WalError> {
        self.writer
            .lock()
            .map_err(|e| WalError::Io(io::Error::new(io::ErrorKind::Other, e.to_string())))
    }
}

/// Replays a WAL file, returning its records in append order.
///
/// A missing file yields the empty sequence -- that is the normal case for a
/// fresh store. A clean EOF at a record boundary terminates replay
/// successfully; an unknown op byte or truncation inside a record is
/// [`WalError::Corrupt`].
pub fn replay<P: AsRef<Path>>(path: P) -> Result<Vec<WalRecord>, WalError> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    replay_from(BufReader::with_capacity(WRITE_BUF_SIZE, file))
}

/// Replays records from any `Read` implementor.
///
/// Useful for unit tests that supply an in-memory buffer.
pub fn replay_from<R: Read>(mut r: R) -> Result<Vec<WalRecord>, WalError> {
    let mut out = Vec::new();

    loop {
        // A clean EOF is only legal here, before a record starts.
        let mut op = [0u8; 1];
        match r.read_exact(&mut op) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(out),
            Err(e) => return Err(e.into()),
        }
        let op = op[0];

        let key_len = r.read_u32::<LittleEndian>().map_err(|_| WalError::Corrupt)?;
        let val_len = r.read_u32::<LittleEndian>().map_err(|_| WalError::Corrupt)?;

        let mut key = vec![0u8; key_len as usize];
        r.read_exact(&mut key).map_err(|_| WalError::Corrupt)?;

        let mut value = Vec::new();
        if val_len > 0 {
            value = vec![0u8; val_len as usize];
            r.read_exact(&mut value).map_err(|_| WalError::Corrupt)?;
        }

        match op {
            OP_PUT => out.push(WalRecord::Put { key, value }),
            OP_DELETE => out.push(WalRecord::Delete { key }),
            _ => return Err(WalError::Corrupt),
        }
    }
}
