//! Byte sources for database generations
//!
//! The core only ever sees a byte buffer. This module is the thin layer that
//! turns a path into one, with automatic gzip decompression for files whose
//! name ends in `.gz`.
//!
//! # Example
//!
//! ```rust,no_run
//! use iploc::source::{self, DatabaseSource};
//!
//! // Compressed file - auto-decompressed
//! let bytes = source::read_database("17monipdb.dat.gz")?;
//!
//! // Either form can be handed to a registry
//! let from_path = DatabaseSource::from("17monipdb.dat");
//! let from_bytes = DatabaseSource::from(bytes);
//! # Ok::<(), iploc::DecodeError>(())
//! ```

use crate::error::DecodeError;
use flate2::read::GzDecoder;
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

/// Buffer size for file reading (128KB)
const BUFFER_SIZE: usize = 128 * 1024;

/// Where a generation's bytes come from
#[derive(Debug, Clone)]
pub enum DatabaseSource {
    /// Database already in memory
    Bytes(Vec<u8>),
    /// Database file, read in full when loaded
    Path(PathBuf),
}

impl DatabaseSource {
    /// Path of a file-backed source
    pub fn path(&self) -> Option<&Path> {
        match self {
            DatabaseSource::Path(p) => Some(p),
            DatabaseSource::Bytes(_) => None,
        }
    }

    /// Resolve the source to bytes
    pub fn into_bytes(self) -> Result<Vec<u8>, DecodeError> {
        match self {
            DatabaseSource::Bytes(bytes) => Ok(bytes),
            DatabaseSource::Path(path) => read_database(path),
        }
    }
}

impl fmt::Display for DatabaseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseSource::Bytes(bytes) => write!(f, "<{} bytes in memory>", bytes.len()),
            DatabaseSource::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

impl From<Vec<u8>> for DatabaseSource {
    fn from(bytes: Vec<u8>) -> Self {
        DatabaseSource::Bytes(bytes)
    }
}

impl From<&[u8]> for DatabaseSource {
    fn from(bytes: &[u8]) -> Self {
        DatabaseSource::Bytes(bytes.to_vec())
    }
}

impl From<PathBuf> for DatabaseSource {
    fn from(path: PathBuf) -> Self {
        DatabaseSource::Path(path)
    }
}

impl From<&Path> for DatabaseSource {
    fn from(path: &Path) -> Self {
        DatabaseSource::Path(path.to_path_buf())
    }
}

impl From<&str> for DatabaseSource {
    fn from(path: &str) -> Self {
        DatabaseSource::Path(PathBuf::from(path))
    }
}

/// True if the path names a gzip file (`.gz`, any case)
pub fn is_gzip_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("gz"))
        .unwrap_or(false)
}

/// Read a whole database file, decompressing `.gz` files
pub fn read_database(path: impl AsRef<Path>) -> Result<Vec<u8>, DecodeError> {
    let path = path.as_ref();
    read_file(path).map_err(|source| DecodeError::Io {
        path: path.display().to_string(),
        source,
    })
}

fn read_file(path: &Path) -> io::Result<Vec<u8>> {
    let file = File::open(path)?;
    let size_hint = file.metadata().map(|m| m.len() as usize).unwrap_or(0);
    from_reader(file, is_gzip_path(path), size_hint)
}

/// Drain a reader into a buffer, optionally gunzipping on the way
pub fn from_reader<R: Read>(reader: R, is_gzip: bool, size_hint: usize) -> io::Result<Vec<u8>> {
    let mut buffer = Vec::with_capacity(size_hint);
    if is_gzip {
        let mut decoder = GzDecoder::new(BufReader::with_capacity(BUFFER_SIZE, reader));
        decoder.read_to_end(&mut buffer)?;
    } else {
        let mut reader = BufReader::with_capacity(BUFFER_SIZE, reader);
        reader.read_to_end(&mut buffer)?;
    }
    Ok(buffer)
}
