//! Compression and whole-file persistence behind one trait.
//!
//! The engine only hands complete buffers to a [`Storage`] and receives
//! complete buffers back. Implementations must be shareable with the
//! background compression worker.

use flate2::Compression;
use flate2::read::{ZlibDecoder, ZlibEncoder};
use std::collections::HashMap;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("refusing to write an empty buffer to {0}")]
    EmptyBuffer(PathBuf),
    #[error("failed to decompress {path}: {detail}")]
    Decompress { path: PathBuf, detail: String },
    #[error("no file at {0}")]
    NotFound(PathBuf),
    #[error("storage lock poisoned")]
    Poisoned,
    #[error("compression worker exited without reporting")]
    WorkerLost,
}

pub trait Storage: Send + Sync {
    fn compress(&self, raw: &[u8]) -> Result<Vec<u8>, StorageError>;

    fn decompress(&self, path: &Path, packed: &[u8]) -> Result<Vec<u8>, StorageError>;

    fn read_whole_file(&self, path: &Path) -> Result<Vec<u8>, StorageError>;

    fn write_whole_file(&self, path: &Path, bytes: &[u8]) -> Result<(), StorageError>;

    /// Compress and persist an uncompressed save buffer.
    fn compress_and_write(&self, path: &Path, raw: &[u8]) -> Result<(), StorageError> {
        if raw.is_empty() {
            return Err(StorageError::EmptyBuffer(path.to_path_buf()));
        }
        let packed = self.compress(raw)?;
        self.write_whole_file(path, &packed)
    }

    /// Read and decompress a save file.
    fn read_and_decompress(&self, path: &Path) -> Result<Vec<u8>, StorageError> {
        let packed = self.read_whole_file(path)?;
        self.decompress(path, &packed)
    }
}

// ---------------------------------------------------------------------------
// Zlib on disk
// ---------------------------------------------------------------------------

/// Zlib-compressed files on the local filesystem.
#[derive(Debug, Clone, Copy)]
pub struct ZlibFileStorage {
    level: Compression,
}

impl ZlibFileStorage {
    pub fn new() -> Self {
        Self {
            level: Compression::default(),
        }
    }

    /// Compression level 0-9.
    pub fn with_level(level: u32) -> Self {
        Self {
            level: Compression::new(level.min(9)),
        }
    }
}

impl Default for ZlibFileStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for ZlibFileStorage {
    fn compress(&self, raw: &[u8]) -> Result<Vec<u8>, StorageError> {
        let mut encoder = ZlibEncoder::new(raw, self.level);
        let mut packed = Vec::new();
        encoder.read_to_end(&mut packed)?;
        Ok(packed)
    }

    fn decompress(&self, path: &Path, packed: &[u8]) -> Result<Vec<u8>, StorageError> {
        let mut decoder = ZlibDecoder::new(packed);
        let mut raw = Vec::new();
        decoder
            .read_to_end(&mut raw)
            .map_err(|e| StorageError::Decompress {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })?;
        Ok(raw)
    }

    fn read_whole_file(&self, path: &Path) -> Result<Vec<u8>, StorageError> {
        match fs::read(path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(path.to_path_buf()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Creates missing parent directories first.
    fn write_whole_file(&self, path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, bytes)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In memory
// ---------------------------------------------------------------------------

/// Files kept in a map, stored uncompressed.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    files: Mutex<HashMap<PathBuf, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stored bytes of a file.
    pub fn raw(&self, path: &Path) -> Option<Vec<u8>> {
        self.files.lock().ok()?.get(path).cloned()
    }

    /// Replace a file's bytes directly.
    pub fn insert_raw(&self, path: &Path, bytes: Vec<u8>) -> Result<(), StorageError> {
        self.files
            .lock()
            .map_err(|_| StorageError::Poisoned)?
            .insert(path.to_path_buf(), bytes);
        Ok(())
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.files.lock().is_ok_and(|files| files.contains_key(path))
    }
}

impl Storage for MemoryStorage {
    fn compress(&self, raw: &[u8]) -> Result<Vec<u8>, StorageError> {
        Ok(raw.to_vec())
    }

    fn decompress(&self, _path: &Path, packed: &[u8]) -> Result<Vec<u8>, StorageError> {
        Ok(packed.to_vec())
    }

    fn read_whole_file(&self, path: &Path) -> Result<Vec<u8>, StorageError> {
        self.files
            .lock()
            .map_err(|_| StorageError::Poisoned)?
            .get(path)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(path.to_path_buf()))
    }

    fn write_whole_file(&self, path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
        self.insert_raw(path, bytes.to_vec())
    }
}
