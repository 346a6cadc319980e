//! File-backed key-value store.
//!
//! One file per key under a directory:
//!
//! ```text
//! magic "EKV\0" | version u8 | length u64 LE | value bytes | crc32 u32 LE
//! ```
//!
//! Writes go to a temporary file that is renamed over the target. The
//! directory is held with an exclusive lock for the lifetime of the store.

use super::KeyValueStore;
use crate::error::{Result, StoreError};
use fs2::FileExt;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Magic bytes for value files.
const VALUE_MAGIC: &[u8; 4] = b"EKV\0";

/// Current value file format version.
const VALUE_VERSION: u8 = 1;

/// Magic, version and length prefix.
const HEADER_SIZE: u64 = 4 + 1 + 8;

/// Trailing CRC32.
const CHECKSUM_SIZE: u64 = 4;

/// Extension of value files.
const VALUE_EXT: &str = "kv";

/// Durable key-value store rooted at a directory.
pub struct FileKeyValueStore {
    path: PathBuf,
    /// Lock file for exclusive access.
    _lock_file: File,
}

impl FileKeyValueStore {
    /// Open (creating if needed) a store at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        fs::create_dir_all(&path)?;

        let lock_file = Self::acquire_lock(&path)?;

        Ok(Self {
            path,
            _lock_file: lock_file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn acquire_lock(path: &Path) -> Result<File> {
        let lock_file = File::create(path.join("LOCK"))?;
        lock_file
            .try_lock_exclusive()
            .map_err(|_| StoreError::Locked)?;
        Ok(lock_file)
    }

    fn value_path(&self, key: &str) -> PathBuf {
        self.path.join(format!("{}.{}", escape_key(key), VALUE_EXT))
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let value_path = self.value_path(key);
        if !value_path.exists() {
            return Ok(None);
        }

        let mut file = File::open(&value_path)?;

        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)?;
        if &magic != VALUE_MAGIC {
            return Err(StoreError::InvalidFormat("Invalid value magic".into()));
        }

        let mut version = [0u8; 1];
        file.read_exact(&mut version)?;
        if version[0] != VALUE_VERSION {
            return Err(StoreError::InvalidFormat(format!(
                "Unsupported value version: {}",
                version[0]
            )));
        }

        let mut len_bytes = [0u8; 8];
        file.read_exact(&mut len_bytes)?;
        let len = u64::from_le_bytes(len_bytes);

        // Check the declared length against the file before allocating
        let file_len = file.metadata()?.len();
        let available = file_len.saturating_sub(HEADER_SIZE + CHECKSUM_SIZE);
        if len > available {
            return Err(StoreError::Corruption(format!(
                "value length {} exceeds file size {} for {}",
                len, file_len, key
            )));
        }

        let mut value = vec![0u8; len as usize];
        file.read_exact(&mut value)
            .map_err(|_| StoreError::Corruption(format!("truncated value for {}", key)))?;

        let mut checksum_bytes = [0u8; 4];
        file.read_exact(&mut checksum_bytes)
            .map_err(|_| StoreError::Corruption(format!("missing checksum for {}", key)))?;
        let expected = u32::from_le_bytes(checksum_bytes);
        let got = crc32fast::hash(&value);
        if expected != got {
            return Err(StoreError::ChecksumMismatch { expected, got });
        }

        Ok(Some(value))
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let value_path = self.value_path(key);
        let tmp_path = value_path.with_extension("tmp");

        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(VALUE_MAGIC)?;
            file.write_all(&[VALUE_VERSION])?;
            file.write_all(&(value.len() as u64).to_le_bytes())?;
            file.write_all(value)?;
            file.write_all(&crc32fast::hash(value).to_le_bytes())?;
            file.sync_all()?;
        }

        fs::rename(&tmp_path, &value_path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.value_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// File-name-safe form of a key. Bytes outside `[A-Za-z0-9._-]` become `%XX`.
fn escape_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'.' | b'_' | b'-' => out.push(byte as char),
            other => out.push_str(&format!("%{:02X}", other)),
        }
    }
    out
}
