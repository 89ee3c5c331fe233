//! Disk storage backend: one checksummed file per key.

use super::KvStorage;
use crate::error::{Result, StoreError};
use fs2::FileExt;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Magic bytes for key-value files.
const KV_MAGIC: &[u8; 4] = b"CKV\0";

/// Current key-value file format version.
const KV_VERSION: u8 = 1;

/// Directory-backed storage with a file per key.
///
/// Each value file carries a magic header, format version, length-prefixed
/// payload, and a crc32 trailer. Writes go through a temp file and rename so
/// a crash mid-write leaves the previous value intact. An exclusive LOCK
/// file keeps the directory single-writer.
pub struct DiskStorage {
    path: PathBuf,
    _lock_file: File,
}

impl DiskStorage {
    /// Open storage at `path`, creating the directory if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        fs::create_dir_all(&path)?;

        let lock_file = File::create(path.join("LOCK"))?;
        lock_file
            .try_lock_exclusive()
            .map_err(|_| StoreError::Locked)?;

        Ok(Self {
            path,
            _lock_file: lock_file,
        })
    }

    fn value_path(&self, key: &str) -> PathBuf {
        self.path.join(format!("{key}.ckv"))
    }

    fn write_value(&self, path: &Path, value: &str) -> Result<()> {
        let tmp_path = path.with_extension("tmp");
        let mut file = File::create(&tmp_path)?;

        let payload = value.as_bytes();
        file.write_all(KV_MAGIC)?;
        file.write_all(&[KV_VERSION])?;
        file.write_all(&(payload.len() as u64).to_le_bytes())?;
        file.write_all(payload)?;
        file.write_all(&crc32fast::hash(payload).to_le_bytes())?;
        file.sync_all()?;

        fs::rename(&tmp_path, path)?;
        Ok(())
    }

    fn read_value(&self, path: &Path) -> Result<String> {
        let mut file = File::open(path)?;

        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)?;
        if &magic != KV_MAGIC {
            return Err(StoreError::InvalidFormat("Invalid key-value magic".into()));
        }

        let mut version = [0u8; 1];
        file.read_exact(&mut version)?;
        if version[0] != KV_VERSION {
            return Err(StoreError::InvalidFormat(format!(
                "Unsupported key-value version: {}",
                version[0]
            )));
        }

        let mut len_bytes = [0u8; 8];
        file.read_exact(&mut len_bytes)?;
        let len = u64::from_le_bytes(len_bytes) as usize;

        let mut payload = vec![0u8; len];
        file.read_exact(&mut payload)?;

        let mut crc_bytes = [0u8; 4];
        file.read_exact(&mut crc_bytes)?;
        let expected = u32::from_le_bytes(crc_bytes);
        let got = crc32fast::hash(&payload);
        if got != expected {
            return Err(StoreError::ChecksumMismatch { expected, got });
        }

        String::from_utf8(payload)
            .map_err(|e| StoreError::Corruption(format!("Non-UTF8 value payload: {e}")))
    }
}

impl KvStorage for DiskStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.value_path(key);
        if !path.exists() {
            return Ok(None);
        }
        self.read_value(&path).map(Some)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.write_value(&self.value_path(key), value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.value_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_set_get_roundtrip() {
        let dir = TempDir::new().unwrap();
        let storage = DiskStorage::open(dir.path().join("kv")).unwrap();

        assert_eq!(storage.get("sessions").unwrap(), None);

        storage.set("sessions", "[]").unwrap();
        assert_eq!(storage.get("sessions").unwrap().as_deref(), Some("[]"));

        storage.set("sessions", r#"[{"id":"s1"}]"#).unwrap();
        assert_eq!(
            storage.get("sessions").unwrap().as_deref(),
            Some(r#"[{"id":"s1"}]"#)
        );
    }

    #[test]
    fn test_remove() {
        let dir = TempDir::new().unwrap();
        let storage = DiskStorage::open(dir.path().join("kv")).unwrap();

        storage.set("favorites", r#"["g1"]"#).unwrap();
        storage.remove("favorites").unwrap();
        assert_eq!(storage.get("favorites").unwrap(), None);

        // Absent key
        storage.remove("favorites").unwrap();
    }

    #[test]
    fn test_values_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("kv");

        {
            let storage = DiskStorage::open(&path).unwrap();
            storage.set("settings", r#"{"gradeSystem":"v-grade"}"#).unwrap();
        }

        let storage = DiskStorage::open(&path).unwrap();
        assert_eq!(
            storage.get("settings").unwrap().as_deref(),
            Some(r#"{"gradeSystem":"v-grade"}"#)
        );
    }

    #[test]
    fn test_exclusive_lock() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("kv");

        let _first = DiskStorage::open(&path).unwrap();
        let second = DiskStorage::open(&path);
        assert!(matches!(second, Err(StoreError::Locked)));
    }

    #[test]
    fn test_corrupt_payload_is_detected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("kv");

        {
            let storage = DiskStorage::open(&path).unwrap();
            storage.set("recent", "[1,2,3]").unwrap();
        }

        // Flip a payload byte past the header
        let file_path = path.join("recent.ckv");
        let mut bytes = fs::read(&file_path).unwrap();
        bytes[14] ^= 0xFF;
        fs::write(&file_path, bytes).unwrap();

        let storage = DiskStorage::open(&path).unwrap();
        assert!(matches!(
            storage.get("recent"),
            Err(StoreError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_bad_magic_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("kv");

        let storage = DiskStorage::open(&path).unwrap();
        fs::write(path.join("junk.ckv"), b"not a kv file").unwrap();
        assert!(matches!(
            storage.get("junk"),
            Err(StoreError::InvalidFormat(_))
        ));
    }
}
