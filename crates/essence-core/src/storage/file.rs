//! One-file-per-key storage in a directory.
//!
//! Writes go to a dot-prefixed temp file and are renamed into place while
//! holding the directory's exclusive lock, so a reader never observes a
//! half-written entry.

use std::fmt::Write as _;
use std::fs;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::backend::StorageBackend;
use crate::error::RecipeError;
use crate::lock::StorageLock;

const LOCK_FILE: &str = ".lock";
const ENTRY_SUFFIX: &str = ".json";
const LOCK_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    /// Open (creating if needed) a storage directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, RecipeError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| {
            RecipeError::Storage(format!("cannot create {}: {e}", dir.display()))
        })?;
        Ok(Self { dir })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn lock_path(&self) -> PathBuf {
        self.dir.join(LOCK_FILE)
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}{ENTRY_SUFFIX}", encode_key(key)))
    }
}

impl StorageBackend for FileBackend {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, RecipeError> {
        let _lock = StorageLock::shared(&self.lock_path(), LOCK_TIMEOUT)?;
        match fs::read(self.entry_path(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(RecipeError::Storage(format!("read {key}: {e}"))),
        }
    }

    fn write(&self, key: &str, value: &[u8]) -> Result<(), RecipeError> {
        let _lock = StorageLock::exclusive(&self.lock_path(), LOCK_TIMEOUT)?;
        let target = self.entry_path(key);
        let tmp = self.dir.join(format!(".{}.tmp", encode_key(key)));

        let mut file = fs::File::create(&tmp)
            .map_err(|e| RecipeError::Storage(format!("write {key}: {e}")))?;
        file.write_all(value)
            .and_then(|()| file.sync_all())
            .map_err(|e| RecipeError::Storage(format!("write {key}: {e}")))?;
        drop(file);

        fs::rename(&tmp, &target)
            .map_err(|e| RecipeError::Storage(format!("commit {key}: {e}")))
    }

    fn remove(&self, key: &str) -> Result<(), RecipeError> {
        let _lock = StorageLock::exclusive(&self.lock_path(), LOCK_TIMEOUT)?;
        match fs::remove_file(self.entry_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(RecipeError::Storage(format!("remove {key}: {e}"))),
        }
    }

    fn keys(&self) -> Result<Vec<String>, RecipeError> {
        let _lock = StorageLock::shared(&self.lock_path(), LOCK_TIMEOUT)?;
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let name = entry?.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.starts_with('.') {
                continue;
            }
            if let Some(encoded) = name.strip_suffix(ENTRY_SUFFIX)
                && let Some(key) = decode_key(encoded)
            {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }
}

/// Percent-encode everything outside `[A-Za-z0-9_-]`.
fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            out.push(char::from(byte));
        } else {
            let _ = write!(out, "%{byte:02X}");
        }
    }
    out
}

fn decode_key(encoded: &str) -> Option<String> {
    let bytes = encoded.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = encoded.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_encoding_round_trips() {
        for key in ["essence:session:current", "a b/c", "ünïcode", "plain-key_1"] {
            let encoded = encode_key(key);
            assert!(!encoded.contains(':'));
            assert!(!encoded.contains('/'));
            assert_eq!(decode_key(&encoded).as_deref(), Some(key));
        }
    }

    #[test]
    fn write_read_remove() -> Result<(), RecipeError> {
        let dir = tempfile::tempdir()?;
        let backend = FileBackend::open(dir.path())?;
        backend.write("essence:draft", b"{\"a\":1}")?;
        assert_eq!(backend.read("essence:draft")?, Some(b"{\"a\":1}".to_vec()));
        assert_eq!(backend.keys()?, vec!["essence:draft".to_string()]);
        backend.remove("essence:draft")?;
        assert_eq!(backend.read("essence:draft")?, None);
        assert!(backend.keys()?.is_empty());
        Ok(())
    }

    #[test]
    fn keys_skip_lock_and_temp_files() -> Result<(), RecipeError> {
        let dir = tempfile::tempdir()?;
        let backend = FileBackend::open(dir.path())?;
        backend.write("k", b"1")?;
        fs::write(dir.path().join(".k.tmp"), b"partial")?;
        fs::write(dir.path().join("notes.txt"), b"ignored")?;
        assert_eq!(backend.keys()?, vec!["k".to_string()]);
        Ok(())
    }

    #[test]
    fn overwrite_replaces_value() -> Result<(), RecipeError> {
        let dir = tempfile::tempdir()?;
        let backend = FileBackend::open(dir.path())?;
        backend.write("k", b"old")?;
        backend.write("k", b"new")?;
        assert_eq!(backend.read("k")?, Some(b"new".to_vec()));
        Ok(())
    }
}
