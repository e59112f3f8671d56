//! Durable blob storage for the persisted cache tier.
//!
//! The entry store mirrors cache entries into a [`BlobStore`] so data
//! survives process restarts; on a cold start the memory tier repopulates
//! from here. Alongside each payload the store keeps a write timestamp so
//! freshness can be judged at the persisted tier independently of the
//! in-memory stamps.
//!
//! Failure philosophy: durable storage is best-effort. A read error or a
//! corrupt blob is reported as a miss by the tier above, never as an error
//! to the caller.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tracing::debug;

/// Errors from durable storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O failure reading or writing a blob.
    #[error("blob store I/O error: {0}")]
    Io(#[from] io::Error),
    /// A stamp file held something other than epoch milliseconds.
    #[error("corrupt stamp for key {key}")]
    CorruptStamp { key: String },
}

/// Abstract durable key→bytes storage with a parallel timestamp channel.
///
/// Keys are slash-separated storage names (`class/detail`). Implementations
/// must keep `set`/`set_stamp` pairs independent: a missing stamp simply
/// means the payload's age is unknown and the tier above treats it as a
/// miss.
pub trait BlobStore: Send + Sync {
    /// Reads a blob. `Ok(None)` when the key has never been written.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Writes (or replaces) a blob.
    fn set(&self, key: &str, data: &[u8]) -> Result<(), StoreError>;

    /// Removes a blob and its stamp. Removing an absent key is not an error.
    fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Removes every blob (and stamp) whose storage name lies under
    /// `class/`. An absent class is not an error.
    fn delete_class(&self, class: &str) -> Result<(), StoreError>;

    /// Reads the write timestamp recorded for a key.
    fn stamp(&self, key: &str) -> Result<Option<SystemTime>, StoreError>;

    /// Records the write timestamp for a key.
    fn set_stamp(&self, key: &str, at: SystemTime) -> Result<(), StoreError>;
}

/// In-memory blob store for tests and cache-less configurations.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, (Vec<u8>, Option<SystemTime>)>>,
}

impl MemoryBlobStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of blobs currently held.
    pub fn len(&self) -> usize {
        self.blobs.lock().unwrap().len()
    }

    /// True when no blobs are held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BlobStore for MemoryBlobStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let blobs = self.blobs.lock().unwrap();
        Ok(blobs.get(key).map(|(data, _)| data.clone()))
    }

    fn set(&self, key: &str, data: &[u8]) -> Result<(), StoreError> {
        let mut blobs = self.blobs.lock().unwrap();
        let stamp = blobs.get(key).and_then(|(_, stamp)| *stamp);
        blobs.insert(key.to_string(), (data.to_vec(), stamp));
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.blobs.lock().unwrap().remove(key);
        Ok(())
    }

    fn delete_class(&self, class: &str) -> Result<(), StoreError> {
        let prefix = format!("{class}/");
        self.blobs
            .lock()
            .unwrap()
            .retain(|key, _| !key.starts_with(&prefix));
        Ok(())
    }

    fn stamp(&self, key: &str) -> Result<Option<SystemTime>, StoreError> {
        let blobs = self.blobs.lock().unwrap();
        Ok(blobs.get(key).and_then(|(_, stamp)| *stamp))
    }

    fn set_stamp(&self, key: &str, at: SystemTime) -> Result<(), StoreError> {
        let mut blobs = self.blobs.lock().unwrap();
        match blobs.get_mut(key) {
            Some((_, stamp)) => *stamp = Some(at),
            None => {
                blobs.insert(key.to_string(), (Vec::new(), Some(at)));
            }
        }
        Ok(())
    }
}

/// Filesystem-backed blob store.
///
/// One file per key under the root directory, with the slash in the storage
/// name becoming a subdirectory (`<root>/market_list/p1-usd.json`). The
/// stamp lives in a `.stamp` sidecar holding epoch milliseconds.
#[derive(Debug)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Opens (creating if needed) a blob store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Opens a store under the platform cache directory.
    pub fn open_default() -> Result<Self, StoreError> {
        let root = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("coinfeed");
        Self::open(root)
    }

    fn payload_path(&self, key: &str) -> PathBuf {
        self.root.join(key).with_extension("json")
    }

    fn stamp_path(&self, key: &str) -> PathBuf {
        self.root.join(key).with_extension("stamp")
    }

    fn ensure_parent(path: &Path) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

impl BlobStore for FsBlobStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match fs::read(self.payload_path(key)) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, data: &[u8]) -> Result<(), StoreError> {
        let path = self.payload_path(key);
        Self::ensure_parent(&path)?;
        fs::write(&path, data)?;
        debug!(key = key, bytes = data.len(), "blob written");
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        for path in [self.payload_path(key), self.stamp_path(key)] {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn delete_class(&self, class: &str) -> Result<(), StoreError> {
        match fs::remove_dir_all(self.root.join(class)) {
            Ok(()) => {
                debug!(class = class, "blob class removed");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn stamp(&self, key: &str) -> Result<Option<SystemTime>, StoreError> {
        let text = match fs::read_to_string(self.stamp_path(key)) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let millis: u64 = text
            .trim()
            .parse()
            .map_err(|_| StoreError::CorruptStamp {
                key: key.to_string(),
            })?;
        Ok(Some(SystemTime::UNIX_EPOCH + Duration::from_millis(millis)))
    }

    fn set_stamp(&self, key: &str, at: SystemTime) -> Result<(), StoreError> {
        let millis = at
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_millis();
        let path = self.stamp_path(key);
        Self::ensure_parent(&path)?;
        fs::write(&path, millis.to_string())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn stores() -> (TempDir, FsBlobStore) {
        let dir = TempDir::new().unwrap();
        let store = FsBlobStore::open(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn memory_store_roundtrip() {
        let store = MemoryBlobStore::new();
        assert_eq!(store.get("market_list/p1-usd").unwrap(), None);

        store.set("market_list/p1-usd", b"[1,2,3]").unwrap();
        assert_eq!(
            store.get("market_list/p1-usd").unwrap(),
            Some(b"[1,2,3]".to_vec())
        );

        store.delete("market_list/p1-usd").unwrap();
        assert_eq!(store.get("market_list/p1-usd").unwrap(), None);
    }

    #[test]
    fn memory_store_stamp_survives_payload_rewrite() {
        let store = MemoryBlobStore::new();
        let at = SystemTime::UNIX_EPOCH + Duration::from_secs(42);

        store.set("k/a", b"v1").unwrap();
        store.set_stamp("k/a", at).unwrap();
        store.set("k/a", b"v2").unwrap();

        assert_eq!(store.stamp("k/a").unwrap(), Some(at));
    }

    #[test]
    fn fs_store_roundtrip() {
        let (_dir, store) = stores();

        store.set("global_metrics/all", b"{\"data\":{}}").unwrap();
        assert_eq!(
            store.get("global_metrics/all").unwrap(),
            Some(b"{\"data\":{}}".to_vec())
        );

        store.delete("global_metrics/all").unwrap();
        assert_eq!(store.get("global_metrics/all").unwrap(), None);
    }

    #[test]
    fn fs_store_missing_key_is_none() {
        let (_dir, store) = stores();
        assert_eq!(store.get("price_history/nope").unwrap(), None);
        assert_eq!(store.stamp("price_history/nope").unwrap(), None);
    }

    #[test]
    fn fs_store_stamp_roundtrip_millis_precision() {
        let (_dir, store) = stores();
        let at = SystemTime::UNIX_EPOCH + Duration::from_millis(1_718_000_123_456);

        store.set_stamp("watchlist/btc-usd", at).unwrap();
        assert_eq!(store.stamp("watchlist/btc-usd").unwrap(), Some(at));
    }

    #[test]
    fn fs_store_corrupt_stamp_is_an_error() {
        let (dir, store) = stores();
        fs::create_dir_all(dir.path().join("market_list")).unwrap();
        fs::write(dir.path().join("market_list/p1-usd.stamp"), "tuesday").unwrap();

        assert!(matches!(
            store.stamp("market_list/p1-usd"),
            Err(StoreError::CorruptStamp { .. })
        ));
    }

    #[test]
    fn memory_store_delete_class_spares_other_classes() {
        let store = MemoryBlobStore::new();
        store.set("market_list/p1-usd", b"[]").unwrap();
        store.set("market_list/p2-usd", b"[]").unwrap();
        store.set_stamp("market_list/p1-usd", SystemTime::UNIX_EPOCH).unwrap();
        store.set("sector_list/all", b"[]").unwrap();

        store.delete_class("market_list").unwrap();

        assert_eq!(store.get("market_list/p1-usd").unwrap(), None);
        assert_eq!(store.get("market_list/p2-usd").unwrap(), None);
        assert_eq!(store.stamp("market_list/p1-usd").unwrap(), None);
        assert_eq!(store.get("sector_list/all").unwrap(), Some(b"[]".to_vec()));
    }

    #[test]
    fn fs_store_delete_class_removes_payloads_and_stamps() {
        let (dir, store) = stores();
        store.set("market_list/p1-usd", b"[]").unwrap();
        store.set_stamp("market_list/p1-usd", SystemTime::UNIX_EPOCH).unwrap();
        store.set("global_metrics/all", b"{}").unwrap();

        store.delete_class("market_list").unwrap();

        assert!(!dir.path().join("market_list").exists());
        assert_eq!(store.get("market_list/p1-usd").unwrap(), None);
        assert_eq!(store.stamp("market_list/p1-usd").unwrap(), None);
        assert_eq!(store.get("global_metrics/all").unwrap(), Some(b"{}".to_vec()));
    }

    #[test]
    fn fs_store_delete_absent_class_is_ok() {
        let (_dir, store) = stores();
        assert!(store.delete_class("coin_images").is_ok());
    }

    #[test]
    fn fs_store_delete_absent_key_is_ok() {
        let (_dir, store) = stores();
        assert!(store.delete("sector_list/all").is_ok());
    }

    #[test]
    fn fs_store_nested_key_creates_directories() {
        let (dir, store) = stores();
        store.set("price_history/bitcoin-7d-usd", b"{}").unwrap();
        assert!(dir
            .path()
            .join("price_history/bitcoin-7d-usd.json")
            .exists());
    }
}
