//! Pairing credential persistence.
//!
//! The appliance hands out one client key per paired controller. The key is
//! loaded before connecting and saved right after a handshake that produced a
//! new one. Keys are scoped by appliance address.
//!
//! | Store | Backing |
//! |-------|---------|
//! | [`FileKeyStore`] | JSON object `{address: key}` on disk |
//! | [`MemoryKeyStore`] | Process memory |
//!
//! Store calls are synchronous and are run on the blocking pool by the client.

// ============================================================================
// Imports
// ============================================================================

use std::fs;
use std::io::{Error as IoError, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// File name of the default key file, created in the home directory.
pub const DEFAULT_KEY_FILE: &str = ".webos-remote-keys.json";

// ============================================================================
// KeyStore
// ============================================================================

/// Storage for pairing credentials.
pub trait KeyStore: Send + Sync + 'static {
    /// Loads the key stored for `address`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read.
    fn load(&self, address: &str) -> Result<Option<String>>;

    /// Stores `key` for `address`, replacing any previous key.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be written.
    fn save(&self, address: &str, key: &str) -> Result<()>;
}

// ============================================================================
// FileKeyStore
// ============================================================================

/// Keys kept in a JSON file shared by every appliance address.
#[derive(Debug)]
pub struct FileKeyStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl FileKeyStore {
    /// Creates a store backed by `path`. The file is created on first save.
    #[inline]
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Returns the default key file location.
    ///
    /// Falls back to the working directory when no home directory is known.
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(DEFAULT_KEY_FILE)
    }

    /// Returns the backing file path.
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_keys(&self) -> Result<FxHashMap<String, String>> {
        match fs::read_to_string(&self.path) {
            Ok(text) if text.trim().is_empty() => Ok(FxHashMap::default()),
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(FxHashMap::default()),
            Err(e) => Err(e.into()),
        }
    }
}

impl Default for FileKeyStore {
    fn default() -> Self {
        Self::new(Self::default_path())
    }
}

impl KeyStore for FileKeyStore {
    fn load(&self, address: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock();
        let key = self.read_keys()?.remove(address);
        debug!(path = %self.path.display(), address, found = key.is_some(), "Loaded client key");
        Ok(key)
    }

    fn save(&self, address: &str, key: &str) -> Result<()> {
        let _guard = self.lock.lock();

        let mut keys = self.read_keys()?;
        keys.insert(address.to_string(), key.to_string());

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                fs::create_dir_all(parent)?;
                parent
            }
            _ => Path::new("."),
        };

        // Written beside the target and renamed over it
        let mut file = NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut file, &keys)?;
        file.as_file().sync_all()?;
        file.persist(&self.path).map_err(|e| e.error)?;

        debug!(path = %self.path.display(), address, "Saved client key");
        Ok(())
    }
}

// ============================================================================
// MemoryKeyStore
// ============================================================================

/// Keys kept in memory for the lifetime of the store.
#[derive(Debug, Default)]
pub struct MemoryKeyStore {
    keys: Mutex<FxHashMap<String, String>>,
}

impl MemoryKeyStore {
    /// Creates an empty store.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding one key.
    #[must_use]
    pub fn with_key(address: impl Into<String>, key: impl Into<String>) -> Self {
        let store = Self::new();
        store.keys.lock().insert(address.into(), key.into());
        store
    }
}

impl KeyStore for MemoryKeyStore {
    fn load(&self, address: &str) -> Result<Option<String>> {
        Ok(self.keys.lock().get(address).cloned())
    }

    fn save(&self, address: &str, key: &str) -> Result<()> {
        self.keys.lock().insert(address.to_string(), key.to_string());
        Ok(())
    }
}

// ============================================================================
// Blocking Pool Helpers
// ============================================================================

/// Loads a key on the blocking pool.
pub(crate) async fn load_key(store: Arc<dyn KeyStore>, address: String) -> Result<Option<String>> {
    tokio::task::spawn_blocking(move || store.load(&address))
        .await
        .map_err(|e| Error::from(IoError::other(e)))?
}

/// Saves a key on the blocking pool.
pub(crate) async fn save_key(store: Arc<dyn KeyStore>, address: String, key: String) -> Result<()> {
    tokio::task::spawn_blocking(move || store.save(&address, &key))
        .await
        .map_err(|e| Error::from(IoError::other(e)))?
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    #[test]
    fn test_file_store_missing_file_is_empty() {
        let dir = TempDir::new().expect("tempdir");
        let store = FileKeyStore::new(dir.path().join("keys.json"));
        assert_eq!(store.load("192.168.1.5").expect("load"), None);
    }

    #[test]
    fn test_file_store_round_trip_per_address() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("nested").join("keys.json");
        let store = FileKeyStore::new(&path);

        store.save("10.0.0.1", "abc123").expect("save");
        store.save("10.0.0.2", "def456").expect("save");
        store.save("10.0.0.1", "ghi789").expect("overwrite");

        let reopened = FileKeyStore::new(&path);
        assert_eq!(reopened.load("10.0.0.1").expect("load").as_deref(), Some("ghi789"));
        assert_eq!(reopened.load("10.0.0.2").expect("load").as_deref(), Some("def456"));
        assert_eq!(reopened.load("10.0.0.3").expect("load"), None);
    }

    #[test]
    fn test_file_store_save_replaces_file_whole() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("keys.json");
        fs::write(&path, r#"{"10.0.0.1": "abc123"}"#).expect("write");

        let store = FileKeyStore::new(&path);
        store.save("10.0.0.2", "def456").expect("save");

        // no scratch file is left beside the key file
        let entries: Vec<_> = fs::read_dir(dir.path())
            .expect("read dir")
            .map(|entry| entry.expect("entry").file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("keys.json")]);

        let keys: FxHashMap<String, String> =
            serde_json::from_str(&fs::read_to_string(&path).expect("read")).expect("json");
        assert_eq!(keys.len(), 2);
        assert_eq!(keys["10.0.0.1"], "abc123");
    }

    #[test]
    fn test_file_store_rejects_garbage() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("keys.json");
        fs::write(&path, "not json").expect("write");

        let store = FileKeyStore::new(&path);
        assert!(matches!(store.load("10.0.0.1"), Err(Error::Json(_))));
    }

    #[test]
    fn test_default_path_file_name() {
        assert!(FileKeyStore::default_path().ends_with(DEFAULT_KEY_FILE));
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryKeyStore::with_key("10.0.0.1", "abc123");
        assert_eq!(store.load("10.0.0.1").expect("load").as_deref(), Some("abc123"));
        store.save("10.0.0.2", "def456").expect("save");
        assert_eq!(store.load("10.0.0.2").expect("load").as_deref(), Some("def456"));
    }

    #[tokio::test]
    async fn test_blocking_helpers() {
        let store: Arc<dyn KeyStore> = Arc::new(MemoryKeyStore::new());
        save_key(Arc::clone(&store), "10.0.0.1".into(), "abc123".into())
            .await
            .expect("save");
        let key = load_key(store, "10.0.0.1".into()).await.expect("load");
        assert_eq!(key.as_deref(), Some("abc123"));
    }
}
