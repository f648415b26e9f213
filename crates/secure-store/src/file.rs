//! File-backed storage implementation.

use crate::{SecureStorage, StorageError, StorageResult};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

/// Storage backend persisting a string-keyed map as JSON on disk.
///
/// Every mutation rewrites the whole file. The map is small (two session
/// records), so read-modify-write keeps the on-disk state consistent without
/// any partial-update handling.
pub struct FileStorage {
    path: PathBuf,
    // Serializes read-modify-write cycles between threads of one process.
    lock: Mutex<()>,
}

impl FileStorage {
    /// Create a storage backend over the given file path.
    ///
    /// The file is created lazily on first write.
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    fn read_map(&self) -> StorageResult<HashMap<String, String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => serde_json::from_str(&content)
                .map_err(|e| StorageError::Encoding(format!("corrupt storage file: {e}"))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    fn write_map(&self, map: &HashMap<String, String>) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string(map)
            .map_err(|e| StorageError::Encoding(e.to_string()))?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

impl SecureStorage for FileStorage {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let _guard = self.lock.lock().unwrap();
        let mut map = self.read_map().unwrap_or_default();
        map.insert(key.to_string(), value.to_string());
        self.write_map(&map)
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let _guard = self.lock.lock().unwrap();
        Ok(self.read_map()?.get(key).cloned())
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        let _guard = self.lock.lock().unwrap();
        let mut map = self.read_map().unwrap_or_default();
        let existed = map.remove(key).is_some();
        if existed {
            self.write_map(&map)?;
        }
        Ok(existed)
    }
}
