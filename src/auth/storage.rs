use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, Result};

/// Durable string key-value storage for session tokens.
///
/// Mirrors the browser `localStorage` surface: values are plain strings and
/// removing a missing key is not an error.
pub trait KeyValueStorage: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>>;
    fn set_item(&self, key: &str, value: &str) -> Result<()>;
    fn remove_item(&self, key: &str) -> Result<()>;
}

/// Process-local storage. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.items
            .lock()
            .map(|items| items.len())
            .unwrap_or_else(|poisoned| poisoned.into_inner().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let items = self.items.lock().map_err(|_| poisoned())?;
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let mut items = self.items.lock().map_err(|_| poisoned())?;
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        let mut items = self.items.lock().map_err(|_| poisoned())?;
        items.remove(key);
        Ok(())
    }
}

/// File-backed storage: one TOML document holding every key.
///
/// # Example
/// ```no_run
/// use bearer_gate::auth::{FileStorage, KeyValueStorage};
///
/// let storage = FileStorage::new_default();
/// storage.set_item("auth_token", "eyJ...")?;
/// # Ok::<(), bearer_gate::error::AuthError>(())
/// ```
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStorage {
    /// Store under `base_dir/storage.toml`.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            path: base_dir.into().join(STORAGE_FILE),
            write_lock: Mutex::new(()),
        }
    }

    pub fn new_default() -> Self {
        Self::new(default_state_dir())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn default_dir() -> PathBuf {
        default_state_dir()
    }

    fn read_file(&self) -> Result<StorageFile> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(StorageFile::default())
            }
            Err(err) => return Err(AuthError::Storage(err.to_string())),
        };
        toml::from_str(&raw).map_err(|err| {
            AuthError::Storage(format!("corrupt storage file {}: {err}", self.path.display()))
        })
    }

    fn write_file(&self, mut file: StorageFile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        file.version = 1;
        file.saved_at = Some(Utc::now());
        let serialized = toml::to_string(&file)?;
        fs::write(&self.path, serialized)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }
}

impl KeyValueStorage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_file()?.items.remove(key))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.write_lock.lock().map_err(|_| poisoned())?;
        let mut file = self.read_file()?;
        file.items.insert(key.to_string(), value.to_string());
        self.write_file(file)
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        let _guard = self.write_lock.lock().map_err(|_| poisoned())?;
        let mut file = self.read_file()?;
        if file.items.remove(key).is_none() {
            return Ok(());
        }
        self.write_file(file)
    }
}

const STORAGE_FILE: &str = "storage.toml";

#[derive(Debug, Default, Serialize, Deserialize)]
struct StorageFile {
    #[serde(default)]
    version: u32,
    #[serde(default)]
    saved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    items: BTreeMap<String, String>,
}

fn default_state_dir() -> PathBuf {
    directories::UserDirs::new()
        .map(|dirs| dirs.home_dir().join(".bearer-gate"))
        .unwrap_or_else(|| PathBuf::from(".bearer-gate"))
}

fn poisoned() -> AuthError {
    AuthError::Storage("storage lock poisoned".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_storage() -> (TempDir, FileStorage) {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::new(dir.path());
        (dir, storage)
    }

    #[test]
    fn memory_storage_len_survives_poisoned_lock() {
        let storage = std::sync::Arc::new(MemoryStorage::new());
        let writer = storage.clone();
        let _ = std::thread::spawn(move || {
            let mut items = writer.items.lock().unwrap();
            items.insert("auth_token".to_string(), "t".to_string());
            panic!("writer died holding the lock");
        })
        .join();

        assert!(storage.items.is_poisoned());
        assert_eq!(storage.len(), 1);
        assert!(!storage.is_empty());
    }

    #[test]
    fn memory_storage_set_get_remove() {
        let storage = MemoryStorage::new();
        assert!(storage.is_empty());
        storage.set_item("auth_token", "abc").unwrap();
        assert_eq!(storage.get_item("auth_token").unwrap().as_deref(), Some("abc"));
        storage.remove_item("auth_token").unwrap();
        storage.remove_item("auth_token").unwrap();
        assert_eq!(storage.get_item("auth_token").unwrap(), None);
    }

    #[test]
    fn file_storage_survives_reopen() {
        let (dir, storage) = temp_storage();
        storage.set_item("auth_token", "access").unwrap();
        storage.set_item("refresh_token", "refresh").unwrap();

        let reopened = FileStorage::new(dir.path());
        assert_eq!(reopened.get_item("auth_token").unwrap().as_deref(), Some("access"));
        assert_eq!(
            reopened.get_item("refresh_token").unwrap().as_deref(),
            Some("refresh")
        );
    }

    #[test]
    fn file_storage_missing_file_reads_as_empty() {
        let (_dir, storage) = temp_storage();
        assert_eq!(storage.get_item("auth_token").unwrap(), None);
        storage.remove_item("auth_token").unwrap();
        assert!(!storage.path().exists());
    }

    #[test]
    fn file_storage_remove_keeps_other_keys() {
        let (_dir, storage) = temp_storage();
        storage.set_item("auth_token", "a").unwrap();
        storage.set_item("refresh_token", "r").unwrap();
        storage.remove_item("auth_token").unwrap();
        assert_eq!(storage.get_item("auth_token").unwrap(), None);
        assert_eq!(storage.get_item("refresh_token").unwrap().as_deref(), Some("r"));
    }

    #[test]
    fn file_storage_reports_corrupt_file() {
        let (_dir, storage) = temp_storage();
        fs::write(storage.path(), "items = [").unwrap();
        assert!(matches!(
            storage.get_item("auth_token"),
            Err(AuthError::Storage(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn file_storage_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let (_dir, storage) = temp_storage();
        storage.set_item("auth_token", "a").unwrap();
        let mode = fs::metadata(storage.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
