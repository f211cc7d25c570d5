use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use thiserror::Error;

use super::ControlState;

/// Errors that can occur during state persistence operations
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Failed to serialize state: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Failed to write state: {0}")]
    WriteError(#[from] std::io::Error),

    #[error("Failed to read state: {0}")]
    ReadError(String),

    #[error("Invalid state data: {0}")]
    InvalidState(String),
}

/// Result type for persistence operations
pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Durable key-value storage the control persists into
pub trait Storage: Send + Sync {
    fn get_item(&self, key: &str) -> PersistenceResult<Option<String>>;
    fn set_item(&self, key: &str, value: &str) -> PersistenceResult<()>;
    fn remove_item(&self, key: &str) -> PersistenceResult<()>;
}

/// In-process storage, used when nothing has to survive a restart
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

impl Storage for MemoryStorage {
    fn get_item(&self, key: &str) -> PersistenceResult<Option<String>> {
        Ok(self.items.lock().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> PersistenceResult<()> {
        self.items.lock().insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> PersistenceResult<()> {
        self.items.lock().remove(key);
        Ok(())
    }
}

/// Stores each key as `<dir>/<key>.json`
#[derive(Debug, Clone)]
pub struct FileStorage {
    state_dir: PathBuf,
}

impl FileStorage {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
        }
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    fn path_for(&self, key: &str) -> PersistenceResult<PathBuf> {
        if key.is_empty() || key.contains(['/', '\\']) || key.starts_with('.') {
            return Err(PersistenceError::InvalidState(format!("unusable storage key '{}'", key)));
        }
        Ok(self.state_dir.join(format!("{}.json", key)))
    }
}

impl Storage for FileStorage {
    fn get_item(&self, key: &str) -> PersistenceResult<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(json) => Ok(Some(json)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(PersistenceError::ReadError(format!("{}: {}", path.display(), err))),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> PersistenceResult<()> {
        let path = self.path_for(key)?;

        // Create state directory if it doesn't exist
        fs::create_dir_all(&self.state_dir)?;
        fs::write(path, value)?;
        Ok(())
    }

    fn remove_item(&self, key: &str) -> PersistenceResult<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(path) {
            Err(err) if err.kind() != std::io::ErrorKind::NotFound => Err(err.into()),
            _ => Ok(()),
        }
    }
}

/// `window.localStorage`
#[cfg(target_arch = "wasm32")]
#[derive(Debug, Default, Clone, Copy)]
pub struct WebStorage;

#[cfg(target_arch = "wasm32")]
impl WebStorage {
    fn local_storage() -> PersistenceResult<web_sys::Storage> {
        web_sys::window()
            .and_then(|window| window.local_storage().ok().flatten())
            .ok_or_else(|| PersistenceError::ReadError("localStorage is not available".to_owned()))
    }
}

#[cfg(target_arch = "wasm32")]
impl Storage for WebStorage {
    fn get_item(&self, key: &str) -> PersistenceResult<Option<String>> {
        Self::local_storage()?
            .get_item(key)
            .map_err(|err| PersistenceError::ReadError(format!("{:?}", err)))
    }

    fn set_item(&self, key: &str, value: &str) -> PersistenceResult<()> {
        Self::local_storage()?
            .set_item(key, value)
            .map_err(|err| PersistenceError::InvalidState(format!("{:?}", err)))
    }

    fn remove_item(&self, key: &str) -> PersistenceResult<()> {
        Self::local_storage()?
            .remove_item(key)
            .map_err(|err| PersistenceError::InvalidState(format!("{:?}", err)))
    }
}

/// Reads the raw persisted record under `key`.
///
/// `Ok(None)` means first run.
pub fn load_record(storage: &dyn Storage, key: &str) -> PersistenceResult<Option<ControlState>> {
    let Some(json) = storage.get_item(key)? else {
        return Ok(None);
    };
    let record = serde_json::from_str(&json).map_err(|err| PersistenceError::InvalidState(err.to_string()))?;
    Ok(Some(record))
}

/// Serializes and writes the full state under `key`
pub fn save_record(storage: &dyn Storage, key: &str, state: &ControlState) -> PersistenceResult<()> {
    let json = serde_json::to_string(state)?;
    storage.set_item(key, &json)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("map_layer_control_{}_{}", name, uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_memory_storage() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get_item("k").unwrap(), None);
        storage.set_item("k", "v").unwrap();
        assert_eq!(storage.get_item("k").unwrap().as_deref(), Some("v"));
        storage.remove_item("k").unwrap();
        assert!(storage.is_empty());
    }

    #[test]
    fn test_file_storage_round_trip() {
        let dir = temp_dir("file");
        let storage = FileStorage::new(dir.join("nested"));
        assert_eq!(storage.get_item("layers").unwrap(), None);

        storage.set_item("layers", "{}").unwrap();
        assert!(dir.join("nested").join("layers.json").exists());
        assert_eq!(storage.get_item("layers").unwrap().as_deref(), Some("{}"));

        storage.remove_item("layers").unwrap();
        storage.remove_item("layers").unwrap();
        assert_eq!(storage.get_item("layers").unwrap(), None);
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_file_storage_rejects_path_keys() {
        let storage = FileStorage::new(temp_dir("keys"));
        assert!(matches!(
            storage.set_item("../escape", "{}"),
            Err(PersistenceError::InvalidState(_))
        ));
    }

    #[test]
    fn test_malformed_record() {
        let storage = MemoryStorage::new();
        storage.set_item("k", "not json").unwrap();
        assert!(matches!(load_record(&storage, "k"), Err(PersistenceError::InvalidState(_))));
        assert!(load_record(&storage, "missing").unwrap().is_none());
    }
}
