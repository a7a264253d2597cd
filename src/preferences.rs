//! Persisted user preferences
//!
//! A small key-value store. The only key in use holds the last selected
//! input mode.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, warn};

use crate::state::Mode;

/// Key under which the selected mode is stored
pub const MODE_KEY: &str = "rc-mode";

/// Errors from the preference store
#[derive(Debug, thiserror::Error)]
pub enum PreferenceError {
    #[error("preference file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("preference file is not valid JSON: {0}")]
    Serde(#[from] serde_json::Error),
}

/// A string key-value store
pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), PreferenceError>;
}

/// Read the persisted mode, falling back to [`Mode::Manual`]
pub fn load_mode(store: &dyn PreferenceStore) -> Mode {
    match store.get(MODE_KEY) {
        Some(name) => Mode::from_name(&name).unwrap_or_else(|| {
            warn!(%name, "ignoring invalid stored mode");
            Mode::default()
        }),
        None => Mode::default(),
    }
}

/// Persist the selected mode
pub fn save_mode(store: &dyn PreferenceStore, mode: Mode) -> Result<(), PreferenceError> {
    store.set(MODE_KEY, mode.as_str())
}

/// Preferences kept in a JSON object file
pub struct FilePreferenceStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl FilePreferenceStore {
    /// Open the store, reading any existing file
    ///
    /// A missing file is an empty store. An unreadable or corrupt file is
    /// also treated as empty and will be replaced on the next write.
    pub fn open(path: &Path) -> Self {
        let values = match Self::read(path) {
            Ok(values) => values,
            Err(PreferenceError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                BTreeMap::new()
            }
            Err(e) => {
                warn!(?path, error = %e, "discarding unreadable preferences");
                BTreeMap::new()
            }
        };

        Self {
            path: path.to_owned(),
            values: Mutex::new(values),
        }
    }

    fn read(path: &Path) -> Result<BTreeMap<String, String>, PreferenceError> {
        let bytes = std::fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn write(&self, values: &BTreeMap<String, String>) -> Result<(), PreferenceError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(values)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl PreferenceStore for FilePreferenceStore {
    fn get(&self, key: &str) -> Option<String> {
        let values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PreferenceError> {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.insert(key.to_string(), value.to_string());
        self.write(&values)?;
        debug!(key, value, "preference saved");
        Ok(())
    }
}

/// In-memory preferences
#[cfg(test)]
#[derive(Default)]
pub struct MemoryPreferenceStore {
    values: Mutex<BTreeMap<String, String>>,
}

#[cfg(test)]
impl PreferenceStore for MemoryPreferenceStore {
    fn get(&self, key: &str) -> Option<String> {
        let values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PreferenceError> {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_mode_defaults_to_manual() {
        let store = MemoryPreferenceStore::default();
        assert_eq!(load_mode(&store), Mode::Manual);
    }

    #[test]
    fn test_invalid_mode_defaults_to_manual() {
        let store = MemoryPreferenceStore::default();
        store.set(MODE_KEY, "joystick").unwrap();
        assert_eq!(load_mode(&store), Mode::Manual);
    }

    #[test]
    fn test_saved_mode_loaded() {
        let store = MemoryPreferenceStore::default();
        save_mode(&store, Mode::Voice).unwrap();
        assert_eq!(store.get(MODE_KEY).as_deref(), Some("voice"));
        assert_eq!(load_mode(&store), Mode::Voice);
    }

    #[test]
    fn test_file_store_persists_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("preferences.json");

        let store = FilePreferenceStore::open(&path);
        assert_eq!(load_mode(&store), Mode::Manual);
        save_mode(&store, Mode::Voice).unwrap();

        let reopened = FilePreferenceStore::open(&path);
        assert_eq!(load_mode(&reopened), Mode::Voice);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_file_store_corrupt_file_treated_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.json");
        std::fs::write(&path, b"{not json").unwrap();

        let store = FilePreferenceStore::open(&path);
        assert_eq!(load_mode(&store), Mode::Manual);

        save_mode(&store, Mode::Manual).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("\"rc-mode\": \"manual\""));
    }
}
