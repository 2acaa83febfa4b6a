// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! String key-value persistence for profiles and pad assignments.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use parking_lot::RwLock;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};

use crate::util::underscore_whitespace;

/// The list of MIDI profiles.
pub const PROFILES_KEY: &str = "mpc_midi_profiles";
/// The id of the active profile.
pub const ACTIVE_PROFILE_KEY: &str = "mpc_active_profile";
/// The pad bank.
pub const PAD_ASSIGNMENTS_KEY: &str = "mpc_architect_v2_samples";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A store of string values by key. Values are JSON documents.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: String) -> Result<(), StoreError>;
}

/// A store backed by a single JSON object file. The file is rewritten on every set.
pub struct FileStore {
    path: PathBuf,
    values: RwLock<BTreeMap<String, String>>,
}

impl FileStore {
    /// Opens the store at the given path. A missing file is an empty store; so is an
    /// unreadable one, after a warning.
    pub fn open(path: &Path) -> FileStore {
        let values = match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(values) => values,
                Err(e) => {
                    warn!(
                        path = path.display().to_string(),
                        err = e.to_string(),
                        "State file is corrupt, starting empty."
                    );
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                warn!(
                    path = path.display().to_string(),
                    err = e.to_string(),
                    "Unable to read state file, starting empty."
                );
                BTreeMap::new()
            }
        };

        FileStore {
            path: path.to_path_buf(),
            values: RwLock::new(values),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }

    /// Writes the file with the new value first. The value is only visible once the
    /// write succeeds.
    fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        let mut values = self.values.write();
        let mut updated = values.clone();
        updated.insert(key.to_string(), value);

        let contents = serde_json::to_string_pretty(&updated)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, contents)?;
        fs::rename(&tmp, &self.path)?;
        *values = updated;
        debug!(key, path = self.path.display().to_string(), "State saved.");
        Ok(())
    }
}

/// An in-memory store.
#[derive(Default)]
pub struct MemoryStore {
    values: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.values.write().insert(key.to_string(), value);
        Ok(())
    }
}

/// Loads the value under the key. Missing or malformed values produce the default;
/// a malformed value is never partially applied.
pub fn load_or_default<T>(store: &dyn KeyValueStore, key: &str) -> T
where
    T: DeserializeOwned + Default,
{
    let raw = match store.get(key) {
        Some(raw) => raw,
        None => return T::default(),
    };

    match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(e) => {
            warn!(key, err = e.to_string(), "Stored value is malformed, using the default.");
            T::default()
        }
    }
}

/// Serializes the value under the key.
pub fn save<T: Serialize>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StoreError> {
    store.set(key, serde_json::to_string(value)?)
}

/// Writes pretty JSON to `<name>_config.json` in the given directory, with every run
/// of whitespace in the name replaced by an underscore. Returns the written path.
pub fn export_config<T: Serialize>(
    value: &T,
    name: &str,
    dir: &Path,
) -> Result<PathBuf, StoreError> {
    let path = dir.join(format!("{}_config.json", underscore_whitespace(name)));
    fs::write(&path, serde_json::to_string_pretty(value)?)?;
    info!(path = path.display().to_string(), "Exported configuration.");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_load_missing_and_malformed() {
        let store = MemoryStore::new();
        let value: HashMap<String, u32> = load_or_default(&store, "numbers");
        assert!(value.is_empty());

        store.set("numbers", "{\"a\": 1".to_string()).unwrap();
        let value: HashMap<String, u32> = load_or_default(&store, "numbers");
        assert!(value.is_empty());

        store.set("numbers", "{\"a\": \"one\"}".to_string()).unwrap();
        let value: HashMap<String, u32> = load_or_default(&store, "numbers");
        assert!(value.is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let store = MemoryStore::new();
        let value = HashMap::from([("a".to_string(), 1u32)]);
        save(&store, "numbers", &value).unwrap();

        let loaded: HashMap<String, u32> = load_or_default(&store, "numbers");
        assert_eq!(loaded, value);
    }

    #[test]
    fn test_file_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let store = FileStore::open(&path);
        assert!(store.get("key").is_none());
        store.set("key", "[1,2,3]".to_string()).unwrap();

        let reopened = FileStore::open(&path);
        assert_eq!(reopened.get("key"), Some("[1,2,3]".to_string()));
        assert_eq!(reopened.path(), path.as_path());
    }

    #[test]
    fn test_file_store_failed_write_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing-dir");
        let path = missing.join("state.json");

        let store = FileStore::open(&path);
        assert!(store.set("key", "1".to_string()).is_err());
        assert!(store.get("key").is_none());

        // A later write doesn't carry the failed value to disk.
        fs::create_dir(&missing).unwrap();
        store.set("other", "2".to_string()).unwrap();
        let reopened = FileStore::open(&path);
        assert!(reopened.get("key").is_none());
        assert_eq!(reopened.get("other"), Some("2".to_string()));
    }

    #[test]
    fn test_file_store_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "this is not json").unwrap();

        let store = FileStore::open(&path);
        assert!(store.get("key").is_none());
        store.set("key", "true".to_string()).unwrap();
        assert_eq!(FileStore::open(&path).get("key"), Some("true".to_string()));
    }

    #[test]
    fn test_export_config() {
        let dir = tempfile::tempdir().unwrap();
        let value = HashMap::from([("channel".to_string(), 3u32)]);

        let path = export_config(&value, "My  Pad\tDevice", dir.path()).unwrap();
        assert_eq!(
            path.file_name().and_then(|name| name.to_str()),
            Some("My_Pad_Device_config.json")
        );

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains('\n'));
        let parsed: HashMap<String, u32> = serde_json::from_str(&written).unwrap();
        assert_eq!(parsed, value);
    }
}
