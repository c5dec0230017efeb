use std::{
    collections::HashMap,
    fs,
    io::ErrorKind as IoErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use parking_lot::RwLock;

use crate::error::AppError;

/// Storage keys, one per persisted collection or record
///
/// The names match the browser storage keys used by earlier builds so that
/// exported backups and copied storage dumps stay readable.
pub mod keys {
    pub const SESSION_USER: &str = "mastery_user";
    pub const THEME: &str = "mastery_theme";
    pub const USERS: &str = "registered_users";
    pub const ROLE_CONFIGS: &str = "role_configs";
    pub const SUBJECTS: &str = "psychology_core_subjects";
    pub const CONTENT: &str = "system_content";
    pub const ASSESSMENTS: &str = "system_assessments";
    pub const WHITELIST: &str = "whitelist_entries";
    pub const GLOBAL_SETTINGS: &str = "global_system_settings";
    pub const ACTIVITY_LOGS: &str = "system_logs";
}

/// Key-value persistence port
///
/// Values are opaque strings (JSON documents in practice). Every write
/// replaces the whole value under the key; there is no partial update.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, AppError>;

    fn set(&self, key: &str, value: &str) -> Result<(), AppError>;

    fn remove(&self, key: &str) -> Result<(), AppError>;
}

/// Process-local store, used by tests and throwaway sessions
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), AppError> {
        self.entries.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), AppError> {
        self.entries.write().remove(key);
        Ok(())
    }
}

/// Directory-backed store: each key lives in `<root>/<key>.json`
///
/// Writes go to a temporary sibling first and are renamed into place, so a
/// crash mid-write leaves the previous value readable.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn open(root: impl AsRef<Path>) -> Result<Self, AppError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        tracing::debug!(root = %root.display(), "file store opened");
        Ok(FileStore { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, AppError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(AppError::storage(format!("invalid storage key: {:?}", key)));
        }
        Ok(self.root.join(format!("{}.json", key)))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == IoErrorKind::NotFound => Ok(None),
            Err(err) => {
                tracing::error!("storage read failed for {}: {}", key, err);
                Err(err.into())
            }
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), AppError> {
        let path = self.path_for(key)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), AppError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == IoErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn memory_store_overwrites_whole_value() {
        let store = MemoryStore::new();
        store.set(keys::USERS, "[1]").unwrap();
        store.set(keys::USERS, "[2]").unwrap();
        assert_eq!(store.get(keys::USERS).unwrap().as_deref(), Some("[2]"));
        store.remove(keys::USERS).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn memory_store_clones_share_entries() {
        let store = MemoryStore::new();
        let other = store.clone();
        other.set(keys::THEME, "\"Modern Dark\"").unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn file_store_round_trips_and_reports_absent_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("data")).unwrap();

        assert_eq!(store.get(keys::CONTENT).unwrap(), None);
        store.set(keys::CONTENT, "[]").unwrap();
        assert_eq!(store.get(keys::CONTENT).unwrap().as_deref(), Some("[]"));
        assert!(store.root().join("system_content.json").exists());

        store.remove(keys::CONTENT).unwrap();
        store.remove(keys::CONTENT).unwrap();
        assert_eq!(store.get(keys::CONTENT).unwrap(), None);
    }

    #[test]
    fn file_store_rejects_path_like_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        let err = store.set("../escape", "x").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Storage);
    }
}
