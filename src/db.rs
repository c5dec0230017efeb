use std::sync::Arc;

use serde::{Serialize, de::DeserializeOwned};

use crate::error::AppError;
use crate::store::KeyValueStore;

mod activity;
pub use activity::ActivityExt;

mod assessment;
pub use assessment::AssessmentExt;

mod content;
pub use content::ContentExt;

mod role;
pub use role::RoleExt;

mod session;
pub use session::SessionExt;

mod settings;
pub use settings::SettingsExt;

mod subject;
pub use subject::SubjectExt;

mod user;
pub use user::UserExt;

mod whitelist;
pub use whitelist::WhitelistExt;

/// Default number of activity log entries kept
pub const DEFAULT_LOG_CAPACITY: usize = 200;

/// Repository client over the key-value port
///
/// Every collection is loaded whole, mutated in memory by the caller and
/// written back whole. Cloning is cheap; clones share the same store.
#[derive(Clone)]
pub struct DBClient {
    store: Arc<dyn KeyValueStore>,
    log_capacity: usize,
}

impl DBClient {
    pub fn new(store: impl KeyValueStore + 'static) -> Self {
        DBClient {
            store: Arc::new(store),
            log_capacity: DEFAULT_LOG_CAPACITY,
        }
    }

    pub fn with_log_capacity(mut self, log_capacity: usize) -> Self {
        self.log_capacity = log_capacity;
        self
    }

    pub fn log_capacity(&self) -> usize {
        self.log_capacity
    }

    /// Whether anything has ever been written under `key`
    pub fn has_key(&self, key: &str) -> Result<bool, AppError> {
        Ok(self.store.get(key)?.is_some())
    }

    pub(crate) fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, AppError> {
        match self.store.get(key)? {
            Some(raw) => {
                let value = serde_json::from_str(&raw).map_err(|e| {
                    tracing::error!("stored value under {} is not readable: {}", key, e);
                    AppError::from(e)
                })?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    pub(crate) fn load_or_default<T: DeserializeOwned + Default>(
        &self,
        key: &str,
    ) -> Result<T, AppError> {
        Ok(self.load(key)?.unwrap_or_default())
    }

    pub(crate) fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), AppError> {
        let raw = serde_json::to_string(value)?;
        self.store.set(key, &raw)
    }

    pub(crate) fn remove(&self, key: &str) -> Result<(), AppError> {
        self.store.remove(key)
    }

    /// Raw JSON document under `key`, used by backup export
    pub(crate) fn load_raw(&self, key: &str) -> Result<Option<serde_json::Value>, AppError> {
        self.load(key)
    }

    /// Overwrites `key` with an already-parsed JSON document
    pub(crate) fn save_raw(&self, key: &str, value: &serde_json::Value) -> Result<(), AppError> {
        self.save(key, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::store::{MemoryStore, keys};

    #[test]
    fn unreadable_documents_surface_as_storage_errors() {
        let store = MemoryStore::new();
        store.set(keys::USERS, "{not json").unwrap();
        let db = DBClient::new(store);
        let err = db.load::<Vec<String>>(keys::USERS).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Storage);
    }

    #[test]
    fn absent_collections_load_as_default() {
        let db = DBClient::new(MemoryStore::new());
        let values: Vec<String> = db.load_or_default(keys::CONTENT).unwrap();
        assert!(values.is_empty());
        assert!(!db.has_key(keys::CONTENT).unwrap());
    }
}
