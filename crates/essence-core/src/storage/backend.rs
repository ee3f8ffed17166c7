use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use crate::error::RecipeError;

/// Raw key/value persistence underneath [`super::Storage`].
///
/// Keys arrive already namespaced. Implementations do not interpret values.
pub trait StorageBackend: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, RecipeError>;
    fn write(&self, key: &str, value: &[u8]) -> Result<(), RecipeError>;
    fn remove(&self, key: &str) -> Result<(), RecipeError>;
    fn keys(&self) -> Result<Vec<String>, RecipeError>;
}

/// Process-local storage, gone when the process exits.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryBackend {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, RecipeError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn write(&self, key: &str, value: &[u8]) -> Result<(), RecipeError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), RecipeError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, RecipeError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.keys().cloned().collect())
    }
}
