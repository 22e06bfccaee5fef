use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use gantry_application::ObjectStore;
use gantry_core::{AppError, AppResult};

/// In-memory object store for tests and local development.
///
/// Paths are flat keys; deleting `dir` also removes every key below `dir/`.
#[derive(Debug, Clone, Default)]
pub struct InMemoryObjectStore {
    objects: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
}

impl InMemoryObjectStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `content` at `path`, replacing any previous object.
    pub fn put(&self, path: impl Into<String>, content: impl Into<Vec<u8>>) -> AppResult<()> {
        self.objects
            .write()
            .map_err(|_| AppError::Internal("object store lock poisoned".to_owned()))?
            .insert(path.into(), content.into());
        Ok(())
    }

    /// Returns whether an object exists at exactly `path`.
    pub fn contains(&self, path: &str) -> AppResult<bool> {
        Ok(self
            .objects
            .read()
            .map_err(|_| AppError::Internal("object store lock poisoned".to_owned()))?
            .contains_key(path))
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn delete(&self, path: &str) -> AppResult<()> {
        let directory = format!("{}/", path.trim_end_matches('/'));
        self.objects
            .write()
            .map_err(|_| AppError::Internal("object store lock poisoned".to_owned()))?
            .retain(|key, _| key != path && !key.starts_with(directory.as_str()));
        Ok(())
    }

    async fn list(&self, prefix: &str) -> AppResult<Vec<String>> {
        let objects = self
            .objects
            .read()
            .map_err(|_| AppError::Internal("object store lock poisoned".to_owned()))?;

        Ok(objects
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }
}
