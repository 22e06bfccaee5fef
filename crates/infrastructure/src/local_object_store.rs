use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use gantry_application::ObjectStore;
use gantry_core::{AppError, AppResult};
use tracing::debug;

/// Object store rooted at a local directory.
///
/// Object paths are `/`-separated and relative to the root.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    /// Creates a store rooted at `root`; the directory does not have to exist yet.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.root.as_path()
    }

    fn resolve(&self, path: &str) -> AppResult<PathBuf> {
        let relative = Path::new(path);
        if path.is_empty()
            || relative
                .components()
                .any(|component| !matches!(component, Component::Normal(_)))
        {
            return Err(AppError::Validation(format!(
                "object path '{path}' must be relative and must not leave the store root"
            )));
        }

        Ok(self.root.join(relative))
    }

    fn object_path(&self, absolute: &Path) -> Option<String> {
        let relative = absolute.strip_prefix(&self.root).ok()?;
        let parts: Vec<String> = relative
            .components()
            .map(|component| component.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(parts.join("/"))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn delete(&self, path: &str) -> AppResult<()> {
        let target = self.resolve(path)?;

        let metadata = match tokio::fs::symlink_metadata(&target).await {
            Ok(metadata) => metadata,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(()),
            Err(error) => {
                return Err(AppError::ObjectStore(format!(
                    "failed to inspect object '{path}': {error}"
                )));
            }
        };

        let removed = if metadata.is_dir() {
            tokio::fs::remove_dir_all(&target).await
        } else {
            tokio::fs::remove_file(&target).await
        };

        match removed {
            Ok(()) => {
                debug!(path, "object deleted");
                Ok(())
            }
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
            Err(error) => Err(AppError::ObjectStore(format!(
                "failed to delete object '{path}': {error}"
            ))),
        }
    }

    async fn list(&self, prefix: &str) -> AppResult<Vec<String>> {
        let mut objects = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(directory) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&directory).await {
                Ok(entries) => entries,
                Err(error) if error.kind() == ErrorKind::NotFound => continue,
                Err(error) => {
                    return Err(AppError::ObjectStore(format!(
                        "failed to list directory '{}': {error}",
                        directory.display()
                    )));
                }
            };

            while let Some(entry) = entries.next_entry().await.map_err(|error| {
                AppError::ObjectStore(format!(
                    "failed to read directory '{}': {error}",
                    directory.display()
                ))
            })? {
                let file_type = entry.file_type().await.map_err(|error| {
                    AppError::ObjectStore(format!(
                        "failed to inspect '{}': {error}",
                        entry.path().display()
                    ))
                })?;

                if file_type.is_dir() {
                    pending.push(entry.path());
                    continue;
                }

                if let Some(object_path) = self.object_path(entry.path().as_path())
                    && object_path.starts_with(prefix)
                {
                    objects.push(object_path);
                }
            }
        }

        objects.sort();
        Ok(objects)
    }
}
