use async_trait::async_trait;
use gantry_core::AppResult;

/// Port over the blob storage holding artifact content.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Deletes one object, or one directory with everything below it.
    ///
    /// Succeeds when nothing exists at `path`.
    async fn delete(&self, path: &str) -> AppResult<()>;

    /// Lists object paths starting with `prefix`.
    ///
    /// Returns an empty list when nothing matches.
    async fn list(&self, prefix: &str) -> AppResult<Vec<String>>;
}
