use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gantry_core::{AppResult, ArtifactId};
use gantry_domain::Artifact;

/// Repository port for artifact metadata.
#[async_trait]
pub trait ArtifactRepository: Send + Sync {
    /// Lists active artifacts whose retention deadline is before `now`.
    async fn list_need_expired_artifacts(&self, now: DateTime<Utc>) -> AppResult<Vec<Artifact>>;

    /// Marks one artifact expired; a no-op when it is not active anymore.
    async fn set_artifact_expired(&self, artifact_id: ArtifactId) -> AppResult<()>;

    /// Lists up to `limit` artifacts flagged for deletion, oldest first.
    async fn list_pending_delete_artifacts(&self, limit: usize) -> AppResult<Vec<Artifact>>;

    /// Marks one artifact deleted; a no-op when it is already deleted.
    async fn set_artifact_deleted(&self, artifact_id: ArtifactId) -> AppResult<()>;
}
