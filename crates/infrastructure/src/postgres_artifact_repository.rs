use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gantry_application::ArtifactRepository;
use gantry_core::{AppError, AppResult, ArtifactId, RunId};
use gantry_domain::{Artifact, ArtifactStatus};
use sqlx::{FromRow, PgPool};

/// PostgreSQL-backed artifact metadata repository.
#[derive(Clone)]
pub struct PostgresArtifactRepository {
    pool: PgPool,
}

impl PostgresArtifactRepository {
    /// Creates an artifact repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Moves one artifact to `status`; a no-op when it is already there or,
    /// with `from` set, when it is in any other status.
    async fn transition(
        &self,
        artifact_id: ArtifactId,
        from: Option<ArtifactStatus>,
        status: ArtifactStatus,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE action_artifacts
            SET status = $2, updated_at = now()
            WHERE id = $1
              AND status <> $2
              AND ($3::TEXT IS NULL OR status = $3)
            "#,
        )
        .bind(artifact_id.as_i64())
        .bind(status.as_str())
        .bind(from.map(|from| from.as_str()))
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Persistence(format!(
                "failed to set artifact [{artifact_id}] {}: {error}",
                status.as_str()
            ))
        })?;

        Ok(())
    }
}

#[derive(Debug, FromRow)]
struct ArtifactRow {
    id: i64,
    run_id: i64,
    name: String,
    storage_path: String,
    status: String,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[async_trait]
impl ArtifactRepository for PostgresArtifactRepository {
    async fn list_need_expired_artifacts(&self, now: DateTime<Utc>) -> AppResult<Vec<Artifact>> {
        let rows = sqlx::query_as::<_, ArtifactRow>(
            r#"
            SELECT
                id,
                run_id,
                name,
                storage_path,
                status,
                expires_at,
                created_at,
                updated_at
            FROM action_artifacts
            WHERE status = $1 AND expires_at < $2
            ORDER BY id
            "#,
        )
        .bind(ArtifactStatus::Active.as_str())
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Persistence(format!("failed to list expired artifacts: {error}"))
        })?;

        rows.into_iter().map(artifact_from_row).collect()
    }

    async fn set_artifact_expired(&self, artifact_id: ArtifactId) -> AppResult<()> {
        self.transition(artifact_id, Some(ArtifactStatus::Active), ArtifactStatus::Expired)
            .await
    }

    async fn list_pending_delete_artifacts(&self, limit: usize) -> AppResult<Vec<Artifact>> {
        let rows = sqlx::query_as::<_, ArtifactRow>(
            r#"
            SELECT
                id,
                run_id,
                name,
                storage_path,
                status,
                expires_at,
                created_at,
                updated_at
            FROM action_artifacts
            WHERE status = $1
            ORDER BY id
            LIMIT $2
            "#,
        )
        .bind(ArtifactStatus::PendingDelete.as_str())
        .bind(i64::try_from(limit).map_err(|error| {
            AppError::Validation(format!("invalid pending-delete batch size: {error}"))
        })?)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Persistence(format!(
                "failed to list artifacts pending deletion: {error}"
            ))
        })?;

        rows.into_iter().map(artifact_from_row).collect()
    }

    async fn set_artifact_deleted(&self, artifact_id: ArtifactId) -> AppResult<()> {
        self.transition(artifact_id, None, ArtifactStatus::Deleted)
            .await
    }
}

fn artifact_from_row(row: ArtifactRow) -> AppResult<Artifact> {
    Ok(Artifact {
        id: ArtifactId::new(row.id),
        run_id: RunId::new(row.run_id),
        name: row.name,
        storage_path: row.storage_path,
        status: ArtifactStatus::parse(row.status.as_str())?,
        expires_at: row.expires_at,
        created: row.created_at,
        updated: row.updated_at,
    })
}
