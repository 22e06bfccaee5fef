use async_trait::async_trait;
use gantry_application::{IndexScope, RunIndexAllocator};
use gantry_core::{AppError, AppResult};
use sqlx::PgPool;

/// PostgreSQL-backed allocator of per-scope sequence numbers.
///
/// Every grant is committed on its own, outside any caller transaction, so a
/// rolled back creation leaves a gap instead of a reusable value.
#[derive(Clone)]
pub struct PostgresRunIndexAllocator {
    pool: PgPool,
}

impl PostgresRunIndexAllocator {
    /// Creates an allocator with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RunIndexAllocator for PostgresRunIndexAllocator {
    async fn next_index(&self, scope: &IndexScope) -> AppResult<i64> {
        sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO resource_indexes (resource, group_id, max_index)
            VALUES ($1, $2, 1)
            ON CONFLICT (resource, group_id)
            DO UPDATE SET max_index = resource_indexes.max_index + 1
            RETURNING max_index
            "#,
        )
        .bind(scope.resource())
        .bind(scope.group_id())
        .fetch_one(&self.pool)
        .await
        .map_err(|error| {
            AppError::Persistence(format!(
                "failed to allocate next '{}' index for group '{}': {error}",
                scope.resource(),
                scope.group_id()
            ))
        })
    }
}
