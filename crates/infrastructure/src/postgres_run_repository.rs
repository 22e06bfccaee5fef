use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gantry_application::{CreateRunInput, CreatedRun, RunRepository};
use gantry_core::{AppError, AppResult, RepoId, RunId};
use gantry_domain::{RepositoryRunCounters, Run, RunColumn, RunJob, RunStatus};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};

mod create;
mod update;

/// PostgreSQL-backed repository of workflow runs and their jobs.
#[derive(Clone)]
pub struct PostgresRunRepository {
    pool: PgPool,
}

impl PostgresRunRepository {
    /// Creates a run repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct RunRow {
    id: i64,
    title: String,
    repo_id: i64,
    workflow_id: String,
    run_index: i64,
    trigger_user_id: i64,
    git_ref: String,
    commit_sha: String,
    event: String,
    token: String,
    grant_scope: String,
    event_payload: String,
    status: String,
    started_at: Option<DateTime<Utc>>,
    stopped_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct RunJobRow {
    id: i64,
    run_id: i64,
    name: String,
    ready: bool,
    workflow_payload: Vec<u8>,
    job_id: String,
    needs: Vec<String>,
    runs_on: Vec<String>,
    status: String,
    started_at: Option<DateTime<Utc>>,
    stopped_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct CountersRow {
    num_runs: i64,
    num_closed_runs: i64,
}

#[async_trait]
impl RunRepository for PostgresRunRepository {
    async fn create_run_with_jobs(&self, input: CreateRunInput) -> AppResult<CreatedRun> {
        self.create_run_with_jobs_impl(input).await
    }

    async fn find_run(&self, run_id: RunId) -> AppResult<Option<Run>> {
        let row = sqlx::query_as::<_, RunRow>(
            r#"
            SELECT
                id,
                title,
                repo_id,
                workflow_id,
                run_index,
                trigger_user_id,
                ref AS git_ref,
                commit_sha,
                event,
                token,
                grant_scope,
                event_payload,
                status,
                started_at,
                stopped_at,
                created_at,
                updated_at
            FROM action_runs
            WHERE id = $1
            "#,
        )
        .bind(run_id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Persistence(format!("failed to load run [{run_id}]: {error}"))
        })?;

        row.map(run_from_row).transpose()
    }

    async fn update_run(&self, run: &Run, columns: &[RunColumn]) -> AppResult<()> {
        self.update_run_impl(run, columns).await
    }

    async fn list_run_jobs(&self, run_id: RunId) -> AppResult<Vec<RunJob>> {
        let rows = sqlx::query_as::<_, RunJobRow>(
            r#"
            SELECT
                id,
                run_id,
                name,
                ready,
                workflow_payload,
                job_id,
                needs,
                runs_on,
                status,
                started_at,
                stopped_at,
                created_at,
                updated_at
            FROM action_run_jobs
            WHERE run_id = $1
            ORDER BY id
            "#,
        )
        .bind(run_id.as_i64())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Persistence(format!("failed to list jobs of run [{run_id}]: {error}"))
        })?;

        rows.into_iter().map(run_job_from_row).collect()
    }

    async fn repository_counters(&self, repo_id: RepoId) -> AppResult<RepositoryRunCounters> {
        let row = sqlx::query_as::<_, CountersRow>(
            r#"
            SELECT num_runs, num_closed_runs
            FROM repositories
            WHERE id = $1
            "#,
        )
        .bind(repo_id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Persistence(format!(
                "failed to load run counters of repository [{repo_id}]: {error}"
            ))
        })?;

        row.map(|row| RepositoryRunCounters {
            num_runs: row.num_runs,
            num_closed_runs: row.num_closed_runs,
        })
        .ok_or_else(|| AppError::NotFound(format!("repository [{repo_id}] does not exist")))
    }
}

fn run_from_row(row: RunRow) -> AppResult<Run> {
    Ok(Run {
        id: RunId::new(row.id),
        title: row.title,
        repo_id: RepoId::new(row.repo_id),
        workflow_id: row.workflow_id,
        index: row.run_index,
        trigger_user_id: row.trigger_user_id,
        git_ref: row.git_ref,
        commit_sha: row.commit_sha,
        event: row.event,
        token: row.token,
        grant: row.grant_scope,
        event_payload: row.event_payload,
        status: RunStatus::parse(row.status.as_str())?,
        started: row.started_at,
        stopped: row.stopped_at,
        created: row.created_at,
        updated: row.updated_at,
    })
}

fn run_job_from_row(row: RunJobRow) -> AppResult<RunJob> {
    Ok(RunJob {
        id: row.id,
        run_id: RunId::new(row.run_id),
        name: row.name,
        ready: row.ready,
        workflow_payload: row.workflow_payload,
        job_id: row.job_id,
        needs: row.needs,
        runs_on: row.runs_on,
        status: RunStatus::parse(row.status.as_str())?,
        started: row.started_at,
        stopped: row.stopped_at,
        created: row.created_at,
        updated: row.updated_at,
    })
}

/// Maps a failed write, surfacing constraint violations as domain errors.
fn write_error(error: sqlx::Error, context: &str) -> AppError {
    if let sqlx::Error::Database(database_error) = &error {
        match database_error.code().as_deref() {
            Some("23505") => {
                return AppError::Conflict(format!("{context}: {}", database_error.message()));
            }
            Some("23503") => {
                return AppError::NotFound(format!("{context}: {}", database_error.message()));
            }
            _ => {}
        }
    }

    AppError::Persistence(format!("{context}: {error}"))
}
