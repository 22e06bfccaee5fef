use super::*;

impl PostgresRunRepository {
    pub(super) async fn create_run_with_jobs_impl(
        &self,
        input: CreateRunInput,
    ) -> AppResult<CreatedRun> {
        let repo_id = input.repo_id;
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Persistence(format!(
                "failed to start run transaction for repository [{repo_id}]: {error}"
            ))
        })?;

        // Serializes creations per repository so each counter recount sees
        // every run committed before it.
        let locked = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT id
            FROM repositories
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(repo_id.as_i64())
        .fetch_optional(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Persistence(format!(
                "failed to lock repository [{repo_id}] for run creation: {error}"
            ))
        })?;

        if locked.is_none() {
            return Err(AppError::NotFound(format!(
                "repository [{repo_id}] does not exist"
            )));
        }

        let run_row = sqlx::query_as::<_, RunRow>(
            r#"
            INSERT INTO action_runs (
                title,
                repo_id,
                workflow_id,
                run_index,
                trigger_user_id,
                ref,
                commit_sha,
                event,
                token,
                grant_scope,
                event_payload,
                status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING
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
            "#,
        )
        .bind(input.title.as_str())
        .bind(repo_id.as_i64())
        .bind(input.workflow_id.as_str())
        .bind(input.index)
        .bind(input.trigger_user_id)
        .bind(input.git_ref.as_str())
        .bind(input.commit_sha.as_str())
        .bind(input.event.as_str())
        .bind(input.token.as_str())
        .bind(input.grant.as_str())
        .bind(input.event_payload.as_str())
        .bind(input.status.as_str())
        .fetch_one(&mut *transaction)
        .await
        .map_err(|error| {
            write_error(
                error,
                format!(
                    "failed to insert run #{} for repository [{repo_id}]",
                    input.index
                )
                .as_str(),
            )
        })?;

        let counters = sqlx::query(
            r#"
            UPDATE repositories
            SET
                num_runs = (
                    SELECT COUNT(*) FROM action_runs WHERE repo_id = $1
                ),
                num_closed_runs = (
                    SELECT COUNT(*) FROM action_runs WHERE repo_id = $1 AND status = ANY($2)
                )
            WHERE id = $1
            "#,
        )
        .bind(repo_id.as_i64())
        .bind(RunStatus::closed_storage_values())
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Persistence(format!(
                "failed to update run counters of repository [{repo_id}]: {error}"
            ))
        })?;

        if counters.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "repository [{repo_id}] does not exist"
            )));
        }

        let mut job_rows = if input.jobs.is_empty() {
            Vec::new()
        } else {
            let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new(
                "INSERT INTO action_run_jobs (run_id, name, ready, workflow_payload, job_id, needs, runs_on, status) ",
            );
            builder.push_values(input.jobs.iter(), |mut row, job| {
                row.push_bind(run_row.id)
                    .push_bind(job.name.clone())
                    .push_bind(job.ready)
                    .push_bind(job.workflow_payload.clone())
                    .push_bind(job.job_id.clone())
                    .push_bind(job.needs.clone())
                    .push_bind(job.runs_on.clone())
                    .push_bind(job.status.as_str());
            });
            builder.push(
                " RETURNING id, run_id, name, ready, workflow_payload, job_id, needs, runs_on, status, started_at, stopped_at, created_at, updated_at",
            );

            builder
                .build_query_as::<RunJobRow>()
                .fetch_all(&mut *transaction)
                .await
                .map_err(|error| {
                    write_error(
                        error,
                        format!("failed to insert jobs of run [{}]", run_row.id).as_str(),
                    )
                })?
        };
        job_rows.sort_by_key(|row| row.id);

        transaction.commit().await.map_err(|error| {
            AppError::Persistence(format!(
                "failed to commit run [{}] of repository [{repo_id}]: {error}",
                run_row.id
            ))
        })?;

        Ok(CreatedRun {
            run: run_from_row(run_row)?,
            jobs: job_rows
                .into_iter()
                .map(run_job_from_row)
                .collect::<AppResult<Vec<_>>>()?,
        })
    }
}
