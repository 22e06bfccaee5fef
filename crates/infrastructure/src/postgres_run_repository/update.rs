use super::*;

impl PostgresRunRepository {
    pub(super) async fn update_run_impl(&self, run: &Run, columns: &[RunColumn]) -> AppResult<()> {
        let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new("UPDATE action_runs SET ");
        let mut assignments = builder.separated(", ");

        for column in columns {
            match column {
                RunColumn::Title => {
                    assignments.push("title = ");
                    assignments.push_bind_unseparated(run.title.as_str());
                }
                RunColumn::WorkflowId => {
                    assignments.push("workflow_id = ");
                    assignments.push_bind_unseparated(run.workflow_id.as_str());
                }
                RunColumn::TriggerUserId => {
                    assignments.push("trigger_user_id = ");
                    assignments.push_bind_unseparated(run.trigger_user_id);
                }
                RunColumn::GitRef => {
                    assignments.push("ref = ");
                    assignments.push_bind_unseparated(run.git_ref.as_str());
                }
                RunColumn::CommitSha => {
                    assignments.push("commit_sha = ");
                    assignments.push_bind_unseparated(run.commit_sha.as_str());
                }
                RunColumn::Event => {
                    assignments.push("event = ");
                    assignments.push_bind_unseparated(run.event.as_str());
                }
                RunColumn::Token => {
                    assignments.push("token = ");
                    assignments.push_bind_unseparated(run.token.as_str());
                }
                RunColumn::Grant => {
                    assignments.push("grant_scope = ");
                    assignments.push_bind_unseparated(run.grant.as_str());
                }
                RunColumn::EventPayload => {
                    assignments.push("event_payload = ");
                    assignments.push_bind_unseparated(run.event_payload.as_str());
                }
                RunColumn::Status => {
                    assignments.push("status = ");
                    assignments.push_bind_unseparated(run.status.as_str());
                }
                RunColumn::Started => {
                    assignments.push("started_at = ");
                    assignments.push_bind_unseparated(run.started);
                }
                RunColumn::Stopped => {
                    assignments.push("stopped_at = ");
                    assignments.push_bind_unseparated(run.stopped);
                }
            }
        }
        assignments.push("updated_at = now()");

        builder.push(" WHERE id = ");
        builder.push_bind(run.id.as_i64());

        let result = builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(|error| write_error(error, format!("failed to update run [{}]", run.id).as_str()))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "run [{}] does not exist",
                run.id
            )));
        }

        Ok(())
    }
}
