use super::*;

impl ArtifactCleanupService {
    pub(super) async fn delete_pending_artifacts_within(
        &self,
        deadline: &PassDeadline,
    ) -> AppResult<PhaseSummary> {
        let batch_size = self.settings.delete_batch_size();
        let mut summary = PhaseSummary::new(CleanupPhase::DeletePendingArtifacts);

        loop {
            let artifacts = deadline
                .bound(
                    "pending-delete artifact query",
                    self.artifact_repository
                        .list_pending_delete_artifacts(batch_size),
                )
                .await?;
            summary.batches.push(artifacts.len());
            info!(count = artifacts.len(), "found artifacts pending deletion");

            let mut marked = 0_usize;
            for artifact in &artifacts {
                deadline.check("deleting the next artifact")?;
                if self.delete_artifact(deadline, artifact, &mut summary).await {
                    marked += 1;
                }
            }

            if artifacts.len() < batch_size {
                debug!("no more artifacts pending deletion");
                break;
            }

            // Rows that failed to be marked come back in the next batch; a full
            // batch of them would be fetched forever.
            if marked == 0 {
                warn!(
                    batch_size,
                    "no artifact of a full batch could be marked deleted, stopping"
                );
                break;
            }
        }

        Ok(summary)
    }

    /// Returns true once the artifact row is marked deleted.
    async fn delete_artifact(
        &self,
        deadline: &PassDeadline,
        artifact: &Artifact,
        summary: &mut PhaseSummary,
    ) -> bool {
        let target = artifact.id.to_string();

        if let Err(mark_error) = deadline
            .bound(
                "artifact deletion update",
                self.artifact_repository.set_artifact_deleted(artifact.id),
            )
            .await
        {
            error!(artifact_id = %artifact.id, error = %mark_error, "cannot set artifact deleted");
            summary.record(target, CleanupOutcome::Failed, Some(mark_error.to_string()));
            return false;
        }

        if let Err(delete_error) = self
            .delete_object(deadline, artifact.storage_path.as_str())
            .await
        {
            error!(
                artifact_id = %artifact.id,
                storage_path = %artifact.storage_path,
                error = %delete_error,
                "cannot delete artifact object"
            );
            summary.record(target, CleanupOutcome::Failed, Some(delete_error.to_string()));
            return true;
        }

        info!(artifact_id = %artifact.id, "artifact set deleted");
        summary.record(target, CleanupOutcome::Deleted, None);
        true
    }
}
