use super::*;

impl ArtifactCleanupService {
    pub(super) async fn expire_artifacts_within(
        &self,
        deadline: &PassDeadline,
    ) -> AppResult<PhaseSummary> {
        let mut summary = PhaseSummary::new(CleanupPhase::ExpireArtifacts);
        let artifacts = deadline
            .bound(
                "expired artifact query",
                self.artifact_repository
                    .list_need_expired_artifacts(Utc::now()),
            )
            .await?;
        info!(count = artifacts.len(), "found expired artifacts");

        for artifact in artifacts {
            deadline.check("expiring the next artifact")?;
            self.expire_artifact(deadline, &artifact, &mut summary)
                .await;
        }

        Ok(summary)
    }

    async fn expire_artifact(
        &self,
        deadline: &PassDeadline,
        artifact: &Artifact,
        summary: &mut PhaseSummary,
    ) {
        let target = artifact.id.to_string();

        // An active row must never outlive its object.
        if let Err(mark_error) = deadline
            .bound(
                "artifact expiry update",
                self.artifact_repository.set_artifact_expired(artifact.id),
            )
            .await
        {
            error!(artifact_id = %artifact.id, error = %mark_error, "cannot set artifact expired");
            summary.record(target, CleanupOutcome::Failed, Some(mark_error.to_string()));
            return;
        }

        if let Err(delete_error) = self
            .delete_object(deadline, artifact.storage_path.as_str())
            .await
        {
            error!(
                artifact_id = %artifact.id,
                storage_path = %artifact.storage_path,
                error = %delete_error,
                "cannot delete expired artifact object"
            );
            summary.record(target, CleanupOutcome::Failed, Some(delete_error.to_string()));
            return;
        }

        info!(artifact_id = %artifact.id, "artifact set expired");
        summary.record(target, CleanupOutcome::Deleted, None);
    }
}
