use super::*;

/// Run state observed for one temporary directory during a sweep.
#[derive(Debug, Clone)]
enum TempRunState {
    Missing,
    Present(RunStatus),
    LookupFailed(String),
}

impl ArtifactCleanupService {
    pub(super) async fn sweep_temp_objects_within(
        &self,
        deadline: &PassDeadline,
    ) -> AppResult<PhaseSummary> {
        let prefix = self.settings.temp_prefix();
        let mut summary = PhaseSummary::new(CleanupPhase::SweepTempObjects);
        let paths = deadline
            .bound("temporary object listing", self.object_store.list(prefix))
            .await?;
        debug!(count = paths.len(), prefix, "listed temporary objects");

        let mut runs: HashMap<RunId, TempRunState> = HashMap::new();
        for path in paths {
            deadline.check("sweeping the next temporary object")?;

            let temp_path = match TempObjectPath::parse(prefix, path.as_str()) {
                Ok(Some(temp_path)) => temp_path,
                Ok(None) => continue,
                Err(parse_error) => {
                    warn!(path = %path, error = %parse_error, "cannot attribute temporary object to a run");
                    summary.record(path, CleanupOutcome::SkippedError, Some(parse_error.to_string()));
                    continue;
                }
            };

            let run_id = temp_path.run_id();
            let state = match runs.get(&run_id) {
                Some(state) => state.clone(),
                None => {
                    let state = self.lookup_temp_run(deadline, run_id).await;
                    runs.insert(run_id, state.clone());
                    state
                }
            };

            match state {
                TempRunState::Missing => {
                    warn!(run_id = %run_id, path = %path, "run not found, clean up");
                    self.delete_temp_object(deadline, &temp_path, &mut summary)
                        .await;
                }
                TempRunState::Present(status) if status.is_active() => {
                    debug!(run_id = %run_id, status = status.as_str(), "run is still active, skip cleaning");
                    summary.record(path, CleanupOutcome::SkippedActiveRun, None);
                }
                TempRunState::Present(status) => {
                    info!(run_id = %run_id, status = status.as_str(), path = %path, "run is not active, clean up");
                    self.delete_temp_object(deadline, &temp_path, &mut summary)
                        .await;
                }
                TempRunState::LookupFailed(reason) => {
                    summary.record(path, CleanupOutcome::SkippedError, Some(reason));
                }
            }
        }

        Ok(summary)
    }

    async fn lookup_temp_run(&self, deadline: &PassDeadline, run_id: RunId) -> TempRunState {
        match deadline
            .bound("run lookup", self.run_repository.find_run(run_id))
            .await
        {
            Ok(Some(run)) => TempRunState::Present(run.status),
            Ok(None) => TempRunState::Missing,
            Err(lookup_error) if lookup_error.is_not_found() => TempRunState::Missing,
            Err(lookup_error) => {
                warn!(run_id = %run_id, error = %lookup_error, "cannot get run");
                TempRunState::LookupFailed(lookup_error.to_string())
            }
        }
    }

    async fn delete_temp_object(
        &self,
        deadline: &PassDeadline,
        temp_path: &TempObjectPath,
        summary: &mut PhaseSummary,
    ) {
        let mut paths = vec![temp_path.path()];
        if temp_path.directory() != temp_path.path() {
            paths.push(temp_path.directory());
        }

        for path in paths {
            if let Err(delete_error) = self.delete_object(deadline, path).await {
                warn!(path, error = %delete_error, "cannot delete temporary object");
                summary.record(
                    temp_path.path(),
                    CleanupOutcome::Failed,
                    Some(delete_error.to_string()),
                );
                return;
            }
        }

        summary.record(temp_path.path(), CleanupOutcome::Deleted, None);
    }
}
