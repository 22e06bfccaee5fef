use async_trait::async_trait;
use gantry_core::{AppResult, RepoId, RunId};
use gantry_domain::{NewRun, NewRunJob, RepositoryRunCounters, Run, RunColumn, RunJob, RunStatus};

/// Run aggregate prepared for one transactional insert.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateRunInput {
    /// Display title.
    pub title: String,
    /// Owning repository.
    pub repo_id: RepoId,
    /// Workflow file name.
    pub workflow_id: String,
    /// Allocated per-repository index.
    pub index: i64,
    /// User that triggered the run.
    pub trigger_user_id: i64,
    /// Git ref.
    pub git_ref: String,
    /// Commit sha.
    pub commit_sha: String,
    /// Triggering event name.
    pub event: String,
    /// Execution token.
    pub token: String,
    /// Token permissions.
    pub grant: String,
    /// Raw triggering event payload.
    pub event_payload: String,
    /// Initial status.
    pub status: RunStatus,
    /// Jobs inserted in the same transaction.
    pub jobs: Vec<NewRunJob>,
}

impl CreateRunInput {
    /// Combines caller attributes with the allocated index and token.
    #[must_use]
    pub fn new(run: NewRun, index: i64, token: String, jobs: Vec<NewRunJob>) -> Self {
        Self {
            title: run.title,
            repo_id: run.repo_id,
            workflow_id: run.workflow_id,
            index,
            trigger_user_id: run.trigger_user_id,
            git_ref: run.git_ref,
            commit_sha: run.commit_sha,
            event: run.event,
            token,
            grant: run.grant,
            event_payload: run.event_payload,
            status: run.status,
            jobs,
        }
    }
}

/// Run and jobs as persisted by one successful creation.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedRun {
    /// Persisted run.
    pub run: Run,
    /// Persisted jobs in insertion order.
    pub jobs: Vec<RunJob>,
}

/// Repository port for workflow runs, their jobs and repository run counters.
#[async_trait]
pub trait RunRepository: Send + Sync {
    /// Inserts a run with all of its jobs and recomputes the repository counters.
    ///
    /// Either every row becomes visible or none does.
    async fn create_run_with_jobs(&self, input: CreateRunInput) -> AppResult<CreatedRun>;

    /// Returns one run by id.
    async fn find_run(&self, run_id: RunId) -> AppResult<Option<Run>>;

    /// Writes the given columns of `run`; `columns` is never empty.
    async fn update_run(&self, run: &Run, columns: &[RunColumn]) -> AppResult<()>;

    /// Lists the jobs of one run in insertion order.
    async fn list_run_jobs(&self, run_id: RunId) -> AppResult<Vec<RunJob>>;

    /// Returns cached run counters of one repository.
    async fn repository_counters(&self, repo_id: RepoId) -> AppResult<RepositoryRunCounters>;
}
