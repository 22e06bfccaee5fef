use chrono::{DateTime, Duration, Utc};
use gantry_core::{AppError, AppResult, RepoId, RunId};
use serde::{Deserialize, Serialize};

/// Execution status shared by runs and run jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Status could not be determined.
    Unknown,
    /// Finished successfully.
    Success,
    /// Finished with a failure.
    Failure,
    /// Cancelled before finishing.
    Cancelled,
    /// Skipped without executing.
    Skipped,
    /// Queued and waiting for a runner.
    Waiting,
    /// Currently executing.
    Running,
    /// Blocked on an approval or a concurrency group.
    Blocked,
}

impl RunStatus {
    /// Statuses counted by the repository `num_closed_runs` aggregate.
    pub const CLOSED: [Self; 4] = [Self::Success, Self::Failure, Self::Cancelled, Self::Skipped];

    /// Returns stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Cancelled => "cancelled",
            Self::Skipped => "skipped",
            Self::Waiting => "waiting",
            Self::Running => "running",
            Self::Blocked => "blocked",
        }
    }

    /// Parses storage value.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "unknown" => Ok(Self::Unknown),
            "success" => Ok(Self::Success),
            "failure" => Ok(Self::Failure),
            "cancelled" => Ok(Self::Cancelled),
            "skipped" => Ok(Self::Skipped),
            "waiting" => Ok(Self::Waiting),
            "running" => Ok(Self::Running),
            "blocked" => Ok(Self::Blocked),
            _ => Err(AppError::Validation(format!("unknown run status '{value}'"))),
        }
    }

    /// Returns true once the run reached a terminal state.
    #[must_use]
    pub fn is_done(&self) -> bool {
        match self {
            Self::Success | Self::Failure | Self::Cancelled | Self::Skipped => true,
            Self::Unknown | Self::Waiting | Self::Running | Self::Blocked => false,
        }
    }

    /// Returns true while jobs of the run may still write staged objects.
    #[must_use]
    pub fn is_active(&self) -> bool {
        match self {
            Self::Waiting | Self::Running => true,
            Self::Unknown
            | Self::Success
            | Self::Failure
            | Self::Cancelled
            | Self::Skipped
            | Self::Blocked => false,
        }
    }

    /// Returns true when the run is counted by `num_closed_runs`.
    #[must_use]
    pub fn counts_as_closed(&self) -> bool {
        Self::CLOSED.contains(self)
    }

    /// Returns stable storage values of every closed status.
    #[must_use]
    pub fn closed_storage_values() -> Vec<&'static str> {
        Self::CLOSED.iter().map(Self::as_str).collect()
    }
}

/// Persisted workflow run.
#[derive(Debug, Clone, PartialEq)]
pub struct Run {
    /// Store-assigned identifier.
    pub id: RunId,
    /// Display title.
    pub title: String,
    /// Owning repository.
    pub repo_id: RepoId,
    /// Workflow file name the run executes.
    pub workflow_id: String,
    /// Per-repository sequence number, never reused.
    pub index: i64,
    /// User that triggered the run.
    pub trigger_user_id: i64,
    /// Git ref the run executes against.
    pub git_ref: String,
    /// Commit the run executes against.
    pub commit_sha: String,
    /// Triggering webhook event name.
    pub event: String,
    /// Execution token handed to runners.
    pub token: String,
    /// Permissions granted to the execution token.
    pub grant: String,
    /// Raw triggering event payload.
    pub event_payload: String,
    /// Current status.
    pub status: RunStatus,
    /// Execution start.
    pub started: Option<DateTime<Utc>>,
    /// Execution stop.
    pub stopped: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created: DateTime<Utc>,
    /// Last update timestamp.
    pub updated: DateTime<Utc>,
}

impl Run {
    /// Returns wall-clock execution time once both timestamps are known.
    #[must_use]
    pub fn duration(&self) -> Option<Duration> {
        match (self.started, self.stopped) {
            (Some(started), Some(stopped)) => Some(stopped - started),
            _ => None,
        }
    }
}

/// Caller-supplied attributes of a run that is about to be created.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRun {
    /// Display title.
    pub title: String,
    /// Owning repository.
    pub repo_id: RepoId,
    /// Workflow file name.
    pub workflow_id: String,
    /// User that triggered the run.
    pub trigger_user_id: i64,
    /// Git ref.
    pub git_ref: String,
    /// Commit sha.
    pub commit_sha: String,
    /// Triggering event name.
    pub event: String,
    /// Execution token; generated on creation when absent.
    pub token: Option<String>,
    /// Token permissions.
    pub grant: String,
    /// Raw triggering event payload.
    pub event_payload: String,
    /// Initial status.
    pub status: RunStatus,
}

impl NewRun {
    /// Validates caller-supplied run attributes.
    pub fn validate(&self) -> AppResult<()> {
        if self.workflow_id.trim().is_empty() {
            return Err(AppError::Validation(
                "run workflow_id must not be empty".to_owned(),
            ));
        }

        if self.commit_sha.trim().is_empty() {
            return Err(AppError::Validation(
                "run commit_sha must not be empty".to_owned(),
            ));
        }

        if let Some(token) = &self.token
            && token.trim().is_empty()
        {
            return Err(AppError::Validation(
                "run token must not be empty when provided".to_owned(),
            ));
        }

        Ok(())
    }
}

/// Mutable run columns addressable by partial updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunColumn {
    /// `title`
    Title,
    /// `workflow_id`
    WorkflowId,
    /// `trigger_user_id`
    TriggerUserId,
    /// `ref`
    GitRef,
    /// `commit_sha`
    CommitSha,
    /// `event`
    Event,
    /// `token`
    Token,
    /// `grant`
    Grant,
    /// `event_payload`
    EventPayload,
    /// `status`
    Status,
    /// `started`
    Started,
    /// `stopped`
    Stopped,
}

impl RunColumn {
    /// Every mutable column, used for whole-row updates.
    pub const ALL: [Self; 12] = [
        Self::Title,
        Self::WorkflowId,
        Self::TriggerUserId,
        Self::GitRef,
        Self::CommitSha,
        Self::Event,
        Self::Token,
        Self::Grant,
        Self::EventPayload,
        Self::Status,
        Self::Started,
        Self::Stopped,
    ];

    /// Resolves an update column list; an empty list selects every column.
    #[must_use]
    pub fn resolve(columns: &[Self]) -> Vec<Self> {
        if columns.is_empty() {
            return Self::ALL.to_vec();
        }

        let mut resolved = Vec::with_capacity(columns.len());
        for column in columns {
            if !resolved.contains(column) {
                resolved.push(*column);
            }
        }
        resolved
    }
}

/// Cached run aggregates stored on the owning repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RepositoryRunCounters {
    /// Count of every run of the repository.
    pub num_runs: i64,
    /// Count of runs in a closed status.
    pub num_closed_runs: i64,
}
