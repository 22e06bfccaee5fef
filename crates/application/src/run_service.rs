use std::sync::Arc;

use gantry_core::{AppError, AppResult, RepoId, RunId};
use gantry_domain::{JobSpec, NewRun, NewRunJob, RepositoryRunCounters, Run, RunColumn, RunJob};
use tracing::info;

use crate::run_ports::{
    CreateRunInput, CreatedRun, IndexScope, RunIndexAllocator, RunRepository, WorkflowParser,
};

/// Workflow run service for run creation, lookup and updates.
#[derive(Clone)]
pub struct RunService {
    index_allocator: Arc<dyn RunIndexAllocator>,
    repository: Arc<dyn RunRepository>,
    workflow_parser: Option<Arc<dyn WorkflowParser>>,
}

impl RunService {
    /// Creates a run service.
    #[must_use]
    pub fn new(
        index_allocator: Arc<dyn RunIndexAllocator>,
        repository: Arc<dyn RunRepository>,
    ) -> Self {
        Self {
            index_allocator,
            repository,
            workflow_parser: None,
        }
    }

    /// Adds a parser for creating runs from raw workflow documents.
    #[must_use]
    pub fn with_workflow_parser(mut self, workflow_parser: Arc<dyn WorkflowParser>) -> Self {
        self.workflow_parser = Some(workflow_parser);
        self
    }

    /// Creates one run together with a waiting job per spec.
    ///
    /// The index is allocated before the insert transaction starts; when the
    /// insert fails the index is burnt, never reissued.
    pub async fn create_run(&self, run: NewRun, job_specs: Vec<JobSpec>) -> AppResult<CreatedRun> {
        run.validate()?;

        if job_specs.is_empty() {
            return Err(AppError::Validation(format!(
                "workflow '{}' does not declare any job",
                run.workflow_id
            )));
        }

        let jobs = job_specs
            .iter()
            .map(NewRunJob::waiting)
            .collect::<AppResult<Vec<_>>>()?;

        let index = self
            .index_allocator
            .next_index(&IndexScope::runs(run.repo_id))
            .await?;

        let token = run
            .token
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());

        let created = self
            .repository
            .create_run_with_jobs(CreateRunInput::new(run, index, token, jobs))
            .await?;

        info!(
            run_id = %created.run.id,
            repo_id = %created.run.repo_id,
            index = created.run.index,
            jobs = created.jobs.len(),
            "workflow run created"
        );

        Ok(created)
    }

    /// Parses a raw workflow document and creates one run from its jobs.
    pub async fn create_run_from_workflow(
        &self,
        run: NewRun,
        content: &[u8],
    ) -> AppResult<CreatedRun> {
        let Some(workflow_parser) = &self.workflow_parser else {
            return Err(AppError::Internal(
                "run service has no workflow parser configured".to_owned(),
            ));
        };

        let job_specs = workflow_parser.parse(content)?;
        self.create_run(run, job_specs).await
    }

    /// Returns one run or a not-found error.
    pub async fn get_run(&self, run_id: RunId) -> AppResult<Run> {
        self.repository
            .find_run(run_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("run [{run_id}] does not exist")))
    }

    /// Persists `run`; an empty column list overwrites every mutable column.
    pub async fn update_run(&self, run: &Run, columns: &[RunColumn]) -> AppResult<()> {
        let columns = RunColumn::resolve(columns);
        self.repository.update_run(run, &columns).await
    }

    /// Lists the jobs of one run.
    pub async fn list_run_jobs(&self, run_id: RunId) -> AppResult<Vec<RunJob>> {
        self.repository.list_run_jobs(run_id).await
    }

    /// Returns cached run counters of one repository.
    pub async fn run_counters(&self, repo_id: RepoId) -> AppResult<RepositoryRunCounters> {
        self.repository.repository_counters(repo_id).await
    }
}
