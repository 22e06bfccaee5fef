use gantry_application::WorkflowParser;
use gantry_core::{AppError, AppResult};
use gantry_domain::{JobDefinition, JobGraph, JobSpec};
use serde_json::{Map, Value};

/// Parser for JSON workflow documents of the form
/// `{ "jobs": { "<id>": { "name": .., "runs-on": .., "needs": .. } } }`.
///
/// Jobs are returned in document order. The `needs` graph is validated even
/// though run creation does not derive readiness from it.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonWorkflowParser;

impl JsonWorkflowParser {
    /// Creates a parser.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl WorkflowParser for JsonWorkflowParser {
    fn parse(&self, content: &[u8]) -> AppResult<Vec<JobSpec>> {
        let document: Value = serde_json::from_slice(content).map_err(|error| {
            AppError::Validation(format!("invalid workflow document: {error}"))
        })?;

        let jobs = match document.get("jobs") {
            Some(Value::Object(jobs)) => jobs,
            Some(_) => {
                return Err(AppError::Validation(
                    "workflow 'jobs' must be an object keyed by job id".to_owned(),
                ));
            }
            None => return Ok(Vec::new()),
        };

        let specs = job_specs(jobs)?;
        JobGraph::from_specs(&specs)?;

        Ok(specs)
    }
}

fn job_specs(jobs: &Map<String, Value>) -> AppResult<Vec<JobSpec>> {
    jobs.iter()
        .map(|(job_id, body)| {
            let definition: JobDefinition =
                serde_json::from_value(body.clone()).map_err(|error| {
                    AppError::Validation(format!("invalid definition of job '{job_id}': {error}"))
                })?;
            JobSpec::new(job_id.as_str(), definition)
        })
        .collect()
}
