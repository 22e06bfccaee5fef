use chrono::{DateTime, Utc};
use gantry_core::{AppError, AppResult, NonEmptyString, RunId};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::RunStatus;

/// One job definition as declared in a workflow document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(
        rename = "runs-on",
        default,
        deserialize_with = "one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    runs_on: Vec<String>,
    #[serde(
        default,
        deserialize_with = "one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    needs: Vec<String>,
    #[serde(flatten)]
    body: Map<String, Value>,
}

impl JobDefinition {
    /// Creates a job definition without extra body keys.
    #[must_use]
    pub fn new(name: Option<String>, runs_on: Vec<String>, needs: Vec<String>) -> Self {
        Self {
            name,
            runs_on,
            needs,
            body: Map::new(),
        }
    }

    /// Returns the declared display name, if any.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns target runner labels.
    #[must_use]
    pub fn runs_on(&self) -> &[String] {
        &self.runs_on
    }

    /// Returns declared predecessor job ids.
    #[must_use]
    pub fn needs(&self) -> &[String] {
        &self.needs
    }

    /// Returns every other key of the job body (steps, env, ...).
    #[must_use]
    pub fn body(&self) -> &Map<String, Value> {
        &self.body
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(value) => vec![value],
        OneOrMany::Many(values) => values,
    })
}

/// One parsed `(job id, job definition)` pair of a workflow.
#[derive(Debug, Clone, PartialEq)]
pub struct JobSpec {
    job_id: NonEmptyString,
    definition: JobDefinition,
}

impl JobSpec {
    /// Creates a validated job spec.
    pub fn new(job_id: impl Into<String>, definition: JobDefinition) -> AppResult<Self> {
        let job_id = NonEmptyString::new(job_id)
            .map_err(|_| AppError::Validation("job id must not be empty".to_owned()))?;

        Ok(Self { job_id, definition })
    }

    /// Returns the job id, unique within its workflow.
    #[must_use]
    pub fn job_id(&self) -> &str {
        self.job_id.as_str()
    }

    /// Returns the job definition.
    #[must_use]
    pub fn definition(&self) -> &JobDefinition {
        &self.definition
    }

    /// Returns the declared name, falling back to the job id.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.definition.name().unwrap_or(self.job_id())
    }

    /// Serializes the job as a single-job workflow document.
    pub fn to_payload(&self) -> AppResult<Vec<u8>> {
        let mut jobs = Map::new();
        let definition = serde_json::to_value(&self.definition).map_err(|error| {
            AppError::Internal(format!(
                "failed to serialize job '{}': {error}",
                self.job_id()
            ))
        })?;
        jobs.insert(self.job_id().to_owned(), definition);

        serde_json::to_vec(&serde_json::json!({ "jobs": jobs })).map_err(|error| {
            AppError::Internal(format!(
                "failed to serialize workflow payload for job '{}': {error}",
                self.job_id()
            ))
        })
    }
}

/// Persisted job of a workflow run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunJob {
    /// Store-assigned identifier.
    pub id: i64,
    /// Owning run.
    pub run_id: RunId,
    /// Display name.
    pub name: String,
    /// Whether the job may be picked up by a runner.
    pub ready: bool,
    /// Serialized single-job workflow document.
    pub workflow_payload: Vec<u8>,
    /// Job id, unique within the run.
    pub job_id: String,
    /// Predecessor job ids.
    pub needs: Vec<String>,
    /// Target runner labels.
    pub runs_on: Vec<String>,
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

/// Run job prepared for insertion together with its run.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRunJob {
    /// Display name.
    pub name: String,
    /// Whether the job may be picked up by a runner.
    pub ready: bool,
    /// Serialized single-job workflow document.
    pub workflow_payload: Vec<u8>,
    /// Job id, unique within the run.
    pub job_id: String,
    /// Predecessor job ids.
    pub needs: Vec<String>,
    /// Target runner labels.
    pub runs_on: Vec<String>,
    /// Initial status.
    pub status: RunStatus,
}

impl NewRunJob {
    /// Builds a waiting job from one parsed spec.
    ///
    /// Readiness is not derived from `needs` yet: every job starts ready and
    /// the dependency list is left empty.
    pub fn waiting(spec: &JobSpec) -> AppResult<Self> {
        Ok(Self {
            name: spec.display_name().to_owned(),
            ready: true,
            workflow_payload: spec.to_payload()?,
            job_id: spec.job_id().to_owned(),
            needs: Vec::new(),
            runs_on: spec.definition().runs_on().to_vec(),
            status: RunStatus::Waiting,
        })
    }
}
