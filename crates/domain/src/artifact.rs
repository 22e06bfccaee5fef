use chrono::{DateTime, Utc};
use gantry_core::{AppError, AppResult, ArtifactId, RunId};
use serde::{Deserialize, Serialize};

/// Default reserved prefix of staged artifact uploads.
pub const DEFAULT_TEMP_PREFIX: &str = "tmp";

/// Artifact retention status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactStatus {
    /// Uploaded and within retention.
    Active,
    /// Retention elapsed; the object is reclaimed.
    Expired,
    /// Flagged for removal by a user or policy.
    PendingDelete,
    /// Removed; the row is kept as history.
    Deleted,
}

impl ArtifactStatus {
    /// Returns stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Expired => "expired",
            Self::PendingDelete => "pending_delete",
            Self::Deleted => "deleted",
        }
    }

    /// Parses storage value.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "active" => Ok(Self::Active),
            "expired" => Ok(Self::Expired),
            "pending_delete" => Ok(Self::PendingDelete),
            "deleted" => Ok(Self::Deleted),
            _ => Err(AppError::Validation(format!(
                "unknown artifact status '{value}'"
            ))),
        }
    }
}

/// Persisted build artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    /// Store-assigned identifier.
    pub id: ArtifactId,
    /// Run that produced the artifact.
    pub run_id: RunId,
    /// Artifact name.
    pub name: String,
    /// Object store path of the artifact content.
    pub storage_path: String,
    /// Retention status.
    pub status: ArtifactStatus,
    /// Retention deadline.
    pub expires_at: DateTime<Utc>,
    /// Creation timestamp.
    pub created: DateTime<Utc>,
    /// Last update timestamp.
    pub updated: DateTime<Utc>,
}

/// Object path under the temporary upload area, `<prefix><run id>/<rest>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TempObjectPath {
    path: String,
    directory: String,
    run_id: RunId,
}

impl TempObjectPath {
    /// Parses `path` against the reserved `prefix`.
    ///
    /// Returns `Ok(None)` for paths outside the temporary area and a validation
    /// error when the top-level directory does not embed a numeric run id.
    pub fn parse(prefix: &str, path: &str) -> AppResult<Option<Self>> {
        if !path.starts_with(prefix) {
            return Ok(None);
        }

        let directory = path.split('/').next().unwrap_or(path);
        let run_id_value = directory.strip_prefix(prefix).unwrap_or_default();
        if run_id_value.is_empty() || !run_id_value.bytes().all(|byte| byte.is_ascii_digit()) {
            return Err(AppError::Validation(format!(
                "temporary directory '{directory}' does not embed a run id"
            )));
        }

        let run_id = run_id_value.parse::<i64>().map_err(|error| {
            AppError::Validation(format!(
                "temporary directory '{directory}' has an invalid run id: {error}"
            ))
        })?;

        Ok(Some(Self {
            path: path.to_owned(),
            directory: directory.to_owned(),
            run_id: RunId::new(run_id),
        }))
    }

    /// Returns the full object path.
    #[must_use]
    pub fn path(&self) -> &str {
        self.path.as_str()
    }

    /// Returns the enclosing top-level directory.
    #[must_use]
    pub fn directory(&self) -> &str {
        self.directory.as_str()
    }

    /// Returns the run that staged the object.
    #[must_use]
    pub fn run_id(&self) -> RunId {
        self.run_id
    }
}
