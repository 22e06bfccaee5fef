//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod artifact;
mod job_graph;
mod run;
mod run_job;

pub use artifact::{Artifact, ArtifactStatus, DEFAULT_TEMP_PREFIX, TempObjectPath};
pub use job_graph::JobGraph;
pub use run::{NewRun, RepositoryRunCounters, Run, RunColumn, RunStatus};
pub use run_job::{JobDefinition, JobSpec, NewRunJob, RunJob};
