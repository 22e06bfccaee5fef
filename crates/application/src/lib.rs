//! Application services and ports.

#![forbid(unsafe_code)]

mod artifact_cleanup_service;
mod artifact_ports;
mod run_ports;
mod run_service;

pub use artifact_cleanup_service::{
    ArtifactCleanupService, CleanupItem, CleanupOutcome, CleanupPhase, CleanupReport,
    CleanupSettings, PhaseSummary,
};
pub use artifact_ports::{ArtifactRepository, ObjectStore};
pub use run_ports::{
    CreateRunInput, CreatedRun, IndexScope, RunIndexAllocator, RunRepository, WorkflowParser,
};
pub use run_service::RunService;
