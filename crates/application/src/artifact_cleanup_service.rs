use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use gantry_core::{AppError, AppResult, RunId};
use gantry_domain::{Artifact, DEFAULT_TEMP_PREFIX, RunStatus, TempObjectPath};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::artifact_ports::{ArtifactRepository, ObjectStore};
use crate::run_ports::RunRepository;

mod expire;
mod pending_delete;
mod report;
mod temp_sweep;

pub use report::{CleanupItem, CleanupOutcome, CleanupPhase, CleanupReport, PhaseSummary};

/// Default number of pending-delete artifacts fetched per batch.
const DEFAULT_DELETE_BATCH_SIZE: usize = 100;

/// Tunables of one cleanup pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupSettings {
    delete_batch_size: usize,
    temp_prefix: String,
    deadline: Option<Duration>,
}

impl CleanupSettings {
    /// Creates validated cleanup settings.
    pub fn new(
        delete_batch_size: usize,
        temp_prefix: impl Into<String>,
        deadline: Option<Duration>,
    ) -> AppResult<Self> {
        if delete_batch_size == 0 {
            return Err(AppError::Validation(
                "cleanup delete_batch_size must be greater than zero".to_owned(),
            ));
        }

        let temp_prefix = temp_prefix.into();
        if temp_prefix.trim().is_empty() || temp_prefix.contains('/') {
            return Err(AppError::Validation(format!(
                "cleanup temp_prefix '{temp_prefix}' must be a non-empty top-level name"
            )));
        }

        Ok(Self {
            delete_batch_size,
            temp_prefix,
            deadline,
        })
    }

    /// Returns the pending-delete batch size.
    #[must_use]
    pub fn delete_batch_size(&self) -> usize {
        self.delete_batch_size
    }

    /// Returns the reserved prefix of staged uploads.
    #[must_use]
    pub fn temp_prefix(&self) -> &str {
        self.temp_prefix.as_str()
    }

    /// Returns the time budget of one pass, if any.
    #[must_use]
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }
}

impl Default for CleanupSettings {
    fn default() -> Self {
        Self {
            delete_batch_size: DEFAULT_DELETE_BATCH_SIZE,
            temp_prefix: DEFAULT_TEMP_PREFIX.to_owned(),
            deadline: None,
        }
    }
}

/// Artifact garbage collector reclaiming expired, deleted and orphaned storage.
///
/// Every mutation is idempotent, so overlapping passes converge instead of
/// failing; nothing here takes a lock.
#[derive(Clone)]
pub struct ArtifactCleanupService {
    artifact_repository: Arc<dyn ArtifactRepository>,
    run_repository: Arc<dyn RunRepository>,
    object_store: Arc<dyn ObjectStore>,
    settings: CleanupSettings,
}

impl ArtifactCleanupService {
    /// Creates a cleanup service with default settings.
    #[must_use]
    pub fn new(
        artifact_repository: Arc<dyn ArtifactRepository>,
        run_repository: Arc<dyn RunRepository>,
        object_store: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            artifact_repository,
            run_repository,
            object_store,
            settings: CleanupSettings::default(),
        }
    }

    /// Replaces the default settings.
    #[must_use]
    pub fn with_settings(mut self, settings: CleanupSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Runs every cleanup task; logs are not persisted here, so this is the
    /// artifact pass.
    pub async fn cleanup(&self) -> AppResult<CleanupReport> {
        self.cleanup_artifacts().await
    }

    /// Expires, hard-deletes and sweeps artifacts in that order.
    ///
    /// Stops at the first phase whose query or listing fails.
    pub async fn cleanup_artifacts(&self) -> AppResult<CleanupReport> {
        let deadline = PassDeadline::starting_now(self.settings.deadline());

        let expired = self.expire_artifacts_within(&deadline).await?;
        let deleted = self.delete_pending_artifacts_within(&deadline).await?;
        let swept = self.sweep_temp_objects_within(&deadline).await?;

        info!(
            expired = expired.count(CleanupOutcome::Deleted),
            deleted = deleted.count(CleanupOutcome::Deleted),
            swept = swept.count(CleanupOutcome::Deleted),
            failed = expired.count(CleanupOutcome::Failed)
                + deleted.count(CleanupOutcome::Failed)
                + swept.count(CleanupOutcome::Failed),
            "artifact cleanup finished"
        );

        Ok(CleanupReport {
            expired,
            deleted,
            swept,
        })
    }

    /// Marks artifacts past retention expired and removes their objects.
    pub async fn expire_artifacts(&self) -> AppResult<PhaseSummary> {
        let deadline = PassDeadline::starting_now(self.settings.deadline());
        self.expire_artifacts_within(&deadline).await
    }

    /// Marks pending-delete artifacts deleted and removes their objects.
    pub async fn delete_pending_artifacts(&self) -> AppResult<PhaseSummary> {
        let deadline = PassDeadline::starting_now(self.settings.deadline());
        self.delete_pending_artifacts_within(&deadline).await
    }

    /// Removes staged uploads whose run is gone or finished.
    pub async fn sweep_temp_objects(&self) -> AppResult<PhaseSummary> {
        let deadline = PassDeadline::starting_now(self.settings.deadline());
        self.sweep_temp_objects_within(&deadline).await
    }

    async fn delete_object(&self, deadline: &PassDeadline, path: &str) -> AppResult<()> {
        deadline
            .bound("object delete", self.object_store.delete(path))
            .await
    }
}

/// Time budget shared by every metadata and object-store call of one pass.
#[derive(Debug, Clone, Copy)]
struct PassDeadline(Option<Instant>);

impl PassDeadline {
    fn starting_now(budget: Option<Duration>) -> Self {
        Self(budget.map(|budget| Instant::now() + budget))
    }

    fn check(&self, operation: &'static str) -> AppResult<()> {
        match self.0 {
            Some(deadline) if Instant::now() >= deadline => Err(AppError::Timeout(format!(
                "cleanup deadline elapsed before {operation}"
            ))),
            _ => Ok(()),
        }
    }

    async fn bound<T, F>(&self, operation: &'static str, future: F) -> AppResult<T>
    where
        F: Future<Output = AppResult<T>>,
    {
        match self.0 {
            None => future.await,
            Some(deadline) => tokio::time::timeout_at(deadline, future)
                .await
                .map_err(|_| {
                    AppError::Timeout(format!("cleanup deadline elapsed during {operation}"))
                })?,
        }
    }
}

#[cfg(test)]
mod tests;
