/// Cleanup phase identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CleanupPhase {
    /// Retention expiry of active artifacts.
    ExpireArtifacts,
    /// Hard delete of artifacts flagged for deletion.
    DeletePendingArtifacts,
    /// Sweep of staged uploads left behind by runs.
    SweepTempObjects,
}

impl CleanupPhase {
    /// Returns stable phase name used in logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExpireArtifacts => "expire_artifacts",
            Self::DeletePendingArtifacts => "delete_pending_artifacts",
            Self::SweepTempObjects => "sweep_temp_objects",
        }
    }
}

/// Result of handling one artifact or object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CleanupOutcome {
    /// Metadata marked and storage reclaimed.
    Deleted,
    /// Left alone because its run may still write to it.
    SkippedActiveRun,
    /// Left alone because it could not be attributed to a run.
    SkippedError,
    /// Marking or deletion failed; a later pass may retry.
    Failed,
}

/// One handled artifact or object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupItem {
    /// Artifact id or object path.
    pub target: String,
    /// What happened to it.
    pub outcome: CleanupOutcome,
    /// Error or skip reason.
    pub detail: Option<String>,
}

/// Aggregated outcomes of one phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseSummary {
    /// Phase the items belong to.
    pub phase: CleanupPhase,
    /// Handled items in processing order.
    pub items: Vec<CleanupItem>,
    /// Size of every fetched batch, in fetch order.
    pub batches: Vec<usize>,
}

impl PhaseSummary {
    pub(super) fn new(phase: CleanupPhase) -> Self {
        Self {
            phase,
            items: Vec::new(),
            batches: Vec::new(),
        }
    }

    pub(super) fn record(
        &mut self,
        target: impl Into<String>,
        outcome: CleanupOutcome,
        detail: Option<String>,
    ) {
        self.items.push(CleanupItem {
            target: target.into(),
            outcome,
            detail,
        });
    }

    /// Counts items with the given outcome.
    #[must_use]
    pub fn count(&self, outcome: CleanupOutcome) -> usize {
        self.items
            .iter()
            .filter(|item| item.outcome == outcome)
            .count()
    }
}

/// Summaries of one full cleanup pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupReport {
    /// Expiry phase summary.
    pub expired: PhaseSummary,
    /// Hard delete phase summary.
    pub deleted: PhaseSummary,
    /// Temp sweep phase summary.
    pub swept: PhaseSummary,
}
