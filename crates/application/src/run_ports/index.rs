use async_trait::async_trait;
use gantry_core::{AppResult, RepoId};

/// Scope key of one independent index sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexScope {
    resource: &'static str,
    group_id: i64,
}

impl IndexScope {
    /// Resource name of the per-repository run sequence.
    pub const RUNS: &'static str = "action_run";

    /// Returns the run index scope of one repository.
    #[must_use]
    pub fn runs(repo_id: RepoId) -> Self {
        Self {
            resource: Self::RUNS,
            group_id: repo_id.as_i64(),
        }
    }

    /// Returns the indexed resource name.
    #[must_use]
    pub fn resource(&self) -> &'static str {
        self.resource
    }

    /// Returns the group the sequence is partitioned by.
    #[must_use]
    pub fn group_id(&self) -> i64 {
        self.group_id
    }
}

/// Port issuing durable, strictly increasing sequence numbers.
#[async_trait]
pub trait RunIndexAllocator: Send + Sync {
    /// Returns a value greater than every value previously issued for `scope`.
    ///
    /// Implementations must persist the grant before returning so that no
    /// value is ever issued twice, even across crashes.
    async fn next_index(&self, scope: &IndexScope) -> AppResult<i64>;
}
