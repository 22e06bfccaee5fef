use gantry_core::AppResult;
use gantry_domain::JobSpec;

/// Port converting a raw workflow document into its ordered jobs.
pub trait WorkflowParser: Send + Sync {
    /// Parses `content` into `(job id, job definition)` pairs in document order.
    fn parse(&self, content: &[u8]) -> AppResult<Vec<JobSpec>>;
}
