use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

use gantry_core::{AppError, AppResult};

use crate::JobSpec;

/// Directed acyclic dependency graph of the jobs of one workflow.
///
/// Edges point from a job to the jobs it `needs`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobGraph {
    order: Vec<String>,
    needs: BTreeMap<String, BTreeSet<String>>,
}

impl JobGraph {
    /// Builds and validates the graph declared by `specs`.
    pub fn from_specs(specs: &[JobSpec]) -> AppResult<Self> {
        let mut needs = BTreeMap::new();
        for spec in specs {
            let predecessors: BTreeSet<String> =
                spec.definition().needs().iter().cloned().collect();
            if needs
                .insert(spec.job_id().to_owned(), predecessors)
                .is_some()
            {
                return Err(AppError::Validation(format!(
                    "job '{}' is declared more than once",
                    spec.job_id()
                )));
            }
        }

        for (job_id, predecessors) in &needs {
            if let Some(missing) = predecessors.iter().find(|need| !needs.contains_key(*need)) {
                return Err(AppError::Validation(format!(
                    "job '{job_id}' needs unknown job '{missing}'"
                )));
            }
        }

        let order = topological_order(&needs)?;
        Ok(Self { order, needs })
    }

    /// Returns job ids so that every job comes after all of its needs.
    #[must_use]
    pub fn order(&self) -> &[String] {
        &self.order
    }

    /// Returns the direct predecessors of `job_id`.
    #[must_use]
    pub fn needs_of(&self, job_id: &str) -> Option<&BTreeSet<String>> {
        self.needs.get(job_id)
    }

    /// Returns jobs not yet completed whose predecessors all completed.
    #[must_use]
    pub fn ready_jobs(&self, completed: &HashSet<&str>) -> Vec<&str> {
        self.order
            .iter()
            .filter(|job_id| !completed.contains(job_id.as_str()))
            .filter(|job_id| {
                self.needs
                    .get(job_id.as_str())
                    .is_none_or(|needs| needs.iter().all(|need| completed.contains(need.as_str())))
            })
            .map(String::as_str)
            .collect()
    }
}

fn topological_order(needs: &BTreeMap<String, BTreeSet<String>>) -> AppResult<Vec<String>> {
    let mut pending: BTreeMap<&str, usize> = needs
        .iter()
        .map(|(job_id, predecessors)| (job_id.as_str(), predecessors.len()))
        .collect();
    let mut queue: VecDeque<&str> = pending
        .iter()
        .filter_map(|(job_id, count)| (*count == 0).then_some(*job_id))
        .collect();
    let mut order = Vec::with_capacity(needs.len());

    while let Some(job_id) = queue.pop_front() {
        order.push(job_id.to_owned());
        for (dependent, predecessors) in needs {
            if !predecessors.contains(job_id) {
                continue;
            }
            if let Some(count) = pending.get_mut(dependent.as_str()) {
                *count -= 1;
                if *count == 0 {
                    queue.push_back(dependent.as_str());
                }
            }
        }
    }

    if order.len() != needs.len() {
        let cyclic: Vec<&str> = pending
            .iter()
            .filter_map(|(job_id, count)| (*count > 0).then_some(*job_id))
            .collect();
        return Err(AppError::Validation(format!(
            "job needs form a cycle through: {}",
            cyclic.join(", ")
        )));
    }

    Ok(order)
}
