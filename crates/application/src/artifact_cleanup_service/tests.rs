use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use gantry_core::{AppError, AppResult, ArtifactId, RepoId, RunId};
use gantry_domain::{
    Artifact, ArtifactStatus, RepositoryRunCounters, Run, RunColumn, RunJob, RunStatus,
};

use crate::artifact_ports::{ArtifactRepository, ObjectStore};
use crate::run_ports::{CreateRunInput, CreatedRun, RunRepository};

use super::{ArtifactCleanupService, CleanupOutcome, CleanupSettings};

#[derive(Default)]
struct FakeArtifactRepository {
    artifacts: Mutex<Vec<Artifact>>,
    failing_marks: HashSet<ArtifactId>,
    queries_unavailable: bool,
}

impl FakeArtifactRepository {
    fn with_artifacts(artifacts: Vec<Artifact>) -> Self {
        Self {
            artifacts: Mutex::new(artifacts),
            ..Self::default()
        }
    }

    async fn status_of(&self, artifact_id: ArtifactId) -> Option<ArtifactStatus> {
        self.artifacts
            .lock()
            .await
            .iter()
            .find(|artifact| artifact.id == artifact_id)
            .map(|artifact| artifact.status)
    }
}

#[async_trait]
impl ArtifactRepository for FakeArtifactRepository {
    async fn list_need_expired_artifacts(&self, now: DateTime<Utc>) -> AppResult<Vec<Artifact>> {
        if self.queries_unavailable {
            return Err(AppError::Persistence("artifact table unavailable".to_owned()));
        }

        Ok(self
            .artifacts
            .lock()
            .await
            .iter()
            .filter(|artifact| artifact.status == ArtifactStatus::Active && artifact.expires_at < now)
            .cloned()
            .collect())
    }

    async fn set_artifact_expired(&self, artifact_id: ArtifactId) -> AppResult<()> {
        if self.failing_marks.contains(&artifact_id) {
            return Err(AppError::Persistence(format!(
                "cannot update artifact [{artifact_id}]"
            )));
        }

        let mut artifacts = self.artifacts.lock().await;
        if let Some(artifact) = artifacts
            .iter_mut()
            .find(|artifact| artifact.id == artifact_id && artifact.status == ArtifactStatus::Active)
        {
            artifact.status = ArtifactStatus::Expired;
        }
        Ok(())
    }

    async fn list_pending_delete_artifacts(&self, limit: usize) -> AppResult<Vec<Artifact>> {
        if self.queries_unavailable {
            return Err(AppError::Persistence("artifact table unavailable".to_owned()));
        }

        Ok(self
            .artifacts
            .lock()
            .await
            .iter()
            .filter(|artifact| artifact.status == ArtifactStatus::PendingDelete)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn set_artifact_deleted(&self, artifact_id: ArtifactId) -> AppResult<()> {
        if self.failing_marks.contains(&artifact_id) {
            return Err(AppError::Persistence(format!(
                "cannot update artifact [{artifact_id}]"
            )));
        }

        let mut artifacts = self.artifacts.lock().await;
        if let Some(artifact) = artifacts.iter_mut().find(|artifact| artifact.id == artifact_id) {
            artifact.status = ArtifactStatus::Deleted;
        }
        Ok(())
    }
}

#[derive(Default)]
struct FakeRunRepository {
    statuses: HashMap<RunId, RunStatus>,
    unavailable_runs: HashSet<RunId>,
}

#[async_trait]
impl RunRepository for FakeRunRepository {
    async fn create_run_with_jobs(&self, _input: CreateRunInput) -> AppResult<CreatedRun> {
        Err(AppError::Internal("not used by cleanup".to_owned()))
    }

    async fn find_run(&self, run_id: RunId) -> AppResult<Option<Run>> {
        if self.unavailable_runs.contains(&run_id) {
            return Err(AppError::Persistence(format!(
                "cannot load run [{run_id}]"
            )));
        }

        Ok(self.statuses.get(&run_id).map(|status| {
            let now = Utc::now();
            Run {
                id: run_id,
                title: "ci".to_owned(),
                repo_id: RepoId::new(1),
                workflow_id: "ci.yml".to_owned(),
                index: run_id.as_i64(),
                trigger_user_id: 1,
                git_ref: "refs/heads/main".to_owned(),
                commit_sha: "abc".to_owned(),
                event: "push".to_owned(),
                token: "token".to_owned(),
                grant: String::new(),
                event_payload: "{}".to_owned(),
                status: *status,
                started: None,
                stopped: None,
                created: now,
                updated: now,
            }
        }))
    }

    async fn update_run(&self, _run: &Run, _columns: &[RunColumn]) -> AppResult<()> {
        Err(AppError::Internal("not used by cleanup".to_owned()))
    }

    async fn list_run_jobs(&self, _run_id: RunId) -> AppResult<Vec<RunJob>> {
        Err(AppError::Internal("not used by cleanup".to_owned()))
    }

    async fn repository_counters(&self, _repo_id: RepoId) -> AppResult<RepositoryRunCounters> {
        Err(AppError::Internal("not used by cleanup".to_owned()))
    }
}

#[derive(Default)]
struct FakeObjectStore {
    objects: Mutex<BTreeSet<String>>,
    deletes: Mutex<Vec<String>>,
    failing_paths: HashSet<String>,
    listing_unavailable: bool,
}

impl FakeObjectStore {
    fn with_objects(paths: &[&str]) -> Self {
        Self {
            objects: Mutex::new(paths.iter().map(|path| (*path).to_owned()).collect()),
            ..Self::default()
        }
    }

    async fn deletes(&self) -> Vec<String> {
        self.deletes.lock().await.clone()
    }
}

#[async_trait]
impl ObjectStore for FakeObjectStore {
    async fn delete(&self, path: &str) -> AppResult<()> {
        if self.failing_paths.contains(path) {
            return Err(AppError::ObjectStore(format!("cannot delete '{path}'")));
        }

        self.deletes.lock().await.push(path.to_owned());
        let nested = format!("{path}/");
        self.objects
            .lock()
            .await
            .retain(|object| object != path && !object.starts_with(nested.as_str()));
        Ok(())
    }

    async fn list(&self, prefix: &str) -> AppResult<Vec<String>> {
        if self.listing_unavailable {
            return Err(AppError::ObjectStore("bucket listing failed".to_owned()));
        }

        Ok(self
            .objects
            .lock()
            .await
            .iter()
            .filter(|object| object.starts_with(prefix))
            .cloned()
            .collect())
    }
}

fn artifact(id: i64, status: ArtifactStatus, expires_in_hours: i64) -> Artifact {
    let now = Utc::now();
    Artifact {
        id: ArtifactId::new(id),
        run_id: RunId::new(1),
        name: format!("artifact-{id}"),
        storage_path: format!("1/{id}/artifact.zip"),
        status,
        expires_at: now + chrono::Duration::hours(expires_in_hours),
        created: now,
        updated: now,
    }
}

fn service(
    artifacts: Arc<FakeArtifactRepository>,
    runs: FakeRunRepository,
    objects: Arc<FakeObjectStore>,
) -> ArtifactCleanupService {
    ArtifactCleanupService::new(artifacts, Arc::new(runs), objects)
}

fn runs_with(statuses: &[(i64, RunStatus)]) -> FakeRunRepository {
    FakeRunRepository {
        statuses: statuses
            .iter()
            .map(|(run_id, status)| (RunId::new(*run_id), *status))
            .collect(),
        ..FakeRunRepository::default()
    }
}

#[tokio::test]
async fn expire_marks_then_deletes_and_is_idempotent() {
    let artifacts = Arc::new(FakeArtifactRepository::with_artifacts(vec![
        artifact(1, ArtifactStatus::Active, -1),
        artifact(2, ArtifactStatus::Active, 24),
    ]));
    let objects = Arc::new(FakeObjectStore::with_objects(&[
        "1/1/artifact.zip",
        "1/2/artifact.zip",
    ]));
    let service = service(artifacts.clone(), runs_with(&[]), objects.clone());

    let first = service.expire_artifacts().await.unwrap_or_else(|_| unreachable!());
    assert_eq!(first.count(CleanupOutcome::Deleted), 1);
    assert_eq!(
        artifacts.status_of(ArtifactId::new(1)).await,
        Some(ArtifactStatus::Expired)
    );
    assert_eq!(
        artifacts.status_of(ArtifactId::new(2)).await,
        Some(ArtifactStatus::Active)
    );
    assert_eq!(objects.deletes().await, vec!["1/1/artifact.zip".to_owned()]);

    let second = service.expire_artifacts().await.unwrap_or_else(|_| unreachable!());
    assert!(second.items.is_empty());
    assert_eq!(objects.deletes().await.len(), 1);
}

#[tokio::test]
async fn expire_continues_after_per_item_failures() {
    let artifacts = Arc::new(FakeArtifactRepository {
        failing_marks: HashSet::from([ArtifactId::new(1)]),
        ..FakeArtifactRepository::with_artifacts(vec![
            artifact(1, ArtifactStatus::Active, -2),
            artifact(2, ArtifactStatus::Active, -2),
            artifact(3, ArtifactStatus::Active, -2),
        ])
    });
    let objects = Arc::new(FakeObjectStore {
        failing_paths: HashSet::from(["1/2/artifact.zip".to_owned()]),
        ..FakeObjectStore::default()
    });
    let service = service(artifacts.clone(), runs_with(&[]), objects.clone());

    let summary = service.expire_artifacts().await.unwrap_or_else(|_| unreachable!());

    assert_eq!(summary.count(CleanupOutcome::Failed), 2);
    assert_eq!(summary.count(CleanupOutcome::Deleted), 1);
    // Mark failed: the object must not be touched.
    assert!(!objects.deletes().await.contains(&"1/1/artifact.zip".to_owned()));
    // Delete failed after marking: the row stays expired for reconciliation.
    assert_eq!(
        artifacts.status_of(ArtifactId::new(2)).await,
        Some(ArtifactStatus::Expired)
    );
}

#[tokio::test]
async fn hard_delete_runs_batches_until_a_short_one() {
    let pending = (1..=250)
        .map(|id| artifact(id, ArtifactStatus::PendingDelete, 24))
        .collect();
    let artifacts = Arc::new(FakeArtifactRepository::with_artifacts(pending));
    let objects = Arc::new(FakeObjectStore::default());
    let service = service(artifacts.clone(), runs_with(&[]), objects.clone());

    let summary = service
        .delete_pending_artifacts()
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(summary.batches, vec![100, 100, 50]);
    assert_eq!(summary.count(CleanupOutcome::Deleted), 250);
    assert_eq!(objects.deletes().await.len(), 250);
    assert!(
        artifacts
            .artifacts
            .lock()
            .await
            .iter()
            .all(|artifact| artifact.status == ArtifactStatus::Deleted)
    );
}

#[tokio::test]
async fn hard_delete_of_an_exact_multiple_ends_on_an_empty_batch() {
    let pending = (1..=6)
        .map(|id| artifact(id, ArtifactStatus::PendingDelete, 24))
        .collect();
    let artifacts = Arc::new(FakeArtifactRepository::with_artifacts(pending));
    let service = service(
        artifacts,
        runs_with(&[]),
        Arc::new(FakeObjectStore::default()),
    )
    .with_settings(CleanupSettings::new(3, "tmp", None).unwrap_or_else(|_| unreachable!()));

    let summary = service
        .delete_pending_artifacts()
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(summary.batches, vec![3, 3, 0]);
}

#[tokio::test]
async fn hard_delete_stops_when_a_full_batch_cannot_be_marked() {
    let artifacts = Arc::new(FakeArtifactRepository {
        failing_marks: HashSet::from([ArtifactId::new(1), ArtifactId::new(2)]),
        ..FakeArtifactRepository::with_artifacts(vec![
            artifact(1, ArtifactStatus::PendingDelete, 24),
            artifact(2, ArtifactStatus::PendingDelete, 24),
            artifact(3, ArtifactStatus::PendingDelete, 24),
        ])
    });
    let service = service(
        artifacts,
        runs_with(&[]),
        Arc::new(FakeObjectStore::default()),
    )
    .with_settings(CleanupSettings::new(2, "tmp", None).unwrap_or_else(|_| unreachable!()));

    let summary = service
        .delete_pending_artifacts()
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(summary.batches, vec![2]);
    assert_eq!(summary.count(CleanupOutcome::Failed), 2);
}

#[tokio::test]
async fn sweep_deletes_objects_of_missing_runs() {
    let objects = Arc::new(FakeObjectStore::with_objects(&["tmp42/x"]));
    let service = service(
        Arc::new(FakeArtifactRepository::default()),
        runs_with(&[]),
        objects.clone(),
    );

    let summary = service.sweep_temp_objects().await.unwrap_or_else(|_| unreachable!());

    assert_eq!(summary.count(CleanupOutcome::Deleted), 1);
    assert_eq!(
        objects.deletes().await,
        vec!["tmp42/x".to_owned(), "tmp42".to_owned()]
    );
}

#[tokio::test]
async fn sweep_keeps_objects_of_running_runs() {
    let objects = Arc::new(FakeObjectStore::with_objects(&["tmp42/x"]));
    let service = service(
        Arc::new(FakeArtifactRepository::default()),
        runs_with(&[(42, RunStatus::Running)]),
        objects.clone(),
    );

    let summary = service.sweep_temp_objects().await.unwrap_or_else(|_| unreachable!());

    assert_eq!(summary.count(CleanupOutcome::SkippedActiveRun), 1);
    assert!(objects.deletes().await.is_empty());
}

#[tokio::test]
async fn sweep_deletes_objects_of_finished_runs() {
    let objects = Arc::new(FakeObjectStore::with_objects(&["tmp42/x"]));
    let service = service(
        Arc::new(FakeArtifactRepository::default()),
        runs_with(&[(42, RunStatus::Success)]),
        objects.clone(),
    );

    let summary = service.sweep_temp_objects().await.unwrap_or_else(|_| unreachable!());

    assert_eq!(summary.count(CleanupOutcome::Deleted), 1);
    assert_eq!(
        objects.deletes().await,
        vec!["tmp42/x".to_owned(), "tmp42".to_owned()]
    );
}

#[tokio::test]
async fn sweep_deletes_objects_of_blocked_runs() {
    let objects = Arc::new(FakeObjectStore::with_objects(&["tmp42/x"]));
    let service = service(
        Arc::new(FakeArtifactRepository::default()),
        runs_with(&[(42, RunStatus::Blocked)]),
        objects.clone(),
    );

    let summary = service.sweep_temp_objects().await.unwrap_or_else(|_| unreachable!());

    assert_eq!(summary.count(CleanupOutcome::Deleted), 1);
    assert_eq!(summary.count(CleanupOutcome::SkippedActiveRun), 0);
    assert_eq!(
        objects.deletes().await,
        vec!["tmp42/x".to_owned(), "tmp42".to_owned()]
    );
}

#[tokio::test]
async fn non_numeric_directory_does_not_stop_later_objects() {
    let objects = Arc::new(FakeObjectStore::with_objects(&["tmp/a", "tmp42/x"]));
    let service = service(
        Arc::new(FakeArtifactRepository::default()),
        runs_with(&[]),
        objects.clone(),
    );

    let summary = service.sweep_temp_objects().await.unwrap_or_else(|_| unreachable!());

    let outcomes: Vec<(&str, CleanupOutcome)> = summary
        .items
        .iter()
        .map(|item| (item.target.as_str(), item.outcome))
        .collect();
    assert_eq!(
        outcomes,
        vec![
            ("tmp/a", CleanupOutcome::SkippedError),
            ("tmp42/x", CleanupOutcome::Deleted),
        ]
    );
    assert_eq!(
        objects.deletes().await,
        vec!["tmp42/x".to_owned(), "tmp42".to_owned()]
    );
}

#[tokio::test]
async fn sweep_skips_unattributable_objects_and_continues() {
    let objects = Arc::new(FakeObjectStore::with_objects(&[
        "tmp42/x",
        "tmp7/chunk-1",
        "tmpfoo/a",
    ]));
    let runs = FakeRunRepository {
        unavailable_runs: HashSet::from([RunId::new(7)]),
        ..FakeRunRepository::default()
    };
    let service = service(
        Arc::new(FakeArtifactRepository::default()),
        runs,
        objects.clone(),
    );

    let summary = service.sweep_temp_objects().await.unwrap_or_else(|_| unreachable!());

    assert_eq!(summary.count(CleanupOutcome::SkippedError), 2);
    assert_eq!(summary.count(CleanupOutcome::Deleted), 1);
    assert_eq!(
        objects.deletes().await,
        vec!["tmp42/x".to_owned(), "tmp42".to_owned()]
    );
}

#[tokio::test]
async fn sweep_looks_up_each_run_once() {
    let objects = Arc::new(FakeObjectStore::with_objects(&[
        "tmp9/chunk-1",
        "tmp9/chunk-2",
    ]));
    let service = service(
        Arc::new(FakeArtifactRepository::default()),
        runs_with(&[(9, RunStatus::Waiting)]),
        objects.clone(),
    );

    let summary = service.sweep_temp_objects().await.unwrap_or_else(|_| unreachable!());

    assert_eq!(summary.count(CleanupOutcome::SkippedActiveRun), 2);
    assert!(objects.deletes().await.is_empty());
}

#[tokio::test]
async fn failed_listing_is_fatal_to_the_pass() {
    let objects = Arc::new(FakeObjectStore {
        listing_unavailable: true,
        ..FakeObjectStore::default()
    });
    let service = service(
        Arc::new(FakeArtifactRepository::default()),
        runs_with(&[]),
        objects,
    );

    let result = service.cleanup_artifacts().await;

    assert!(matches!(result, Err(AppError::ObjectStore(_))));
}

#[tokio::test]
async fn failed_expiry_query_stops_later_phases() {
    let artifacts = Arc::new(FakeArtifactRepository {
        queries_unavailable: true,
        ..FakeArtifactRepository::default()
    });
    let objects = Arc::new(FakeObjectStore::with_objects(&["tmp42/x"]));
    let service = service(artifacts, runs_with(&[]), objects.clone());

    let result = service.cleanup().await;

    assert!(matches!(result, Err(AppError::Persistence(_))));
    assert!(objects.deletes().await.is_empty());
}

#[tokio::test]
async fn full_pass_reports_every_phase() {
    let artifacts = Arc::new(FakeArtifactRepository::with_artifacts(vec![
        artifact(1, ArtifactStatus::Active, -1),
        artifact(2, ArtifactStatus::PendingDelete, 24),
    ]));
    let objects = Arc::new(FakeObjectStore::with_objects(&[
        "1/1/artifact.zip",
        "1/2/artifact.zip",
        "tmp5/part",
    ]));
    let service = service(
        artifacts,
        runs_with(&[(5, RunStatus::Cancelled)]),
        objects.clone(),
    );

    let report = service.cleanup().await.unwrap_or_else(|_| unreachable!());

    assert_eq!(report.expired.count(CleanupOutcome::Deleted), 1);
    assert_eq!(report.deleted.count(CleanupOutcome::Deleted), 1);
    assert_eq!(report.deleted.batches, vec![1]);
    assert_eq!(report.swept.count(CleanupOutcome::Deleted), 1);
    assert!(objects.objects.lock().await.is_empty());
}

#[tokio::test]
async fn elapsed_deadline_stops_the_pass_before_touching_items() {
    let artifacts = Arc::new(FakeArtifactRepository::with_artifacts(vec![artifact(
        1,
        ArtifactStatus::Active,
        -1,
    )]));
    let objects = Arc::new(FakeObjectStore::with_objects(&["1/1/artifact.zip"]));
    let service = service(artifacts.clone(), runs_with(&[]), objects.clone()).with_settings(
        CleanupSettings::new(100, "tmp", Some(Duration::ZERO)).unwrap_or_else(|_| unreachable!()),
    );

    let result = service.cleanup_artifacts().await;

    assert!(matches!(result, Err(AppError::Timeout(_))));
    assert_eq!(
        artifacts.status_of(ArtifactId::new(1)).await,
        Some(ArtifactStatus::Active)
    );
    assert!(objects.deletes().await.is_empty());
}

#[test]
fn settings_reject_zero_batches_and_nested_prefixes() {
    assert!(CleanupSettings::new(0, "tmp", None).is_err());
    assert!(CleanupSettings::new(10, "tmp/nested", None).is_err());
    assert!(CleanupSettings::new(10, " ", None).is_err());
    assert_eq!(CleanupSettings::default().delete_batch_size(), 100);
    assert_eq!(CleanupSettings::default().temp_prefix(), "tmp");
}
