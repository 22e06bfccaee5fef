//! Gantry artifact cleanup worker.
//!
//! Runs one full cleanup pass and exits; schedule it externally.

#![forbid(unsafe_code)]

use std::env;
use std::sync::Arc;
use std::time::Duration;

use gantry_application::{ArtifactCleanupService, CleanupOutcome, CleanupSettings, PhaseSummary};
use gantry_core::{AppError, AppResult};
use gantry_infrastructure::{
    LocalObjectStore, MIGRATOR, PostgresArtifactRepository, PostgresRunRepository,
};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
struct WorkerConfig {
    database_url: String,
    database_max_connections: u32,
    artifact_storage_root: String,
    temp_prefix: String,
    delete_batch_size: usize,
    deadline_seconds: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = WorkerConfig::load()?;
    let pool = connect_pool(&config).await?;
    MIGRATOR
        .run(&pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to run migrations: {error}")))?;

    let cleanup_service = build_cleanup_service(pool, &config)?;

    info!(
        storage_root = %config.artifact_storage_root,
        temp_prefix = %config.temp_prefix,
        delete_batch_size = config.delete_batch_size,
        deadline_seconds = ?config.deadline_seconds,
        "gantry-worker cleanup started"
    );

    let report = cleanup_service.cleanup().await?;
    for summary in [&report.expired, &report.deleted, &report.swept] {
        log_summary(summary);
    }

    Ok(())
}

async fn connect_pool(config: &WorkerConfig) -> AppResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(config.database_url.as_str())
        .await
        .map_err(|error| AppError::Persistence(format!("failed to connect to database: {error}")))
}

fn build_cleanup_service(pool: PgPool, config: &WorkerConfig) -> AppResult<ArtifactCleanupService> {
    let settings = CleanupSettings::new(
        config.delete_batch_size,
        config.temp_prefix.as_str(),
        config.deadline_seconds.map(Duration::from_secs),
    )?;

    let artifact_repository = Arc::new(PostgresArtifactRepository::new(pool.clone()));
    let run_repository = Arc::new(PostgresRunRepository::new(pool));
    let object_store = Arc::new(LocalObjectStore::new(
        config.artifact_storage_root.as_str(),
    ));

    Ok(
        ArtifactCleanupService::new(artifact_repository, run_repository, object_store)
            .with_settings(settings),
    )
}

fn log_summary(summary: &PhaseSummary) {
    let failed = summary.count(CleanupOutcome::Failed);
    if failed > 0 {
        warn!(
            phase = summary.phase.as_str(),
            failed,
            "cleanup phase left items for the next pass"
        );
    }

    info!(
        phase = summary.phase.as_str(),
        deleted = summary.count(CleanupOutcome::Deleted),
        skipped_active_run = summary.count(CleanupOutcome::SkippedActiveRun),
        skipped_error = summary.count(CleanupOutcome::SkippedError),
        failed,
        batches = ?summary.batches,
        "cleanup phase finished"
    );
}

impl WorkerConfig {
    fn load() -> AppResult<Self> {
        let database_url = required_env("DATABASE_URL")?;
        let artifact_storage_root = required_env("ARTIFACT_STORAGE_ROOT")?;
        let temp_prefix = env::var("ARTIFACT_TEMP_PREFIX")
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| "tmp".to_owned());
        let delete_batch_size = parse_env_usize("CLEANUP_DELETE_BATCH_SIZE", 100)?;
        let database_max_connections = parse_env_u32("DATABASE_MAX_CONNECTIONS", 5)?;
        let deadline_seconds = parse_optional_env_u64("CLEANUP_DEADLINE_SECONDS")?;

        if delete_batch_size == 0 {
            return Err(AppError::Validation(
                "CLEANUP_DELETE_BATCH_SIZE must be greater than zero".to_owned(),
            ));
        }

        if database_max_connections == 0 {
            return Err(AppError::Validation(
                "DATABASE_MAX_CONNECTIONS must be greater than zero".to_owned(),
            ));
        }

        if deadline_seconds == Some(0) {
            return Err(AppError::Validation(
                "CLEANUP_DEADLINE_SECONDS must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            database_url,
            database_max_connections,
            artifact_storage_root,
            temp_prefix,
            delete_batch_size,
            deadline_seconds,
        })
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(name: &str) -> AppResult<String> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn parse_env_usize(name: &str, default: usize) -> AppResult<usize> {
    match env::var(name) {
        Ok(value) => value.parse::<usize>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}

fn parse_env_u32(name: &str, default: u32) -> AppResult<u32> {
    match env::var(name) {
        Ok(value) => value.parse::<u32>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}

fn parse_optional_env_u64(name: &str) -> AppResult<Option<u64>> {
    match env::var(name) {
        Ok(value) => value.parse::<u64>().map(Some).map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(None),
    }
}
