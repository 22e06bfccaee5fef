//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod in_memory_object_store;
mod json_workflow_parser;
mod local_object_store;
mod postgres_artifact_repository;
mod postgres_run_index_allocator;
mod postgres_run_repository;

use sqlx::migrate::Migrator;

pub use in_memory_object_store::InMemoryObjectStore;
pub use json_workflow_parser::JsonWorkflowParser;
pub use local_object_store::LocalObjectStore;
pub use postgres_artifact_repository::PostgresArtifactRepository;
pub use postgres_run_index_allocator::PostgresRunIndexAllocator;
pub use postgres_run_repository::PostgresRunRepository;

/// Schema migrations of every table owned by the PostgreSQL adapters.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");
