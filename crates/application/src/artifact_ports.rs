mod object_store;
mod repository;

pub use object_store::ObjectStore;
pub use repository::ArtifactRepository;
