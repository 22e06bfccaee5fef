mod index;
mod parser;
mod repository;

pub use index::{IndexScope, RunIndexAllocator};
pub use parser::WorkflowParser;
pub use repository::{CreateRunInput, CreatedRun, RunRepository};
