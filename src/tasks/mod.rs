//! Translation Tasks
//!
//! - `types`: task snapshot, submission request, errors
//! - `store`: session-scoped task map
//! - `orchestrator`: validation, background execution, progress

mod orchestrator;
mod store;
mod types;

pub use orchestrator::{Orchestrator, PipelineSettings};
pub use store::TaskStore;
pub use types::{BlockStats, Task, TaskError, TaskRequest, TaskStatus};
