pub mod config;
pub mod errors;
pub mod ids;
pub mod job;
pub mod task;

pub use config::Config;
pub use errors::PipelineError;
pub use ids::JobId;
pub use job::{JobInput, JobMode, ObjectRef, WorkItem};
pub use task::{JobResult, TaskState, TaskStatus};
