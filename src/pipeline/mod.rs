//! Pipeline components: queues, worker pools, stages, the serialized channel and the driver.

pub mod context;
pub mod error_handler;
pub mod orchestrator;
pub mod pool;
pub mod queue;
pub mod serialized;
pub mod stage;
pub mod walk;

pub use context::{Collaborators, DISCOVERY, DISPATCH, ENRICHMENT, PipelineQueues};
pub use error_handler::check_for_task_failures;
pub use orchestrator::PipelineDriver;
pub use pool::{CancelToken, WorkerPool};
pub use queue::{QueueCounts, WorkQueue};
pub use serialized::{ReleaseGuard, SerializedResource};
pub use stage::Stage;
pub use walk::{WalkContext, WalkOutcome, enumerate_files, enumerate_given, run_walk_loop};
