//! Durable, crash-resilient queue of named multi-step setup jobs.
//!
//! Jobs (model downloads, compiles, activations) are submitted by name,
//! persisted after every mutation, and drained by a single background
//! worker. A task failure halts its job without blocking the rest of the
//! queue, and a process restart never resumes a task from `running`: the
//! snapshot rehydrates it to `pending` so the step restarts from scratch.

pub mod error;
pub mod executor;
pub mod queue;
pub mod types;
pub mod worker;

pub use error::JobError;
pub use executor::{JobNotifier, ProgressFn, ReadinessOracle, ResourceReadiness, TaskExecutor};
pub use queue::{JobQueue, SubmitOutcome};
pub use types::{Job, JobTask, JobTaskKind, JobTaskStatus, SetupState};
pub use worker::JobWorker;
