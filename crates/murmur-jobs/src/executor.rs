//! External collaborator seams the job worker drives but does not implement.

use async_trait::async_trait;

use crate::error::JobError;
use crate::types::JobTask;

/// Progress callback handed to long-running task executors, fraction in
/// `[0, 1]`.
pub type ProgressFn<'a> = &'a (dyn Fn(f32) + Send + Sync);

/// Executes one task step (download a model, compile it, activate it).
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Run the task to completion, reporting progress as it goes.
    async fn execute(&self, task: &JobTask, progress: ProgressFn<'_>) -> Result<(), JobError>;
}

/// Readiness of a resource with no queued job, reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceReadiness {
    Ready,
    SetupRequired,
    NotNeeded,
}

/// Answers "is this resource usable right now?" when the queue holds no job
/// for it.
#[async_trait]
pub trait ReadinessOracle: Send + Sync {
    async fn readiness(&self, resource: &str) -> ResourceReadiness;
}

/// User-facing notification sink for job completion and failure.
pub trait JobNotifier: Send + Sync {
    fn notify(&self, title: &str, body: &str);
}

/// Notifier that only logs. Used where no UI surface is attached.
pub struct LogNotifier;

impl JobNotifier for LogNotifier {
    fn notify(&self, title: &str, body: &str) {
        tracing::info!(title, body, "Notification");
    }
}
