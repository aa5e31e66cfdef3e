use murmur_core::MurmurError;
use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by the job queue and worker.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Job not found: {0}")]
    NotFound(Uuid),

    /// A single task step failed. Recorded on the task and retryable
    /// without re-submission.
    #[error("Task '{kind}' failed: {message}")]
    Task { kind: String, message: String },

    #[error("Job storage error: {0}")]
    Storage(String),
}

impl From<JobError> for MurmurError {
    fn from(err: JobError) -> Self {
        match err {
            JobError::Storage(msg) => MurmurError::Persistence(msg),
            other => MurmurError::Job(other.to_string()),
        }
    }
}
