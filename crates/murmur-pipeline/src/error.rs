use murmur_core::MurmurError;
use thiserror::Error;

/// Errors surfaced by pipeline construction and execution.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A `type_id` in the pipeline has no registered stage.
    #[error("No stage registered for type '{0}'")]
    UnknownStage(String),

    /// A stage failed; the run aborts at this element.
    #[error("Stage '{type_id}' failed: {message}")]
    Stage { type_id: String, message: String },

    /// The run was cancelled between elements.
    #[error("Pipeline run cancelled")]
    Cancelled,

    #[error("Pipeline storage error: {0}")]
    Storage(String),
}

impl From<PipelineError> for MurmurError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Storage(msg) => MurmurError::Persistence(msg),
            other => MurmurError::Refinement(other.to_string()),
        }
    }
}
