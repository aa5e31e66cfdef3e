//! The stage contract every pipeline element implements.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::PipelineError;

/// What a stage did with the text it was handed.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome {
    /// A transform: the context's current text is replaced with this.
    Transform(String),
    /// An action: a side effect ran; text passes through unchanged.
    ActionDone,
}

/// One pipeline stage, either a text transform or a side-effect action.
///
/// Implementations are registered in a [`crate::StageRegistry`] under their
/// `type_id` and resolved at run start; the orchestrator never matches on
/// concrete stage types.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Registry key this stage is resolved by.
    fn type_id(&self) -> &str;

    /// Run the stage over the current text with its per-instance config.
    async fn execute(
        &self,
        text: &str,
        config: &HashMap<String, serde_json::Value>,
    ) -> Result<StageOutcome, PipelineError>;
}
