//! Registry mapping stage type ids to implementations.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::PipelineError;
use crate::stage::Stage;
use crate::types::Pipeline;

/// Init-time registry of available stages.
///
/// Populated once at the composition root; the orchestrator resolves a whole
/// pipeline against it before executing anything, so an unknown `type_id`
/// fails the run up front rather than mid-flight.
#[derive(Default)]
pub struct StageRegistry {
    stages: HashMap<String, Arc<dyn Stage>>,
}

impl StageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a stage under its `type_id`. Re-registering replaces.
    pub fn register(&mut self, stage: Arc<dyn Stage>) {
        let type_id = stage.type_id().to_string();
        tracing::debug!(type_id = %type_id, "Stage registered");
        self.stages.insert(type_id, stage);
    }

    /// Look up a single stage.
    pub fn get(&self, type_id: &str) -> Option<Arc<dyn Stage>> {
        self.stages.get(type_id).cloned()
    }

    /// Resolve every element of `pipeline` to its stage, in order.
    pub fn resolve(&self, pipeline: &Pipeline) -> Result<Vec<Arc<dyn Stage>>, PipelineError> {
        pipeline
            .elements
            .iter()
            .map(|element| {
                self.get(&element.type_id)
                    .ok_or_else(|| PipelineError::UnknownStage(element.type_id.clone()))
            })
            .collect()
    }

    /// Registered type ids, for diagnostics.
    pub fn type_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.stages.keys().cloned().collect();
        ids.sort();
        ids
    }
}
