//! Mutable carrier threaded through a pipeline run.

use std::time::Instant;

use crate::types::ElementExecutionMetrics;

/// Created at run start, consumed at run end. Transforms replace `text`;
/// `original_text` is preserved for fallback when refinement fails.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    /// Current text, replaced by each transform stage.
    pub text: String,
    /// Text the run started with.
    pub original_text: String,
    /// One entry per executed element, in execution order.
    pub metrics: Vec<ElementExecutionMetrics>,
    started: Instant,
}

impl PipelineContext {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            original_text: text.clone(),
            text,
            metrics: Vec::new(),
            started: Instant::now(),
        }
    }

    /// Wall time since the context was created.
    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_preserves_original() {
        let mut ctx = PipelineContext::new("hello");
        ctx.text = "HELLO".to_string();
        assert_eq!(ctx.original_text, "hello");
        assert_eq!(ctx.text, "HELLO");
        assert!(ctx.metrics.is_empty());
    }
}
