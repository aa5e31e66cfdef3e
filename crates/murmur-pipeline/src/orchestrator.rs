//! Pipeline execution engine.
//!
//! Executes elements strictly in list order, timing each one into the
//! context's metrics. The first failing element aborts the remainder and
//! propagates its error; the caller decides fallback behavior. No retries,
//! no partial rollback.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use murmur_core::Timestamp;

use crate::context::PipelineContext;
use crate::error::PipelineError;
use crate::registry::StageRegistry;
use crate::stage::StageOutcome;
use crate::types::{ElementExecutionMetrics, ElementStatus, Pipeline};

/// Cooperative cancellation signal, checked only between elements. A stage
/// already running is never interrupted.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Runs pipelines against an injected stage registry.
pub struct Orchestrator {
    registry: Arc<StageRegistry>,
}

impl Orchestrator {
    pub fn new(registry: Arc<StageRegistry>) -> Self {
        Self { registry }
    }

    /// Execute `pipeline` over `context`, strictly in element order.
    ///
    /// Metrics for every element that started remain in the context whether
    /// the run succeeds or aborts, so the caller can always audit what ran.
    pub async fn run(
        &self,
        pipeline: &Pipeline,
        context: &mut PipelineContext,
        cancel: &CancelToken,
    ) -> Result<(), PipelineError> {
        // Resolve every type_id up front so an unknown stage fails the run
        // before any side effects.
        let stages = self.registry.resolve(pipeline)?;

        tracing::info!(
            pipeline = %pipeline.name,
            elements = pipeline.elements.len(),
            "Pipeline run started"
        );

        for (element, stage) in pipeline.elements.iter().zip(stages.iter()) {
            if cancel.is_cancelled() {
                tracing::info!(pipeline = %pipeline.name, "Pipeline run cancelled between elements");
                return Err(PipelineError::Cancelled);
            }

            let started_at = Timestamp::now();
            let timer = Instant::now();
            let result = stage.execute(&context.text, &element.config).await;
            let duration_ms = timer.elapsed().as_millis() as u64;

            match result {
                Ok(outcome) => {
                    context.metrics.push(ElementExecutionMetrics {
                        element_type: element.type_id.clone(),
                        status: ElementStatus::Success,
                        duration_ms,
                        started_at,
                    });
                    if let StageOutcome::Transform(text) = outcome {
                        context.text = text;
                    }
                    tracing::debug!(stage = %element.type_id, duration_ms, "Stage completed");
                }
                Err(e) => {
                    context.metrics.push(ElementExecutionMetrics {
                        element_type: element.type_id.clone(),
                        status: ElementStatus::Failure,
                        duration_ms,
                        started_at,
                    });
                    tracing::warn!(stage = %element.type_id, error = %e, "Stage failed, aborting pipeline");
                    return Err(e);
                }
            }
        }

        tracing::info!(
            pipeline = %pipeline.name,
            total_ms = context.elapsed_ms(),
            "Pipeline run completed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::Stage;
    use crate::types::ElementInstance;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;

    struct UpperStage;

    #[async_trait]
    impl Stage for UpperStage {
        fn type_id(&self) -> &str {
            "upper"
        }

        async fn execute(
            &self,
            text: &str,
            _config: &HashMap<String, serde_json::Value>,
        ) -> Result<StageOutcome, PipelineError> {
            Ok(StageOutcome::Transform(text.to_uppercase()))
        }
    }

    struct FailStage;

    #[async_trait]
    impl Stage for FailStage {
        fn type_id(&self) -> &str {
            "fail"
        }

        async fn execute(
            &self,
            _text: &str,
            _config: &HashMap<String, serde_json::Value>,
        ) -> Result<StageOutcome, PipelineError> {
            Err(PipelineError::Stage {
                type_id: "fail".to_string(),
                message: "boom".to_string(),
            })
        }
    }

    struct CountingAction {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Stage for CountingAction {
        fn type_id(&self) -> &str {
            "count"
        }

        async fn execute(
            &self,
            _text: &str,
            _config: &HashMap<String, serde_json::Value>,
        ) -> Result<StageOutcome, PipelineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(StageOutcome::ActionDone)
        }
    }

    fn registry_with(stages: Vec<Arc<dyn Stage>>) -> Arc<StageRegistry> {
        let mut registry = StageRegistry::new();
        for stage in stages {
            registry.register(stage);
        }
        Arc::new(registry)
    }

    #[tokio::test]
    async fn test_transform_replaces_text_action_passes_through() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = registry_with(vec![
            Arc::new(UpperStage),
            Arc::new(CountingAction {
                calls: Arc::clone(&calls),
            }),
        ]);
        let orchestrator = Orchestrator::new(registry);

        let pipeline = Pipeline::new(
            "p",
            vec![ElementInstance::new("upper"), ElementInstance::new("count")],
        );
        let mut context = PipelineContext::new("hello");

        orchestrator
            .run(&pipeline, &mut context, &CancelToken::new())
            .await
            .unwrap();

        assert_eq!(context.text, "HELLO");
        assert_eq!(context.original_text, "hello");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(context.metrics.len(), 2);
        assert!(context
            .metrics
            .iter()
            .all(|m| m.status == ElementStatus::Success));
    }

    #[tokio::test]
    async fn test_fail_fast_skips_later_elements() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = registry_with(vec![
            Arc::new(FailStage),
            Arc::new(CountingAction {
                calls: Arc::clone(&calls),
            }),
        ]);
        let orchestrator = Orchestrator::new(registry);

        let pipeline = Pipeline::new(
            "p",
            vec![ElementInstance::new("fail"), ElementInstance::new("count")],
        );
        let mut context = PipelineContext::new("hello");

        let err = orchestrator
            .run(&pipeline, &mut context, &CancelToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Stage { .. }));
        // Metrics contain only the failed element; the action never ran.
        assert_eq!(context.metrics.len(), 1);
        assert_eq!(context.metrics[0].element_type, "fail");
        assert_eq!(context.metrics[0].status, ElementStatus::Failure);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_stage_fails_before_any_execution() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = registry_with(vec![Arc::new(CountingAction {
            calls: Arc::clone(&calls),
        })]);
        let orchestrator = Orchestrator::new(registry);

        let pipeline = Pipeline::new(
            "p",
            vec![ElementInstance::new("count"), ElementInstance::new("nope")],
        );
        let mut context = PipelineContext::new("hi");

        let err = orchestrator
            .run(&pipeline, &mut context, &CancelToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::UnknownStage(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(context.metrics.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_before_run_executes_nothing() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = registry_with(vec![Arc::new(CountingAction {
            calls: Arc::clone(&calls),
        })]);
        let orchestrator = Orchestrator::new(registry);

        let cancel = CancelToken::new();
        cancel.cancel();

        let pipeline = Pipeline::new("p", vec![ElementInstance::new("count")]);
        let mut context = PipelineContext::new("hi");

        let err = orchestrator
            .run(&pipeline, &mut context, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_pipeline_is_a_successful_noop() {
        let orchestrator = Orchestrator::new(Arc::new(StageRegistry::new()));
        let pipeline = Pipeline::new("empty", vec![]);
        let mut context = PipelineContext::new("text");

        orchestrator
            .run(&pipeline, &mut context, &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(context.text, "text");
        assert!(context.metrics.is_empty());
    }

    #[tokio::test]
    async fn test_metrics_record_execution_order() {
        let registry = registry_with(vec![Arc::new(UpperStage), Arc::new(NormalizeForTest)]);
        let orchestrator = Orchestrator::new(registry);

        let pipeline = Pipeline::new(
            "p",
            vec![ElementInstance::new("upper"), ElementInstance::new("norm")],
        );
        let mut context = PipelineContext::new("a");
        orchestrator
            .run(&pipeline, &mut context, &CancelToken::new())
            .await
            .unwrap();

        let order: Vec<&str> = context
            .metrics
            .iter()
            .map(|m| m.element_type.as_str())
            .collect();
        assert_eq!(order, vec!["upper", "norm"]);
    }

    struct NormalizeForTest;

    #[async_trait]
    impl Stage for NormalizeForTest {
        fn type_id(&self) -> &str {
            "norm"
        }

        async fn execute(
            &self,
            text: &str,
            _config: &HashMap<String, serde_json::Value>,
        ) -> Result<StageOutcome, PipelineError> {
            Ok(StageOutcome::Transform(text.trim().to_string()))
        }
    }
}
