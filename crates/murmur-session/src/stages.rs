//! Pipeline stages backed by session collaborators.
//!
//! These adapt the refinement and insertion services into registry stages so
//! the post-transcription pipeline stays pure registry dispatch.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use murmur_core::types::RefinementMode;
use murmur_pipeline::{PipelineError, Stage, StageOutcome};

use crate::services::{RefinementService, TextInserter};

/// Transform stage running the configured refinement backend.
///
/// Per-instance config: `mode` ("cleanup" | "formal" | "custom") and
/// `custom_prompt`.
pub struct RefineStage {
    refiner: Arc<dyn RefinementService>,
}

impl RefineStage {
    pub fn new(refiner: Arc<dyn RefinementService>) -> Self {
        Self { refiner }
    }
}

#[async_trait]
impl Stage for RefineStage {
    fn type_id(&self) -> &str {
        "refine"
    }

    async fn execute(
        &self,
        text: &str,
        config: &HashMap<String, serde_json::Value>,
    ) -> Result<StageOutcome, PipelineError> {
        let mode = config
            .get("mode")
            .and_then(|v| serde_json::from_value::<RefinementMode>(v.clone()).ok())
            .unwrap_or_default();
        let custom_prompt = config.get("custom_prompt").and_then(|v| v.as_str());

        let refined = self
            .refiner
            .refine(text, mode, custom_prompt)
            .await
            .map_err(|e| PipelineError::Stage {
                type_id: "refine".to_string(),
                message: e.to_string(),
            })?;
        Ok(StageOutcome::Transform(refined))
    }
}

/// Action stage inserting the current text into the focused application.
///
/// Per-instance config: `press_enter` (bool) to submit after insertion.
pub struct InsertTextStage {
    inserter: Arc<dyn TextInserter>,
}

impl InsertTextStage {
    pub fn new(inserter: Arc<dyn TextInserter>) -> Self {
        Self { inserter }
    }
}

#[async_trait]
impl Stage for InsertTextStage {
    fn type_id(&self) -> &str {
        "insert_text"
    }

    async fn execute(
        &self,
        text: &str,
        config: &HashMap<String, serde_json::Value>,
    ) -> Result<StageOutcome, PipelineError> {
        self.inserter
            .insert_text(text)
            .await
            .map_err(|e| PipelineError::Stage {
                type_id: "insert_text".to_string(),
                message: e.to_string(),
            })?;

        if config
            .get("press_enter")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
        {
            self.inserter
                .press_enter()
                .await
                .map_err(|e| PipelineError::Stage {
                    type_id: "insert_text".to_string(),
                    message: e.to_string(),
                })?;
        }
        Ok(StageOutcome::ActionDone)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use murmur_core::{MurmurError, Result};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct EchoRefiner;

    #[async_trait]
    impl RefinementService for EchoRefiner {
        async fn refine(
            &self,
            text: &str,
            mode: RefinementMode,
            _custom_prompt: Option<&str>,
        ) -> Result<String> {
            Ok(format!("{:?}:{}", mode, text))
        }
    }

    #[derive(Default)]
    struct RecordingInserter {
        inserted: Mutex<Vec<String>>,
        enters: AtomicUsize,
        fail: AtomicBool,
    }

    #[async_trait]
    impl TextInserter for RecordingInserter {
        async fn acquire_target(&self) -> Result<()> {
            Ok(())
        }

        async fn insert_text(&self, text: &str) -> Result<()> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(MurmurError::Insertion("no target".to_string()));
            }
            self.inserted.lock().unwrap().push(text.to_string());
            Ok(())
        }

        async fn press_enter(&self) -> Result<()> {
            self.enters.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn has_permission(&self) -> bool {
            true
        }

        fn copy_to_clipboard(&self, _text: &str) {}
    }

    #[tokio::test]
    async fn test_refine_stage_reads_mode_from_config() {
        let stage = RefineStage::new(Arc::new(EchoRefiner));
        let mut config = HashMap::new();
        config.insert("mode".to_string(), serde_json::json!("formal"));

        let outcome = stage.execute("hi", &config).await.unwrap();
        assert_eq!(outcome, StageOutcome::Transform("Formal:hi".to_string()));
    }

    #[tokio::test]
    async fn test_refine_stage_defaults_to_cleanup() {
        let stage = RefineStage::new(Arc::new(EchoRefiner));
        let outcome = stage.execute("hi", &HashMap::new()).await.unwrap();
        assert_eq!(outcome, StageOutcome::Transform("Cleanup:hi".to_string()));
    }

    #[tokio::test]
    async fn test_insert_stage_passes_text_through() {
        let inserter = Arc::new(RecordingInserter::default());
        let stage = InsertTextStage::new(Arc::clone(&inserter) as Arc<dyn TextInserter>);

        let outcome = stage.execute("hello", &HashMap::new()).await.unwrap();
        assert_eq!(outcome, StageOutcome::ActionDone);
        assert_eq!(*inserter.inserted.lock().unwrap(), vec!["hello"]);
        assert_eq!(inserter.enters.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_insert_stage_presses_enter_when_configured() {
        let inserter = Arc::new(RecordingInserter::default());
        let stage = InsertTextStage::new(Arc::clone(&inserter) as Arc<dyn TextInserter>);
        let mut config = HashMap::new();
        config.insert("press_enter".to_string(), serde_json::json!(true));

        stage.execute("go", &config).await.unwrap();
        assert_eq!(inserter.enters.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_insert_stage_surfaces_failure() {
        let inserter = Arc::new(RecordingInserter::default());
        inserter.fail.store(true, Ordering::SeqCst);
        let stage = InsertTextStage::new(Arc::clone(&inserter) as Arc<dyn TextInserter>);

        let err = stage.execute("x", &HashMap::new()).await.unwrap_err();
        assert!(matches!(err, PipelineError::Stage { .. }));
    }
}
