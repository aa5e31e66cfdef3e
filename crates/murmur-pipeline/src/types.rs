//! Pipeline value objects: configured elements, per-element metrics, and the
//! persisted execution record.

use std::collections::HashMap;
use std::fmt;

use murmur_core::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One configured stage instance, constructed per run from current settings
/// and immutable for the duration of that run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementInstance {
    /// Registry key resolving to a concrete [`crate::Stage`].
    pub type_id: String,
    /// Stage-specific configuration values.
    #[serde(default)]
    pub config: HashMap<String, serde_json::Value>,
}

impl ElementInstance {
    pub fn new(type_id: impl Into<String>) -> Self {
        Self {
            type_id: type_id.into(),
            config: HashMap::new(),
        }
    }

    pub fn with_config(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.config.insert(key.into(), value);
        self
    }
}

/// A named, ordered stage list for one run. Built fresh per transcription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    pub name: String,
    pub elements: Vec<ElementInstance>,
}

impl Pipeline {
    pub fn new(name: impl Into<String>, elements: Vec<ElementInstance>) -> Self {
        Self {
            name: name.into(),
            elements,
        }
    }

    /// Build a pipeline from bare type ids with empty per-stage config.
    pub fn from_type_ids(name: impl Into<String>, type_ids: &[String]) -> Self {
        Self::new(
            name,
            type_ids.iter().map(ElementInstance::new).collect(),
        )
    }
}

/// Outcome classification for one executed element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementStatus {
    Success,
    Failure,
}

impl fmt::Display for ElementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementStatus::Success => write!(f, "success"),
            ElementStatus::Failure => write!(f, "failure"),
        }
    }
}

/// Timing and outcome of one executed element. Appended during the run,
/// never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementExecutionMetrics {
    pub element_type: String,
    pub status: ElementStatus,
    pub duration_ms: u64,
    pub started_at: Timestamp,
}

/// Persisted audit record of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineExecutionRecord {
    pub id: Uuid,
    pub timestamp: Timestamp,
    pub total_duration_ms: u64,
    pub elements: Vec<ElementExecutionMetrics>,
    pub input_text: String,
    pub output_text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_instance_builder() {
        let element = ElementInstance::new("refine")
            .with_config("mode", serde_json::json!("formal"));
        assert_eq!(element.type_id, "refine");
        assert_eq!(element.config["mode"], serde_json::json!("formal"));
    }

    #[test]
    fn test_pipeline_from_type_ids() {
        let ids = vec!["normalize".to_string(), "refine".to_string()];
        let pipeline = Pipeline::from_type_ids("default", &ids);
        assert_eq!(pipeline.elements.len(), 2);
        assert_eq!(pipeline.elements[1].type_id, "refine");
        assert!(pipeline.elements[0].config.is_empty());
    }

    #[test]
    fn test_record_serde_round_trip() {
        let record = PipelineExecutionRecord {
            id: Uuid::new_v4(),
            timestamp: Timestamp::now(),
            total_duration_ms: 12,
            elements: vec![ElementExecutionMetrics {
                element_type: "normalize".to_string(),
                status: ElementStatus::Success,
                duration_ms: 3,
                started_at: Timestamp::now(),
            }],
            input_text: "in".to_string(),
            output_text: "out".to_string(),
        };
        let json = serde_json::to_string(&record).unwrap();
        let rt: PipelineExecutionRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(rt.elements.len(), 1);
        assert_eq!(rt.elements[0].status, ElementStatus::Success);
    }
}
