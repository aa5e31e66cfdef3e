//! Text-processing pipeline: a named, ordered list of stages run over one
//! mutable context.
//!
//! The orchestrator holds no compiled knowledge of concrete stage behaviors.
//! Stage `type_id`s are resolved through an injected [`StageRegistry`] once
//! at run start, so new refinement styles or insertion actions are added by
//! registering a new [`Stage`] without touching the execution engine.

pub mod context;
pub mod error;
pub mod history;
pub mod normalize;
pub mod orchestrator;
pub mod registry;
pub mod stage;
pub mod types;

pub use context::PipelineContext;
pub use error::PipelineError;
pub use history::RecordHistory;
pub use normalize::NormalizeStage;
pub use orchestrator::{CancelToken, Orchestrator};
pub use registry::StageRegistry;
pub use stage::{Stage, StageOutcome};
pub use types::{
    ElementExecutionMetrics, ElementInstance, ElementStatus, Pipeline, PipelineExecutionRecord,
};
