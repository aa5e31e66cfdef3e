//! Recording-session orchestration: the state machine sequencing capture,
//! endpoint detection, transcription, refinement, and insertion, plus the
//! coordinators above it (mode arbitration, trigger fan-in) and the capped
//! transcription history.

pub mod arbiter;
pub mod history;
pub mod monitor;
pub mod refine;
pub mod services;
pub mod session;
pub mod stages;
pub mod state;
pub mod trigger;

pub use arbiter::ModeArbiter;
pub use history::{TranscriptEntry, TranscriptHistory};
pub use monitor::{EndpointMonitor, MonitorVerdict, StopReason};
pub use refine::{ChatRefiner, RuleRefiner};
pub use services::{
    CaptureService, LogNotifier, MeetingDetector, Notifier, RefinementService, SpeakerVerifier,
    TextInserter, TranscriptionService,
};
pub use session::RecordingSession;
pub use stages::{InsertTextStage, RefineStage};
pub use state::StateMachine;
pub use trigger::{TriggerEvent, TriggerManager, TriggerSink, TriggerSource};
