//! Collaborator contracts the session drives but does not implement.
//!
//! Concrete implementations (microphone capture, transcription engines,
//! OS-level text insertion, speaker verification) live outside the core and
//! are injected at the composition root. Which implementation backs each
//! trait is configuration, never session logic.

use async_trait::async_trait;
use murmur_core::types::RefinementMode;
use murmur_core::Result;

/// Exclusive microphone capture.
#[async_trait]
pub trait CaptureService: Send + Sync {
    /// Begin capturing; fails on device or permission problems.
    async fn start(&self) -> Result<()>;

    /// Stop capturing and return the full accumulated sample buffer.
    async fn stop(&self) -> Result<Vec<f32>>;

    /// The most recent `count` samples of the live buffer, oldest first.
    /// Returns fewer when the buffer is shorter.
    async fn recent_samples(&self, count: usize) -> Vec<f32>;

    /// Current input level in `[0, 1]`, for metering.
    async fn level(&self) -> f32;
}

/// Speech-to-text over a raw sample buffer.
#[async_trait]
pub trait TranscriptionService: Send + Sync {
    async fn transcribe(&self, samples: &[f32], sample_rate: u32, language: &str)
        -> Result<String>;
}

/// Post-transcription text refinement.
#[async_trait]
pub trait RefinementService: Send + Sync {
    async fn refine(
        &self,
        text: &str,
        mode: RefinementMode,
        custom_prompt: Option<&str>,
    ) -> Result<String>;
}

/// OS-level insertion into the focused application.
#[async_trait]
pub trait TextInserter: Send + Sync {
    /// Best-effort lock of the insertion target, taken once per session.
    /// Failure is tolerated; insertion then targets whatever has focus.
    async fn acquire_target(&self) -> Result<()>;

    async fn insert_text(&self, text: &str) -> Result<()>;

    async fn press_enter(&self) -> Result<()>;

    fn has_permission(&self) -> bool;

    /// Terminal fallback when insertion fails. Must not fail.
    fn copy_to_clipboard(&self, text: &str);
}

/// Per-frame check that the captured voice matches the enrolled speaker.
#[async_trait]
pub trait SpeakerVerifier: Send + Sync {
    async fn matches_enrolled_voice(&self, samples: &[f32]) -> bool;
}

/// Meeting-detection collaborator the mode arbiter pauses while dictation
/// owns the microphone.
#[async_trait]
pub trait MeetingDetector: Send + Sync {
    async fn pause_detection(&self);
    async fn resume_detection(&self);
}

/// User-facing notification sink.
pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, body: &str);
}

/// Notifier that only logs, for headless runs and tests.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, title: &str, body: &str) {
        tracing::info!(title, body, "Notification");
    }
}
