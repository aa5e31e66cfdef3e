//! In-process adapters for the collaborator seams.
//!
//! Platform backends (microphone capture, a transcription engine, OS text
//! insertion, model tooling) plug in behind the session and job traits.
//! Until they are linked, these adapters keep the binary runnable end to
//! end: capture buffers silence, transcription reports that no engine is
//! configured, insertion writes to stdout, and job tasks complete with
//! simulated progress.

use std::sync::Mutex;

use async_trait::async_trait;
use murmur_core::{MurmurError, Result};
use murmur_jobs::{JobError, ProgressFn, ReadinessOracle, ResourceReadiness, TaskExecutor};
use murmur_jobs::{JobTask, JobTaskKind};
use murmur_session::{CaptureService, TextInserter, TranscriptionService};

/// Capture service that accumulates silence at the configured sample rate.
pub struct SilenceCapture {
    sample_rate: u32,
    buffer: Mutex<Vec<f32>>,
    started_at: Mutex<Option<std::time::Instant>>,
}

impl SilenceCapture {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            buffer: Mutex::new(Vec::new()),
            started_at: Mutex::new(None),
        }
    }

    fn fill_to_now(&self) {
        let elapsed = match *self.started_at.lock().unwrap() {
            Some(t) => t.elapsed(),
            None => return,
        };
        let want = (elapsed.as_secs_f64() * self.sample_rate as f64) as usize;
        let mut buffer = self.buffer.lock().unwrap();
        if buffer.len() < want {
            buffer.resize(want, 0.0);
        }
    }
}

#[async_trait]
impl CaptureService for SilenceCapture {
    async fn start(&self) -> Result<()> {
        *self.started_at.lock().unwrap() = Some(std::time::Instant::now());
        self.buffer.lock().unwrap().clear();
        Ok(())
    }

    async fn stop(&self) -> Result<Vec<f32>> {
        self.fill_to_now();
        *self.started_at.lock().unwrap() = None;
        Ok(std::mem::take(&mut *self.buffer.lock().unwrap()))
    }

    async fn recent_samples(&self, count: usize) -> Vec<f32> {
        self.fill_to_now();
        let buffer = self.buffer.lock().unwrap();
        let start = buffer.len().saturating_sub(count);
        buffer[start..].to_vec()
    }

    async fn level(&self) -> f32 {
        0.0
    }
}

/// Transcription seam with no engine attached.
pub struct UnconfiguredTranscriber;

#[async_trait]
impl TranscriptionService for UnconfiguredTranscriber {
    async fn transcribe(&self, _: &[f32], _: u32, _: &str) -> Result<String> {
        Err(MurmurError::Transcription(
            "No transcription engine configured".to_string(),
        ))
    }
}

/// Inserter that writes to stdout; the clipboard fallback logs.
pub struct StdoutInserter;

#[async_trait]
impl TextInserter for StdoutInserter {
    async fn acquire_target(&self) -> Result<()> {
        Ok(())
    }

    async fn insert_text(&self, text: &str) -> Result<()> {
        println!("{}", text);
        Ok(())
    }

    async fn press_enter(&self) -> Result<()> {
        println!();
        Ok(())
    }

    fn has_permission(&self) -> bool {
        true
    }

    fn copy_to_clipboard(&self, text: &str) {
        tracing::info!(chars = text.len(), "Clipboard fallback (no clipboard attached)");
    }
}

/// Task executor that completes each step with simulated progress. Real
/// download/compile/activate tooling replaces this per task kind.
pub struct ImmediateExecutor;

#[async_trait]
impl TaskExecutor for ImmediateExecutor {
    async fn execute(
        &self,
        task: &JobTask,
        progress: ProgressFn<'_>,
    ) -> std::result::Result<(), JobError> {
        tracing::info!(kind = %task.kind, resource = ?task.resource(), "Executing task");
        if task.kind == JobTaskKind::Download {
            for step in 1..=4 {
                progress(step as f32 / 4.0);
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            }
        } else {
            progress(1.0);
        }
        Ok(())
    }
}

/// Meeting-detection seam with no detector attached.
pub struct NoopMeetingDetector;

#[async_trait]
impl murmur_session::MeetingDetector for NoopMeetingDetector {
    async fn pause_detection(&self) {
        tracing::debug!("Meeting detection paused");
    }

    async fn resume_detection(&self) {
        tracing::debug!("Meeting detection resumed");
    }
}

/// Readiness oracle that treats a resource as installed when a file of that
/// name exists under the models directory.
pub struct FileReadinessOracle {
    pub models_dir: std::path::PathBuf,
}

#[async_trait]
impl ReadinessOracle for FileReadinessOracle {
    async fn readiness(&self, resource: &str) -> ResourceReadiness {
        if self.models_dir.join(resource).exists() {
            ResourceReadiness::Ready
        } else {
            ResourceReadiness::SetupRequired
        }
    }
}
