//! The recording session: capture -> transcription -> refinement -> insertion.
//!
//! Single-flight is enforced by the state machine plus a settling flag
//! covering the window between final transcription and pipeline completion.
//! Every exit path, success or failure, returns the state machine to Idle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use murmur_core::config::MurmurConfig;
use murmur_core::events::{DomainEvent, EventBus};
use murmur_core::types::{CaptureMode, RecordingState, TriggerKind};
use murmur_core::{Result, Timestamp};
use murmur_endpoint::EndpointConfig;
use murmur_pipeline::{
    CancelToken, ElementStatus, Orchestrator, Pipeline, PipelineContext, PipelineExecutionRecord,
    RecordHistory, StageRegistry,
};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::history::{TranscriptEntry, TranscriptHistory};
use crate::monitor::{EndpointMonitor, MonitorVerdict};
use crate::services::{
    CaptureService, Notifier, SpeakerVerifier, TextInserter, TranscriptionService,
};
use crate::state::StateMachine;

/// Everything owned by one in-flight capture, dropped as a set on stop.
struct ActiveCapture {
    session_id: Uuid,
    language: String,
    timers: Vec<JoinHandle<()>>,
    partial_in_flight: Arc<AtomicBool>,
    partial_text: Arc<std::sync::Mutex<String>>,
    monitor_stop: Arc<AtomicBool>,
}

/// Orchestrates one capture/process cycle at a time.
pub struct RecordingSession {
    config: MurmurConfig,
    state: StateMachine,
    pipeline_settling: AtomicBool,
    capture: Arc<dyn CaptureService>,
    transcriber: Arc<dyn TranscriptionService>,
    inserter: Arc<dyn TextInserter>,
    verifier: Option<Arc<dyn SpeakerVerifier>>,
    orchestrator: Orchestrator,
    records: Arc<RecordHistory>,
    history: Arc<TranscriptHistory>,
    events: EventBus,
    notifier: Arc<dyn Notifier>,
    active: tokio::sync::Mutex<Option<ActiveCapture>>,
    /// Handle to self for monitor tasks that stop the session they belong to.
    self_ref: Weak<RecordingSession>,
}

impl RecordingSession {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: MurmurConfig,
        registry: Arc<StageRegistry>,
        capture: Arc<dyn CaptureService>,
        transcriber: Arc<dyn TranscriptionService>,
        inserter: Arc<dyn TextInserter>,
        verifier: Option<Arc<dyn SpeakerVerifier>>,
        records: Arc<RecordHistory>,
        history: Arc<TranscriptHistory>,
        events: EventBus,
        notifier: Arc<dyn Notifier>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            config,
            state: StateMachine::new(),
            pipeline_settling: AtomicBool::new(false),
            capture,
            transcriber,
            inserter,
            verifier,
            orchestrator: Orchestrator::new(registry),
            records,
            history,
            events,
            notifier,
            active: tokio::sync::Mutex::new(None),
            self_ref: me.clone(),
        })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RecordingState {
        self.state.current()
    }

    /// Latest partial transcript of the in-flight capture, if streaming.
    pub async fn partial_transcript(&self) -> Option<String> {
        let guard = self.active.lock().await;
        let active = guard.as_ref()?;
        let text = active.partial_text.lock().ok()?.clone();
        (!text.is_empty()).then_some(text)
    }

    /// Begin a capture session. No-op (logged) when a session is already
    /// recording or a prior run's pipeline has not finished settling.
    pub async fn start(&self, trigger: TriggerKind, language: &str) -> Result<()> {
        let mut guard = self.active.lock().await;

        if guard.is_some() || self.state.current() != RecordingState::Idle {
            tracing::info!(state = %self.state.current(), "Start ignored, session already active");
            return Ok(());
        }
        if self.pipeline_settling.load(Ordering::SeqCst) {
            tracing::info!("Start ignored, previous pipeline still settling");
            return Ok(());
        }

        // Best effort: insertion falls back to current focus if this fails.
        if let Err(e) = self.inserter.acquire_target().await {
            tracing::warn!(error = %e, "Could not lock insertion target");
        }

        self.capture.start().await?;
        self.state.transition(RecordingState::Recording)?;

        let session_id = Uuid::new_v4();
        let partial_in_flight = Arc::new(AtomicBool::new(false));
        let partial_text = Arc::new(std::sync::Mutex::new(String::new()));
        let monitor_stop = Arc::new(AtomicBool::new(false));
        let mut timers = Vec::new();

        timers.push(self.spawn_level_timer());
        if self.config.session.streaming {
            timers.push(self.spawn_partial_timer(
                Arc::clone(&partial_in_flight),
                Arc::clone(&partial_text),
                language.to_string(),
            ));
        }
        if trigger == TriggerKind::VoiceCommand {
            timers.push(self.spawn_monitor(Arc::clone(&monitor_stop)));
        }

        tracing::info!(session_id = %session_id, %trigger, language, "Capture started");
        self.events.publish(DomainEvent::CaptureStarted {
            session_id,
            mode: CaptureMode::Dictation,
            trigger,
            timestamp: Timestamp::now(),
        });

        *guard = Some(ActiveCapture {
            session_id,
            language: language.to_string(),
            timers,
            partial_in_flight,
            partial_text,
            monitor_stop,
        });
        Ok(())
    }

    /// End the capture session and run transcription, refinement, and
    /// insertion. No-op when no session is active. Returns the final text,
    /// or `None` when the capture was discarded.
    pub async fn stop(&self) -> Result<Option<String>> {
        let active = {
            let mut guard = self.active.lock().await;
            match guard.take() {
                Some(active) => active,
                None => {
                    tracing::debug!("Stop ignored, no active session");
                    return Ok(None);
                }
            }
        };
        // Blocks new starts until history and events are recorded.
        self.pipeline_settling.store(true, Ordering::SeqCst);
        let result = self.finish(active).await;
        self.pipeline_settling.store(false, Ordering::SeqCst);
        result
    }

    async fn finish(&self, active: ActiveCapture) -> Result<Option<String>> {
        let session_id = active.session_id;
        active.monitor_stop.store(true, Ordering::SeqCst);
        for timer in &active.timers {
            timer.abort();
        }

        self.state.transition(RecordingState::Transcribing)?;
        self.drain_partial(&active.partial_in_flight).await;

        let samples = match self.capture.stop().await {
            Ok(samples) => samples,
            Err(e) => {
                tracing::error!(session_id = %session_id, error = %e, "Capture stop failed");
                self.end_session(session_id, 0.0);
                return Err(e);
            }
        };

        let duration_secs = samples.len() as f64 / self.config.audio.sample_rate as f64;
        if duration_secs < self.config.session.min_capture_secs {
            tracing::info!(
                session_id = %session_id,
                duration_secs,
                "Capture shorter than minimum, discarding"
            );
            self.end_session(session_id, duration_secs);
            return Ok(None);
        }

        let transcript = match self
            .transcriber
            .transcribe(&samples, self.config.audio.sample_rate, &active.language)
            .await
        {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                tracing::error!(session_id = %session_id, error = %e, "Transcription failed");
                self.events.publish(DomainEvent::TranscriptionFailed {
                    session_id,
                    reason: e.to_string(),
                    timestamp: Timestamp::now(),
                });
                self.notifier
                    .notify("Transcription failed", "No text was produced for this capture.");
                self.end_session(session_id, duration_secs);
                return Err(e);
            }
        };

        if transcript.is_empty() {
            tracing::info!(session_id = %session_id, "Empty transcript, nothing to insert");
            self.end_session(session_id, duration_secs);
            return Ok(None);
        }

        let final_text = if self.config.session.refine {
            self.state.transition(RecordingState::Refining)?;
            self.run_pipeline(session_id, &transcript).await
        } else {
            self.insert_with_fallback(&transcript).await;
            transcript.clone()
        };

        let entry = TranscriptEntry::new(final_text.clone(), duration_secs, &active.language);
        if let Err(e) = self.history.append(entry) {
            tracing::warn!(error = %e, "Failed to record transcript history");
        }

        self.end_session(session_id, duration_secs);
        Ok(Some(final_text))
    }

    /// Run the post-transcription pipeline. On any stage failure the raw
    /// transcript is inserted directly so refinement never blocks insertion.
    async fn run_pipeline(&self, session_id: Uuid, transcript: &str) -> String {
        let pipeline =
            Pipeline::from_type_ids("post_transcription", &self.config.session.pipeline);
        let mut context = PipelineContext::new(transcript);
        let cancel = CancelToken::new();

        let run = self.orchestrator.run(&pipeline, &mut context, &cancel).await;

        let record = PipelineExecutionRecord {
            id: Uuid::new_v4(),
            timestamp: Timestamp::now(),
            total_duration_ms: context.elapsed_ms(),
            elements: context.metrics.clone(),
            input_text: context.original_text.clone(),
            output_text: context.text.clone(),
        };
        if let Err(e) = self.records.append(record) {
            tracing::warn!(error = %e, "Failed to record pipeline execution");
        }

        match run {
            Ok(()) => context.text,
            Err(e) => {
                tracing::warn!(
                    session_id = %session_id,
                    error = %e,
                    "Pipeline failed, falling back with latest text"
                );
                // Transforms that already succeeded are kept; only re-insert
                // when the insert stage itself never completed.
                let already_inserted = context.metrics.iter().any(|m| {
                    m.element_type == "insert_text" && m.status == ElementStatus::Success
                });
                if !already_inserted {
                    self.insert_with_fallback(&context.text).await;
                }
                context.text
            }
        }
    }

    /// Insert text, degrading to clipboard + notification. Cannot fail.
    async fn insert_with_fallback(&self, text: &str) {
        if let Err(e) = self.inserter.insert_text(text).await {
            tracing::warn!(error = %e, "Insertion failed, copying to clipboard");
            self.inserter.copy_to_clipboard(text);
            self.notifier.notify(
                "Copied to clipboard",
                "Text could not be inserted; it is on your clipboard.",
            );
        }
    }

    /// Bounded wait for an in-flight partial transcription to settle before
    /// the final buffer read, to avoid a torn read. Warns and proceeds on
    /// timeout.
    async fn drain_partial(&self, in_flight: &AtomicBool) {
        let deadline = Instant::now() + Duration::from_millis(self.config.session.drain_timeout_ms);
        while in_flight.load(Ordering::SeqCst) {
            if Instant::now() >= deadline {
                tracing::warn!(
                    timeout_ms = self.config.session.drain_timeout_ms,
                    "Partial transcription did not settle, proceeding"
                );
                return;
            }
            tokio::time::sleep(Duration::from_millis(self.config.session.drain_tick_ms)).await;
        }
    }

    /// Emit `capture_ended` and return to Idle, on every path.
    fn end_session(&self, session_id: Uuid, duration_secs: f64) {
        self.events.publish(DomainEvent::CaptureEnded {
            session_id,
            duration_secs,
            timestamp: Timestamp::now(),
        });
        if self.state.current() != RecordingState::Idle {
            if self.state.transition(RecordingState::Idle).is_err() {
                self.state.reset();
            }
        }
        tracing::info!(session_id = %session_id, duration_secs, "Capture ended");
    }

    fn spawn_level_timer(&self) -> JoinHandle<()> {
        let capture = Arc::clone(&self.capture);
        let interval_ms = self.config.session.level_interval_ms;
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(Duration::from_millis(interval_ms));
            loop {
                tick.tick().await;
                let level = capture.level().await;
                tracing::trace!(level, "Input level");
            }
        })
    }

    fn spawn_partial_timer(
        &self,
        in_flight: Arc<AtomicBool>,
        partial_text: Arc<std::sync::Mutex<String>>,
        language: String,
    ) -> JoinHandle<()> {
        let capture = Arc::clone(&self.capture);
        let transcriber = Arc::clone(&self.transcriber);
        let sample_rate = self.config.audio.sample_rate;
        let interval_ms = self.config.session.partial_interval_ms;
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(Duration::from_millis(interval_ms));
            tick.tick().await;
            loop {
                tick.tick().await;
                in_flight.store(true, Ordering::SeqCst);
                let samples = capture.recent_samples(usize::MAX).await;
                match transcriber.transcribe(&samples, sample_rate, &language).await {
                    Ok(text) => {
                        tracing::debug!(chars = text.len(), "Partial transcript updated");
                        if let Ok(mut partial) = partial_text.lock() {
                            *partial = text;
                        }
                    }
                    Err(e) => tracing::debug!(error = %e, "Partial transcription failed"),
                }
                in_flight.store(false, Ordering::SeqCst);
            }
        })
    }

    /// Endpoint-aware monitoring for voice-command sessions: long silence
    /// hangover plus per-frame speaker verification.
    fn spawn_monitor(&self, stop_flag: Arc<AtomicBool>) -> JoinHandle<()> {
        let Some(session) = self.self_ref.upgrade() else {
            return tokio::spawn(async {});
        };
        let tuning = self.config.endpoint.clone();
        let sample_rate = self.config.audio.sample_rate;
        tokio::spawn(async move {
            let window =
                (sample_rate as u64 * tuning.monitor_window_ms / 1_000) as usize;
            let mut monitor = EndpointMonitor::new(
                EndpointConfig::from_tuning(&tuning, sample_rate, true),
                tuning.verification_failure_frames,
            );
            let mut tick =
                tokio::time::interval(Duration::from_millis(tuning.monitor_interval_ms));
            tick.tick().await;
            loop {
                tick.tick().await;
                if stop_flag.load(Ordering::SeqCst) {
                    return;
                }
                let samples = session.capture.recent_samples(window).await;
                let speaker_matches = match &session.verifier {
                    Some(verifier) => verifier.matches_enrolled_voice(&samples).await,
                    None => true,
                };
                if let MonitorVerdict::ForceStop(reason) = monitor.observe(&samples, speaker_matches)
                {
                    tracing::info!(?reason, "Monitor force-stopping session");
                    let stopper = Arc::clone(&session);
                    tokio::spawn(async move {
                        if let Err(e) = stopper.stop().await {
                            tracing::error!(error = %e, "Monitor-initiated stop failed");
                        }
                    });
                    return;
                }
            }
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
