//! Mutual exclusion between the two capture modes.
//!
//! Dictation and meeting capture would otherwise fight over the microphone.
//! A mode is granted only from `None` (first-writer-wins, no preemption or
//! queueing); while dictation holds the microphone, meeting detection is
//! paused and resumed when dictation ends.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use murmur_core::events::{DomainEvent, EventBus};
use murmur_core::types::CaptureMode;
use murmur_core::Timestamp;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::services::MeetingDetector;

pub struct ModeArbiter {
    mode: tokio::sync::Mutex<CaptureMode>,
    /// Set when the system, not the user, switched the UI surface into
    /// meeting mode. Consumed once when the meeting ends.
    auto_switched: AtomicBool,
    detector: Arc<dyn MeetingDetector>,
    events: EventBus,
}

impl ModeArbiter {
    pub fn new(detector: Arc<dyn MeetingDetector>, events: EventBus) -> Self {
        Self {
            mode: tokio::sync::Mutex::new(CaptureMode::None),
            auto_switched: AtomicBool::new(false),
            detector,
            events,
        }
    }

    pub async fn current(&self) -> CaptureMode {
        *self.mode.lock().await
    }

    /// Request the microphone for dictation. Returns whether it was granted.
    pub async fn begin_dictation(&self) -> bool {
        let mut mode = self.mode.lock().await;
        if *mode != CaptureMode::None {
            tracing::info!(occupied_by = %*mode, "Dictation request ignored");
            return false;
        }
        *mode = CaptureMode::Dictation;
        self.detector.pause_detection().await;
        tracing::info!("Dictation owns the microphone, meeting detection paused");
        true
    }

    /// Release the microphone after dictation and resume meeting detection.
    pub async fn end_dictation(&self) {
        let mut mode = self.mode.lock().await;
        if *mode != CaptureMode::Dictation {
            return;
        }
        *mode = CaptureMode::None;
        self.detector.resume_detection().await;
        tracing::info!("Dictation released the microphone, meeting detection resumed");
    }

    /// Request the microphone for a detected meeting. `auto_switched` marks
    /// that the system switched the UI surface for this meeting, so ending
    /// it should revert that switch.
    pub async fn begin_meeting(&self, meeting_id: Uuid, auto_switched: bool) -> bool {
        let mut mode = self.mode.lock().await;
        if *mode != CaptureMode::None {
            tracing::info!(occupied_by = %*mode, %meeting_id, "Meeting request ignored");
            return false;
        }
        *mode = CaptureMode::Meeting;
        if auto_switched {
            self.auto_switched.store(true, Ordering::SeqCst);
        }
        self.events.publish(DomainEvent::MeetingDetected {
            meeting_id,
            timestamp: Timestamp::now(),
        });
        true
    }

    /// End a meeting. Returns whether the UI surface switch should be
    /// auto-reverted (one-shot).
    pub async fn end_meeting(&self, meeting_id: Uuid) -> bool {
        let mut mode = self.mode.lock().await;
        if *mode != CaptureMode::Meeting {
            return false;
        }
        *mode = CaptureMode::None;
        self.events.publish(DomainEvent::MeetingEnded {
            meeting_id,
            timestamp: Timestamp::now(),
        });
        let revert = self.auto_switched.swap(false, Ordering::SeqCst);
        if revert {
            tracing::info!(%meeting_id, "Meeting ended, reverting auto-switched surface");
        }
        revert
    }

    /// Spawn a task that ends dictation whenever a capture ends.
    ///
    /// Not every stop comes from a user trigger: the endpoint monitor
    /// force-stops voice-command sessions internally, and the microphone
    /// must still be released and meeting detection resumed on that path.
    pub fn release_on_capture_end(self: Arc<Self>, events: &EventBus) -> JoinHandle<()> {
        let mut rx = events.subscribe();
        tokio::spawn(async move {
            while let Ok(event) = rx.recv().await {
                if matches!(event, DomainEvent::CaptureEnded { .. }) {
                    self.end_dictation().await;
                }
            }
        })
    }

    /// The user explicitly switched away from the meeting surface; a later
    /// meeting end must not auto-revert over their choice.
    pub fn user_switched_surface(&self) {
        if self.auto_switched.swap(false, Ordering::SeqCst) {
            tracing::debug!("User switch cleared pending auto-revert");
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
