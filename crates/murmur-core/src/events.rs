//! Domain events and the in-process event bus.
//!
//! Events are emitted by the session, the mode arbiter, and the job worker
//! after state changes, and consumed by whatever surface is attached (a UI
//! layer, the CLI, test harnesses). Delivery is synchronous within the
//! process and at-least-once for live subscribers; a lagging subscriber
//! misses events rather than blocking the publisher.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{CaptureMode, Timestamp, TriggerKind};

/// All domain events that can occur in the Murmur system.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[non_exhaustive]
pub enum DomainEvent {
    /// A capture session started.
    CaptureStarted {
        session_id: Uuid,
        mode: CaptureMode,
        trigger: TriggerKind,
        timestamp: Timestamp,
    },

    /// A capture session ended (on every path, including failures).
    CaptureEnded {
        session_id: Uuid,
        duration_secs: f64,
        timestamp: Timestamp,
    },

    /// Transcription of a captured buffer failed.
    TranscriptionFailed {
        session_id: Uuid,
        reason: String,
        timestamp: Timestamp,
    },

    /// A meeting was detected by the meeting-capture subsystem.
    MeetingDetected {
        meeting_id: Uuid,
        timestamp: Timestamp,
    },

    /// A meeting ended.
    MeetingEnded {
        meeting_id: Uuid,
        timestamp: Timestamp,
    },

    /// A background setup job finished (all tasks completed).
    JobCompleted {
        job_id: Uuid,
        name: String,
        timestamp: Timestamp,
    },

    /// A background setup job halted on a failed task.
    JobFailed {
        job_id: Uuid,
        name: String,
        reason: String,
        timestamp: Timestamp,
    },
}

impl DomainEvent {
    /// Returns the timestamp of the event.
    pub fn timestamp(&self) -> Timestamp {
        match self {
            DomainEvent::CaptureStarted { timestamp, .. }
            | DomainEvent::CaptureEnded { timestamp, .. }
            | DomainEvent::TranscriptionFailed { timestamp, .. }
            | DomainEvent::MeetingDetected { timestamp, .. }
            | DomainEvent::MeetingEnded { timestamp, .. }
            | DomainEvent::JobCompleted { timestamp, .. }
            | DomainEvent::JobFailed { timestamp, .. } => *timestamp,
        }
    }

    /// Returns a stable event name for logging and subscriber routing.
    pub fn event_name(&self) -> &'static str {
        match self {
            DomainEvent::CaptureStarted { .. } => "capture_started",
            DomainEvent::CaptureEnded { .. } => "capture_ended",
            DomainEvent::TranscriptionFailed { .. } => "transcription_failed",
            DomainEvent::MeetingDetected { .. } => "meeting_detected",
            DomainEvent::MeetingEnded { .. } => "meeting_ended",
            DomainEvent::JobCompleted { .. } => "job_completed",
            DomainEvent::JobFailed { .. } => "job_failed",
        }
    }
}

/// Broadcast bus carrying [`DomainEvent`]s to any number of subscribers.
///
/// Cloning the bus shares the underlying channel.
#[derive(Clone, Debug)]
pub struct EventBus {
    sender: tokio::sync::broadcast::Sender<DomainEvent>,
}

impl EventBus {
    /// Create a bus with the given buffer capacity per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = tokio::sync::broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event. A bus with no subscribers drops the event silently.
    pub fn publish(&self, event: DomainEvent) {
        let name = event.event_name();
        match self.sender.send(event) {
            Ok(receivers) => tracing::debug!(event = name, receivers, "Event published"),
            Err(_) => tracing::trace!(event = name, "Event published with no subscribers"),
        }
    }

    /// Subscribe to all future events.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<DomainEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_name_and_timestamp() {
        let ts = Timestamp::now();
        let event = DomainEvent::CaptureStarted {
            session_id: Uuid::new_v4(),
            mode: CaptureMode::Dictation,
            trigger: TriggerKind::Hotkey,
            timestamp: ts,
        };
        assert_eq!(event.event_name(), "capture_started");
        assert_eq!(event.timestamp(), ts);
    }

    #[test]
    fn test_event_serialization_round_trip() {
        let event = DomainEvent::JobCompleted {
            job_id: Uuid::new_v4(),
            name: "whisper-base".to_string(),
            timestamp: Timestamp::now(),
        };
        let json = serde_json::to_string(&event).unwrap();
        let rt: DomainEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(rt.event_name(), "job_completed");
        assert_eq!(rt.timestamp(), event.timestamp());
    }

    #[tokio::test]
    async fn test_bus_delivers_to_subscriber() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();

        bus.publish(DomainEvent::MeetingDetected {
            meeting_id: Uuid::new_v4(),
            timestamp: Timestamp::now(),
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_name(), "meeting_detected");
    }

    #[tokio::test]
    async fn test_bus_without_subscribers_does_not_panic() {
        let bus = EventBus::new(8);
        bus.publish(DomainEvent::MeetingEnded {
            meeting_id: Uuid::new_v4(),
            timestamp: Timestamp::now(),
        });
    }

    #[tokio::test]
    async fn test_bus_clone_shares_channel() {
        let bus = EventBus::new(8);
        let bus2 = bus.clone();
        let mut rx = bus.subscribe();

        bus2.publish(DomainEvent::CaptureEnded {
            session_id: Uuid::new_v4(),
            duration_secs: 1.5,
            timestamp: Timestamp::now(),
        });

        assert_eq!(rx.recv().await.unwrap().event_name(), "capture_ended");
    }
}
