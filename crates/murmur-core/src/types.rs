//! Shared value objects and enumerations for the Murmur system.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Phase of one capture/process cycle.
///
/// Mutated only by the recording session; returns to `Idle` on every path
/// (success, error, fallback).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingState {
    /// No session in progress. Ready to start.
    #[default]
    Idle,
    /// Actively capturing audio from the microphone.
    Recording,
    /// Running final transcription over the captured buffer.
    Transcribing,
    /// Running the text-refinement pipeline over the transcript.
    Refining,
}

impl fmt::Display for RecordingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordingState::Idle => write!(f, "Idle"),
            RecordingState::Recording => write!(f, "Recording"),
            RecordingState::Transcribing => write!(f, "Transcribing"),
            RecordingState::Refining => write!(f, "Refining"),
        }
    }
}

/// Which capture subsystem currently owns the microphone.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMode {
    #[default]
    None,
    Dictation,
    Meeting,
}

impl fmt::Display for CaptureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureMode::None => write!(f, "none"),
            CaptureMode::Dictation => write!(f, "dictation"),
            CaptureMode::Meeting => write!(f, "meeting"),
        }
    }
}

/// What caused a recording to start.
///
/// A voice-command trigger additionally enables endpoint-aware monitoring
/// with speaker verification during the session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    #[default]
    Hotkey,
    VoiceCommand,
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerKind::Hotkey => write!(f, "hotkey"),
            TriggerKind::VoiceCommand => write!(f, "voice_command"),
        }
    }
}

/// Refinement style requested from a refinement backend.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefinementMode {
    /// Light cleanup: punctuation, casing, filler removal.
    #[default]
    Cleanup,
    /// Rewrite into a formal register.
    Formal,
    /// Caller-supplied prompt.
    Custom,
}

/// Unix-seconds timestamp newtype used wherever a compact, ordered
/// timestamp is persisted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now().timestamp())
    }

    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt.timestamp())
    }

    pub fn to_datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.0, 0).unwrap_or_default()
    }

    pub fn age_days(&self) -> u32 {
        let elapsed = Timestamp::now().0 - self.0;
        (elapsed / 86400) as u32
    }
}
