//! Recording state machine with thread-safe, validated transitions.
//!
//! Lifecycle of one capture/process cycle:
//! - Idle -> Recording (capture started)
//! - Recording -> Transcribing (capture stopped, final transcription)
//! - Transcribing -> Refining (transcript handed to the pipeline)
//! - Refining -> Idle (cycle complete)
//! - Recording -> Idle (cancel / capture failure)
//! - Transcribing -> Idle (short capture, empty or failed transcript,
//!   refinement disabled)

use std::sync::{Arc, Mutex};

use murmur_core::types::RecordingState;
use murmur_core::MurmurError;

/// Returns whether a transition between two recording states is valid.
fn can_transition(from: RecordingState, to: RecordingState) -> bool {
    use RecordingState::*;
    matches!(
        (from, to),
        (Idle, Recording)
            | (Recording, Transcribing)
            | (Transcribing, Refining)
            | (Refining, Idle)
            // Early exits back to Idle
            | (Recording, Idle)
            | (Transcribing, Idle)
    )
}

/// Thread-safe state machine for the recording lifecycle.
///
/// Wraps [`RecordingState`] in an `Arc<Mutex<>>` so session internals and
/// observers share one view. Transitions are validated before being applied.
#[derive(Debug, Clone)]
pub struct StateMachine {
    state: Arc<Mutex<RecordingState>>,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    /// Create a new state machine initialized to `Idle`.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(RecordingState::Idle)),
        }
    }

    /// Returns the current state.
    pub fn current(&self) -> RecordingState {
        *self.state.lock().expect("state mutex poisoned")
    }

    /// Attempt to transition to the target state.
    pub fn transition(&self, target: RecordingState) -> Result<(), MurmurError> {
        let mut state = self.state.lock().expect("state mutex poisoned");
        if can_transition(*state, target) {
            tracing::debug!("Recording state: {} -> {}", *state, target);
            *state = target;
            Ok(())
        } else {
            Err(MurmurError::Session(format!(
                "Invalid state transition: {} -> {}",
                *state, target
            )))
        }
    }

    /// Force the state machine back to Idle (error recovery).
    pub fn reset(&self) {
        let mut state = self.state.lock().expect("state mutex poisoned");
        if *state != RecordingState::Idle {
            tracing::warn!("Recording state machine reset to Idle from {}", *state);
        }
        *state = RecordingState::Idle;
    }
}

// =============================================================================
// Tests
// =============================================================================
