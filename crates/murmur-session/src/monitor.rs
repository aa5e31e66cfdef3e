//! Endpoint-aware monitoring for voice-command sessions.
//!
//! Every monitoring tick pulls the most recent window of samples and feeds
//! it to the endpoint detector (with the long thinking-pause hangover) and
//! to the speaker verifier. Enough silence, or enough consecutive frames of
//! a voice that is not the enrolled speaker, force-stops the session.
//!
//! The per-frame decision logic is synchronous and clock-free so it can be
//! tested without timers or audio hardware; the session drives it from a
//! `tokio::time::interval` loop.

use murmur_endpoint::{analyze, EndpointConfig, EndpointDecision, EndpointState};

/// Why the monitor decided to end the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The endpoint detector declared end-of-speech.
    SpeechEnded,
    /// The captured voice stopped matching the enrolled speaker.
    SpeakerMismatch,
}

/// Outcome of one monitoring frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorVerdict {
    Continue,
    ForceStop(StopReason),
}

/// Rolling monitor state for one voice-command session.
pub struct EndpointMonitor {
    config: EndpointConfig,
    state: EndpointState,
    failure_threshold: u32,
    consecutive_failures: u32,
}

impl EndpointMonitor {
    pub fn new(config: EndpointConfig, failure_threshold: u32) -> Self {
        Self {
            config,
            state: EndpointState::new(),
            failure_threshold,
            consecutive_failures: 0,
        }
    }

    /// Feed one frame of recent samples plus the verifier's judgment of it.
    pub fn observe(&mut self, samples: &[f32], speaker_matches: bool) -> MonitorVerdict {
        if speaker_matches {
            self.consecutive_failures = 0;
        } else {
            self.consecutive_failures += 1;
            if self.consecutive_failures >= self.failure_threshold {
                tracing::info!(
                    frames = self.consecutive_failures,
                    "Speaker verification failed, stopping session"
                );
                return MonitorVerdict::ForceStop(StopReason::SpeakerMismatch);
            }
        }

        match analyze(samples, &mut self.state, &self.config) {
            EndpointDecision::SpeechEnded => {
                tracing::info!("End of speech detected, stopping session");
                MonitorVerdict::ForceStop(StopReason::SpeechEnded)
            }
            EndpointDecision::Speaking | EndpointDecision::Silence { .. } => {
                MonitorVerdict::Continue
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: u32 = 16_000;

    fn monitor() -> EndpointMonitor {
        EndpointMonitor::new(EndpointConfig::voice_command(SAMPLE_RATE), 5)
    }

    /// 200 ms of loud or quiet samples, one monitoring window.
    fn frame(loud: bool) -> Vec<f32> {
        let amplitude = if loud { 0.5 } else { 0.001 };
        vec![amplitude; (SAMPLE_RATE / 5) as usize]
    }

    #[test]
    fn test_five_consecutive_mismatches_force_stop() {
        let mut m = monitor();
        for _ in 0..4 {
            assert_eq!(m.observe(&frame(true), false), MonitorVerdict::Continue);
        }
        assert_eq!(
            m.observe(&frame(true), false),
            MonitorVerdict::ForceStop(StopReason::SpeakerMismatch)
        );
    }

    #[test]
    fn test_match_resets_mismatch_streak() {
        let mut m = monitor();
        for _ in 0..4 {
            m.observe(&frame(true), false);
        }
        // A matching frame breaks the streak.
        assert_eq!(m.observe(&frame(true), true), MonitorVerdict::Continue);
        for _ in 0..4 {
            assert_eq!(m.observe(&frame(true), false), MonitorVerdict::Continue);
        }
    }

    #[test]
    fn test_silence_after_speech_ends_session() {
        let mut m = monitor();
        // 1 s of speech.
        for _ in 0..5 {
            assert_eq!(m.observe(&frame(true), true), MonitorVerdict::Continue);
        }
        // 3 s hangover: stop fires once silence exceeds it.
        let mut verdict = MonitorVerdict::Continue;
        for _ in 0..20 {
            verdict = m.observe(&frame(false), true);
            if verdict != MonitorVerdict::Continue {
                break;
            }
        }
        assert_eq!(verdict, MonitorVerdict::ForceStop(StopReason::SpeechEnded));
    }

    #[test]
    fn test_silence_without_speech_keeps_waiting() {
        let mut m = monitor();
        for _ in 0..30 {
            assert_eq!(m.observe(&frame(false), true), MonitorVerdict::Continue);
        }
    }
}
