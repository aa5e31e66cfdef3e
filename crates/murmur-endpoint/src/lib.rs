//! Voice endpoint detection (VAD).
//!
//! Decides, from a rolling audio window, when speech begins and ends. The
//! detector is a pure function of the sample window and explicit bookkeeping
//! state: time is derived from sample counts at a fixed sample rate, so
//! identical inputs always produce identical decisions and no audio hardware
//! or clock is needed to test it.

use std::time::Duration;

use murmur_core::config::EndpointTuning;

/// Detector parameters. These are configuration, not state.
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    /// Sample rate the windows are captured at.
    pub sample_rate: u32,
    /// RMS amplitude above which a window counts as speech.
    pub amplitude_threshold: f32,
    /// Speech bursts shorter than this are ignored as blips.
    pub min_speech: Duration,
    /// Silence hangover before declaring end-of-speech.
    pub silence_hangover: Duration,
}

impl EndpointConfig {
    /// Short-hangover default for press-driven dictation.
    pub fn dictation(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            amplitude_threshold: 0.015,
            min_speech: Duration::from_millis(250),
            silence_hangover: Duration::from_millis(1_000),
        }
    }

    /// Long-hangover variant for voice-command dictation, tolerating
    /// thinking pauses mid-utterance.
    pub fn voice_command(sample_rate: u32) -> Self {
        Self {
            silence_hangover: Duration::from_millis(3_000),
            ..Self::dictation(sample_rate)
        }
    }

    /// Build from the application config section.
    pub fn from_tuning(tuning: &EndpointTuning, sample_rate: u32, long_hangover: bool) -> Self {
        let hangover_ms = if long_hangover {
            tuning.voice_command_hangover_ms
        } else {
            tuning.silence_hangover_ms
        };
        Self {
            sample_rate,
            amplitude_threshold: tuning.amplitude_threshold,
            min_speech: Duration::from_millis(tuning.min_speech_ms),
            silence_hangover: Duration::from_millis(hangover_ms),
        }
    }

    fn duration_to_samples(&self, d: Duration) -> u64 {
        (d.as_secs_f64() * self.sample_rate as f64) as u64
    }

    fn samples_to_duration(&self, n: u64) -> Duration {
        Duration::from_secs_f64(n as f64 / self.sample_rate as f64)
    }
}

/// Rolling bookkeeping mutated on every analysis tick.
///
/// Reset at session start, discarded at session end.
#[derive(Debug, Clone, Default)]
pub struct EndpointState {
    /// Whether confirmed speech (longer than the blip threshold) is ongoing.
    pub speaking: bool,
    /// Sample index where the current speech burst began.
    pub speech_start_index: Option<u64>,
    /// Sample index where the current silence run began.
    pub silence_start_index: Option<u64>,
    /// Total samples seen so far.
    pub total_samples: u64,
}

impl EndpointState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Outcome of one analysis tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EndpointDecision {
    /// Confirmed speech is ongoing.
    Speaking,
    /// No confirmed speech; silence has lasted this long.
    Silence { since: Duration },
    /// Speech occurred and has now been followed by a full silence hangover.
    SpeechEnded,
}

/// Analyze one window of samples against the current state.
///
/// Deterministic and side-effect-free apart from mutating `state`: feeding
/// the same windows through a fresh state always yields the same decisions.
pub fn analyze(
    samples: &[f32],
    state: &mut EndpointState,
    config: &EndpointConfig,
) -> EndpointDecision {
    let window_start = state.total_samples;
    state.total_samples += samples.len() as u64;

    let loud = rms(samples) >= config.amplitude_threshold;

    if loud {
        state.silence_start_index = None;
        let start = *state.speech_start_index.get_or_insert(window_start);

        if !state.speaking {
            let burst = state.total_samples.saturating_sub(start);
            if burst >= config.duration_to_samples(config.min_speech) {
                tracing::debug!(at_samples = state.total_samples, "Speech confirmed");
                state.speaking = true;
            }
        }

        if state.speaking {
            return EndpointDecision::Speaking;
        }
        // Burst not yet long enough to count as speech.
        return EndpointDecision::Silence {
            since: Duration::ZERO,
        };
    }

    // Quiet window.
    let silence_start = *state.silence_start_index.get_or_insert(window_start);
    let silence = state.total_samples.saturating_sub(silence_start);

    if !state.speaking {
        // A blip followed by silence never counted as speech.
        state.speech_start_index = None;
        return EndpointDecision::Silence {
            since: config.samples_to_duration(silence),
        };
    }

    if silence >= config.duration_to_samples(config.silence_hangover) {
        tracing::debug!(
            silence_ms = config.samples_to_duration(silence).as_millis() as u64,
            "Speech ended"
        );
        return EndpointDecision::SpeechEnded;
    }

    EndpointDecision::Silence {
        since: config.samples_to_duration(silence),
    }
}

/// Root-mean-square amplitude of a sample window.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f32 = samples.iter().map(|s| s * s).sum();
    (sum / samples.len() as f32).sqrt()
}
