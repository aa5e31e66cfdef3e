use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{MurmurError, Result};

/// Top-level configuration for the Murmur application.
///
/// Loaded from `~/.murmur/config.toml` by default. Each section corresponds
/// to a bounded context or cross-cutting concern. Every empirically-tuned
/// timing constant lives here rather than at its call site.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MurmurConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub endpoint: EndpointTuning,
    #[serde(default)]
    pub refinement: RefinementConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
}

impl MurmurConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: MurmurConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| MurmurError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory for history snapshots and the job queue.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.murmur".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Audio capture parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Capture sample rate in Hz.
    pub sample_rate: u32,
    /// Transcription language (empty = auto-detect).
    pub language: String,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            language: String::new(),
        }
    }
}

/// Recording session timing and behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Minimum captured audio before transcription runs; shorter captures
    /// are discarded silently.
    pub min_capture_secs: f64,
    /// Maximum wait for an in-flight partial transcription to settle during
    /// stop, before reading the final buffer anyway.
    pub drain_timeout_ms: u64,
    /// Poll interval for the drain wait.
    pub drain_tick_ms: u64,
    /// Level-metering tick interval (~20 Hz).
    pub level_interval_ms: u64,
    /// Partial-transcription tick interval for streaming mode.
    pub partial_interval_ms: u64,
    /// Whether partial transcriptions run during capture.
    pub streaming: bool,
    /// Whether the refinement pipeline runs after transcription.
    pub refine: bool,
    /// Ordered stage type ids for the post-transcription pipeline.
    pub pipeline: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            min_capture_secs: 0.3,
            drain_timeout_ms: 2_000,
            drain_tick_ms: 50,
            level_interval_ms: 50,
            partial_interval_ms: 1_500,
            streaming: false,
            refine: true,
            pipeline: vec!["normalize".to_string(), "refine".to_string(), "insert_text".to_string()],
        }
    }
}

/// Endpoint-detection and voice-command monitoring tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointTuning {
    /// RMS amplitude above which a window counts as speech.
    pub amplitude_threshold: f32,
    /// Speech shorter than this is ignored as a blip.
    pub min_speech_ms: u64,
    /// Silence hangover before declaring end-of-speech (press-driven).
    pub silence_hangover_ms: u64,
    /// Silence hangover for voice-command sessions (tolerates thinking pauses).
    pub voice_command_hangover_ms: u64,
    /// Endpoint monitoring tick interval.
    pub monitor_interval_ms: u64,
    /// How much recent audio each monitoring tick analyzes.
    pub monitor_window_ms: u64,
    /// Consecutive non-matching-voice frames before force-stop.
    pub verification_failure_frames: u32,
}

impl Default for EndpointTuning {
    fn default() -> Self {
        Self {
            amplitude_threshold: 0.015,
            min_speech_ms: 250,
            silence_hangover_ms: 1_000,
            voice_command_hangover_ms: 3_000,
            monitor_interval_ms: 200,
            monitor_window_ms: 200,
            verification_failure_frames: 5,
        }
    }
}

/// Refinement backend selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefinementConfig {
    /// Backend: "rule" (local) or "chat" (HTTP chat-completion).
    pub backend: String,
    /// Chat-completion endpoint URL.
    pub endpoint: String,
    /// Model name passed to the chat backend.
    pub model: String,
    /// Sampling temperature for the chat backend.
    pub temperature: f32,
}

impl Default for RefinementConfig {
    fn default() -> Self {
        Self {
            backend: "rule".to_string(),
            endpoint: "http://localhost:11434/api/chat".to_string(),
            model: "llama3.2".to_string(),
            temperature: 0.3,
        }
    }
}

/// History retention caps.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Maximum retained transcription entries.
    pub max_transcripts: usize,
    /// Transcription entries older than this many days are purged.
    pub transcript_retention_days: u32,
    /// Maximum retained pipeline execution records.
    pub max_pipeline_records: usize,
    /// Pipeline records older than this many days are purged on load.
    pub pipeline_retention_days: u32,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_transcripts: 50,
            transcript_retention_days: 7,
            max_pipeline_records: 100,
            pipeline_retention_days: 7,
        }
    }
}

/// Background job worker tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    /// Health-check tick that wakes an idle worker with queued work.
    pub health_check_secs: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            health_check_secs: 30,
        }
    }
}
