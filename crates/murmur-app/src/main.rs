//! Murmur application binary - composition root.
//!
//! Ties the crates together into a single executable:
//! 1. Load configuration from TOML
//! 2. Open the JSON key-value store and the capped histories
//! 3. Register pipeline stages (normalize -> refine -> insert_text)
//! 4. Start the background job worker
//! 5. Wire the mode arbiter, recording session, and trigger fan-in
//!
//! Every shared coordinator is constructed exactly once here and injected;
//! there are no process-wide singletons.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use clap::Parser;
use murmur_core::config::MurmurConfig;
use murmur_core::events::EventBus;
use murmur_core::store::{JsonFileStore, KeyValueStore};
use murmur_core::types::TriggerKind;
use murmur_core::Result as MurmurResult;
use murmur_jobs::executor::LogNotifier as JobLogNotifier;
use murmur_jobs::{JobQueue, JobWorker};
use murmur_pipeline::{NormalizeStage, RecordHistory, StageRegistry};
use murmur_session::{
    ChatRefiner, InsertTextStage, LogNotifier, ModeArbiter, RecordingSession, RefineStage,
    RefinementService, RuleRefiner, TextInserter, TranscriptHistory, TriggerEvent, TriggerManager,
    TriggerSink, TriggerSource,
};

mod adapters;
mod cli;

use adapters::{
    FileReadinessOracle, ImmediateExecutor, NoopMeetingDetector, SilenceCapture, StdoutInserter,
    UnconfiguredTranscriber,
};

/// Trigger source reading commands from stdin: `start`, `voice`, `stop`.
struct StdinTriggerSource {
    active: Arc<AtomicBool>,
}

impl StdinTriggerSource {
    fn new() -> Self {
        Self {
            active: Arc::new(AtomicBool::new(false)),
        }
    }
}

#[async_trait]
impl TriggerSource for StdinTriggerSource {
    fn id(&self) -> &str {
        "stdin"
    }

    async fn activate(&self, sink: TriggerSink) -> MurmurResult<()> {
        self.active.store(true, Ordering::SeqCst);
        let active = Arc::clone(&self.active);
        // Blocking stdin reads live on a plain thread.
        std::thread::spawn(move || {
            let stdin = std::io::stdin();
            let mut line = String::new();
            loop {
                line.clear();
                if stdin.read_line(&mut line).unwrap_or(0) == 0 {
                    return;
                }
                if !active.load(Ordering::SeqCst) {
                    return;
                }
                let event = match line.trim() {
                    "start" => TriggerEvent::Start(TriggerKind::Hotkey),
                    "voice" => TriggerEvent::Start(TriggerKind::VoiceCommand),
                    "stop" => TriggerEvent::Stop(TriggerKind::Hotkey),
                    "" => continue,
                    other => {
                        tracing::warn!(input = other, "Unknown command (start | voice | stop)");
                        continue;
                    }
                };
                if sink.send(event).is_err() {
                    return;
                }
            }
        });
        Ok(())
    }

    async fn deactivate(&self) {
        self.active.store(false, Ordering::SeqCst);
    }
}

/// Expand ~ to home directory in a path string.
fn resolve_data_dir(data_dir: &str) -> PathBuf {
    if data_dir.starts_with("~/") || data_dir.starts_with("~\\") {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(&data_dir[2..])
    } else {
        PathBuf::from(data_dir)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = cli::CliArgs::parse();

    // Config, with CLI overrides.
    let config_file = args.resolve_config_path();
    let mut config = MurmurConfig::load_or_default(&config_file);
    if let Some(dir) = args.resolve_data_dir() {
        config.general.data_dir = dir;
    }
    if let Some(level) = args.resolve_log_level() {
        config.general.log_level = level;
    }
    if let Some(language) = args.language.clone() {
        config.audio.language = language;
    }

    // Tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.general.log_level.clone())),
        )
        .init();

    tracing::info!("Starting Murmur v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration loaded");

    // Persistence.
    let data_dir = resolve_data_dir(&config.general.data_dir);
    let store: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::new(&data_dir)?);
    tracing::info!(path = %data_dir.display(), "Key-value store opened");

    let events = EventBus::default();

    let records = Arc::new(RecordHistory::load(
        Arc::clone(&store),
        config.history.max_pipeline_records,
        config.history.pipeline_retention_days,
    )?);
    let history = Arc::new(TranscriptHistory::load(Arc::clone(&store), &config.history)?);

    // Collaborators. Platform backends replace these adapters when linked.
    let capture = Arc::new(SilenceCapture::new(config.audio.sample_rate));
    let inserter: Arc<dyn TextInserter> = Arc::new(StdoutInserter);
    let refiner: Arc<dyn RefinementService> = match config.refinement.backend.as_str() {
        "chat" => Arc::new(ChatRefiner::new(&config.refinement)),
        _ => Arc::new(RuleRefiner),
    };
    tracing::info!(backend = %config.refinement.backend, "Refinement backend selected");

    // Pipeline stage registry.
    let mut registry = StageRegistry::new();
    registry.register(Arc::new(NormalizeStage));
    registry.register(Arc::new(RefineStage::new(refiner)));
    registry.register(Arc::new(InsertTextStage::new(Arc::clone(&inserter))));
    let registry = Arc::new(registry);

    // Background job worker.
    let queue = Arc::new(JobQueue::load(Arc::clone(&store))?);
    let oracle = FileReadinessOracle {
        models_dir: data_dir.join("models"),
    };
    let worker = Arc::new(JobWorker::new(
        Arc::clone(&queue),
        Arc::new(ImmediateExecutor),
        Arc::new(JobLogNotifier),
        events.clone(),
        config.jobs.health_check_secs,
    ));
    let worker_shutdown = worker.shutdown_handle();
    let worker_handle = {
        let worker = Arc::clone(&worker);
        tokio::spawn(async move { worker.run().await })
    };

    // Session and coordinators.
    let language = config.audio.language.clone();
    let arbiter = Arc::new(ModeArbiter::new(Arc::new(NoopMeetingDetector), events.clone()));
    // Monitor-initiated stops bypass the trigger loop; the capture_ended
    // event is the one signal covering every stop path.
    Arc::clone(&arbiter).release_on_capture_end(&events);
    let session = RecordingSession::new(
        config.clone(),
        registry,
        capture,
        Arc::new(UnconfiguredTranscriber),
        inserter,
        None,
        records,
        history,
        events.clone(),
        Arc::new(LogNotifier),
    );

    let triggers = TriggerManager::new();
    triggers.register(Arc::new(StdinTriggerSource::new())).await;
    triggers.enable("stdin").await?;

    // Log every domain event for observability.
    let mut event_rx = events.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = event_rx.recv().await {
            tracing::info!(event = event.event_name(), "Domain event");
        }
    });

    let model_state = queue.setup_state(&config.refinement.model, &oracle).await;
    tracing::info!(model = %config.refinement.model, state = ?model_state, "Model setup state");

    tracing::info!("Ready. Commands: start | voice | stop (Ctrl-C to exit)");

    loop {
        tokio::select! {
            maybe_event = triggers.next_event() => {
                match maybe_event {
                    Some(TriggerEvent::Start(kind)) => {
                        if arbiter.begin_dictation().await {
                            if let Err(e) = session.start(kind, &language).await {
                                tracing::error!(error = %e, "Failed to start session");
                                arbiter.end_dictation().await;
                            }
                        }
                    }
                    Some(TriggerEvent::Stop(_)) => {
                        if let Err(e) = session.stop().await {
                            tracing::error!(error = %e, "Session stop failed");
                        }
                        arbiter.end_dictation().await;
                    }
                    None => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                break;
            }
        }
    }

    let _ = session.stop().await;
    worker_shutdown.notify_one();
    worker_handle.await?;
    Ok(())
}
