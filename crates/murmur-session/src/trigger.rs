//! Trigger sources fanned into one start/stop stream.
//!
//! What causes a recording to start (a hotkey, a spoken phrase, future
//! sources) is decoupled from what a recording does: every source pushes
//! [`TriggerEvent`]s into one channel the composition root drains into the
//! recording session.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use murmur_core::types::TriggerKind;
use murmur_core::{MurmurError, Result};

/// One normalized trigger occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerEvent {
    Start(TriggerKind),
    Stop(TriggerKind),
}

/// Channel end handed to sources on activation.
pub type TriggerSink = tokio::sync::mpsc::UnboundedSender<TriggerEvent>;

/// One independent input source (hotkey listener, wake-phrase detector).
#[async_trait]
pub trait TriggerSource: Send + Sync {
    /// Stable identifier used to enable/disable the source.
    fn id(&self) -> &str;

    /// Start listening, pushing events into `sink` until deactivated.
    async fn activate(&self, sink: TriggerSink) -> Result<()>;

    async fn deactivate(&self);
}

struct SourceSlot {
    source: Arc<dyn TriggerSource>,
    enabled: bool,
}

/// Registry and fan-in point for all trigger sources.
pub struct TriggerManager {
    sources: tokio::sync::Mutex<HashMap<String, SourceSlot>>,
    tx: TriggerSink,
    rx: tokio::sync::Mutex<tokio::sync::mpsc::UnboundedReceiver<TriggerEvent>>,
}

impl Default for TriggerManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TriggerManager {
    pub fn new() -> Self {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        Self {
            sources: tokio::sync::Mutex::new(HashMap::new()),
            tx,
            rx: tokio::sync::Mutex::new(rx),
        }
    }

    /// Register a source. Sources start disabled.
    pub async fn register(&self, source: Arc<dyn TriggerSource>) {
        let id = source.id().to_string();
        tracing::debug!(source = %id, "Trigger source registered");
        self.sources
            .lock()
            .await
            .insert(id, SourceSlot { source, enabled: false });
    }

    /// Activate a registered source so its events reach the stream.
    pub async fn enable(&self, id: &str) -> Result<()> {
        let mut sources = self.sources.lock().await;
        let slot = sources
            .get_mut(id)
            .ok_or_else(|| MurmurError::Session(format!("Unknown trigger source: {}", id)))?;
        if slot.enabled {
            return Ok(());
        }
        slot.source.activate(self.tx.clone()).await?;
        slot.enabled = true;
        tracing::info!(source = id, "Trigger source enabled");
        Ok(())
    }

    /// Deactivate a source; already-queued events still drain.
    pub async fn disable(&self, id: &str) -> Result<()> {
        let mut sources = self.sources.lock().await;
        let slot = sources
            .get_mut(id)
            .ok_or_else(|| MurmurError::Session(format!("Unknown trigger source: {}", id)))?;
        if !slot.enabled {
            return Ok(());
        }
        slot.source.deactivate().await;
        slot.enabled = false;
        tracing::info!(source = id, "Trigger source disabled");
        Ok(())
    }

    pub async fn is_enabled(&self, id: &str) -> bool {
        self.sources
            .lock()
            .await
            .get(id)
            .map(|s| s.enabled)
            .unwrap_or(false)
    }

    /// Next trigger event from any enabled source. `None` only if every
    /// sender, including the manager's own, has been dropped.
    pub async fn next_event(&self) -> Option<TriggerEvent> {
        self.rx.lock().await.recv().await
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Source that exposes its sink so tests can fire events manually.
    struct ManualSource {
        id: String,
        kind: TriggerKind,
        sink: Mutex<Option<TriggerSink>>,
    }

    impl ManualSource {
        fn new(id: &str, kind: TriggerKind) -> Arc<Self> {
            Arc::new(Self {
                id: id.to_string(),
                kind,
                sink: Mutex::new(None),
            })
        }

        fn fire_start(&self) {
            if let Some(sink) = self.sink.lock().unwrap().as_ref() {
                sink.send(TriggerEvent::Start(self.kind)).unwrap();
            }
        }

        fn fire_stop(&self) {
            if let Some(sink) = self.sink.lock().unwrap().as_ref() {
                sink.send(TriggerEvent::Stop(self.kind)).unwrap();
            }
        }
    }

    #[async_trait]
    impl TriggerSource for ManualSource {
        fn id(&self) -> &str {
            &self.id
        }

        async fn activate(&self, sink: TriggerSink) -> Result<()> {
            *self.sink.lock().unwrap() = Some(sink);
            Ok(())
        }

        async fn deactivate(&self) {
            *self.sink.lock().unwrap() = None;
        }
    }

    #[tokio::test]
    async fn test_events_from_multiple_sources_fan_in() {
        let manager = TriggerManager::new();
        let hotkey = ManualSource::new("hotkey", TriggerKind::Hotkey);
        let voice = ManualSource::new("voice", TriggerKind::VoiceCommand);
        manager.register(hotkey.clone()).await;
        manager.register(voice.clone()).await;
        manager.enable("hotkey").await.unwrap();
        manager.enable("voice").await.unwrap();

        hotkey.fire_start();
        voice.fire_start();
        hotkey.fire_stop();

        assert_eq!(
            manager.next_event().await,
            Some(TriggerEvent::Start(TriggerKind::Hotkey))
        );
        assert_eq!(
            manager.next_event().await,
            Some(TriggerEvent::Start(TriggerKind::VoiceCommand))
        );
        assert_eq!(
            manager.next_event().await,
            Some(TriggerEvent::Stop(TriggerKind::Hotkey))
        );
    }

    #[tokio::test]
    async fn test_disabled_source_emits_nothing() {
        let manager = TriggerManager::new();
        let hotkey = ManualSource::new("hotkey", TriggerKind::Hotkey);
        manager.register(hotkey.clone()).await;
        manager.enable("hotkey").await.unwrap();
        manager.disable("hotkey").await.unwrap();

        // Deactivated sources lose their sink.
        hotkey.fire_start();
        assert!(!manager.is_enabled("hotkey").await);

        // Nothing queued: a re-enabled fire is the first event seen.
        manager.enable("hotkey").await.unwrap();
        hotkey.fire_stop();
        assert_eq!(
            manager.next_event().await,
            Some(TriggerEvent::Stop(TriggerKind::Hotkey))
        );
    }

    #[tokio::test]
    async fn test_enable_unknown_source_errors() {
        let manager = TriggerManager::new();
        assert!(manager.enable("missing").await.is_err());
        assert!(manager.disable("missing").await.is_err());
    }

    #[tokio::test]
    async fn test_enable_is_idempotent() {
        let manager = TriggerManager::new();
        let hotkey = ManualSource::new("hotkey", TriggerKind::Hotkey);
        manager.register(hotkey.clone()).await;
        manager.enable("hotkey").await.unwrap();
        manager.enable("hotkey").await.unwrap();
        assert!(manager.is_enabled("hotkey").await);
    }
}
