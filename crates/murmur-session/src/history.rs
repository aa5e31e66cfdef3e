//! Capped, persisted transcription history.
//!
//! Mirrors the pipeline record history: the full list is snapshotted after
//! every mutation, the cap drops the oldest entries, and the retention
//! window is enforced both on insert and on load.

use std::sync::{Arc, Mutex};

use murmur_core::config::HistoryConfig;
use murmur_core::store::{KeyValueStore, KeyValueStoreExt};
use murmur_core::{MurmurError, Result, Timestamp};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const STORE_KEY: &str = "transcripts";

/// One finished dictation outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub id: Uuid,
    pub text: String,
    /// Captured audio length in seconds.
    pub duration_secs: f64,
    pub language: String,
    pub created_at: Timestamp,
}

impl TranscriptEntry {
    pub fn new(text: impl Into<String>, duration_secs: f64, language: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            duration_secs,
            language: language.into(),
            created_at: Timestamp::now(),
        }
    }
}

/// Bounded transcription history backed by the key-value store.
pub struct TranscriptHistory {
    store: Arc<dyn KeyValueStore>,
    max_entries: usize,
    retention_days: u32,
    entries: Mutex<Vec<TranscriptEntry>>,
}

impl TranscriptHistory {
    /// Load history, purging entries past the retention window. A missing or
    /// undecodable snapshot starts empty.
    pub fn load(store: Arc<dyn KeyValueStore>, config: &HistoryConfig) -> Result<Self> {
        let mut entries: Vec<TranscriptEntry> = store.get(STORE_KEY)?.unwrap_or_default();

        let before = entries.len();
        entries.retain(|e| e.created_at.age_days() < config.transcript_retention_days);
        if entries.len() != before {
            tracing::info!(
                purged = before - entries.len(),
                retention_days = config.transcript_retention_days,
                "Purged expired transcripts"
            );
        }

        Ok(Self {
            store,
            max_entries: config.max_transcripts,
            retention_days: config.transcript_retention_days,
            entries: Mutex::new(entries),
        })
    }

    /// Append an entry, enforcing retention and the cap, and persist.
    pub fn append(&self, entry: TranscriptEntry) -> Result<()> {
        let snapshot = {
            let mut entries = self.lock()?;
            entries.retain(|e| e.created_at.age_days() < self.retention_days);
            entries.push(entry);
            let len = entries.len();
            if len > self.max_entries {
                entries.drain(0..len - self.max_entries);
            }
            entries.clone()
        };
        self.store.set(STORE_KEY, &snapshot)
    }

    /// Entries most-recent-first.
    pub fn recent(&self, limit: usize) -> Vec<TranscriptEntry> {
        let entries = match self.entries.lock() {
            Ok(e) => e,
            Err(_) => return vec![],
        };
        entries.iter().rev().take(limit).cloned().collect()
    }

    /// Case-insensitive substring search, most-recent-first.
    pub fn search(&self, query: &str) -> Vec<TranscriptEntry> {
        let needle = query.to_lowercase();
        let entries = match self.entries.lock() {
            Ok(e) => e,
            Err(_) => return vec![],
        };
        entries
            .iter()
            .rev()
            .filter(|e| e.text.to_lowercase().contains(&needle))
            .cloned()
            .collect()
    }

    /// Drop everything, in memory and on disk.
    pub fn clear(&self) -> Result<()> {
        self.lock()?.clear();
        self.store.set(STORE_KEY, &Vec::<TranscriptEntry>::new())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<TranscriptEntry>>> {
        self.entries
            .lock()
            .map_err(|e| MurmurError::Persistence(format!("History lock poisoned: {}", e)))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use murmur_core::store::MemoryStore;

    fn history(store: Arc<dyn KeyValueStore>) -> TranscriptHistory {
        TranscriptHistory::load(store, &HistoryConfig::default()).unwrap()
    }

    #[test]
    fn test_cap_keeps_most_recent_fifty() {
        let h = history(Arc::new(MemoryStore::new()));
        for i in 0..60 {
            h.append(TranscriptEntry::new(format!("entry {}", i), 1.0, "en"))
                .unwrap();
        }
        assert_eq!(h.len(), 50);
        let recent = h.recent(50);
        assert_eq!(recent[0].text, "entry 59");
        assert_eq!(recent[49].text, "entry 10");
    }

    #[test]
    fn test_load_purges_expired_entries() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        {
            let h = history(Arc::clone(&store));
            let mut old = TranscriptEntry::new("old", 1.0, "en");
            old.created_at = Timestamp(Timestamp::now().0 - 8 * 86400);
            h.append(old).unwrap();
            h.append(TranscriptEntry::new("fresh", 1.0, "en")).unwrap();
        }

        let reloaded = history(store);
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.recent(10)[0].text, "fresh");
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let h = history(Arc::new(MemoryStore::new()));
        h.append(TranscriptEntry::new("Meeting notes for Monday", 2.0, "en"))
            .unwrap();
        h.append(TranscriptEntry::new("grocery list", 1.0, "en"))
            .unwrap();

        let hits = h.search("meeting");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "Meeting notes for Monday");
        assert!(h.search("nothing").is_empty());
    }

    #[test]
    fn test_clear_empties_store_too() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let h = history(Arc::clone(&store));
        h.append(TranscriptEntry::new("x", 1.0, "en")).unwrap();
        h.clear().unwrap();
        assert!(h.is_empty());

        let reloaded = history(store);
        assert!(reloaded.is_empty());
    }

    #[test]
    fn test_persists_across_instances() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        {
            let h = history(Arc::clone(&store));
            h.append(TranscriptEntry::new("kept", 1.5, "de")).unwrap();
        }
        let reloaded = history(store);
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.recent(1)[0].language, "de");
    }
}
