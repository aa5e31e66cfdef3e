//! Capped, persisted history of pipeline execution records.
//!
//! The full record list is snapshotted to the key-value store after every
//! append. On load, entries past the retention window are purged.

use std::sync::{Arc, Mutex};

use murmur_core::store::{KeyValueStore, KeyValueStoreExt};

use crate::error::PipelineError;
use crate::types::PipelineExecutionRecord;

const STORE_KEY: &str = "pipeline_records";

/// Bounded execution-record history backed by a key-value store.
pub struct RecordHistory {
    store: Arc<dyn KeyValueStore>,
    max_records: usize,
    retention_days: u32,
    records: Mutex<Vec<PipelineExecutionRecord>>,
}

impl RecordHistory {
    /// Load history from the store, purging entries older than
    /// `retention_days`. A missing or undecodable snapshot starts empty.
    pub fn load(
        store: Arc<dyn KeyValueStore>,
        max_records: usize,
        retention_days: u32,
    ) -> Result<Self, PipelineError> {
        let mut records: Vec<PipelineExecutionRecord> = store
            .get(STORE_KEY)
            .map_err(|e| PipelineError::Storage(e.to_string()))?
            .unwrap_or_default();

        let before = records.len();
        records.retain(|r| r.timestamp.age_days() < retention_days);
        if records.len() != before {
            tracing::info!(
                purged = before - records.len(),
                retention_days,
                "Purged expired pipeline records"
            );
        }

        Ok(Self {
            store,
            max_records,
            retention_days,
            records: Mutex::new(records),
        })
    }

    /// Append a record, dropping the oldest beyond the cap, and persist.
    pub fn append(&self, record: PipelineExecutionRecord) -> Result<(), PipelineError> {
        let snapshot = {
            let mut records = self
                .records
                .lock()
                .map_err(|e| PipelineError::Storage(format!("History lock poisoned: {}", e)))?;
            records.push(record);
            let len = records.len();
            if len > self.max_records {
                records.drain(0..len - self.max_records);
            }
            records.clone()
        };
        self.store
            .set(STORE_KEY, &snapshot)
            .map_err(|e| PipelineError::Storage(e.to_string()))
    }

    /// Records most-recent-first.
    pub fn recent(&self, limit: usize) -> Vec<PipelineExecutionRecord> {
        let records = match self.records.lock() {
            Ok(r) => r,
            Err(_) => return vec![],
        };
        records.iter().rev().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Retention window in days, for diagnostics.
    pub fn retention_days(&self) -> u32 {
        self.retention_days
    }
}
