//! The durable job queue.
//!
//! Submission is upsert-by-name: while an incomplete job with the same name
//! is queued, a resubmission is dropped; a previously completed or failed
//! job under that name is purged and replaced. The whole list is persisted
//! after every mutation, with `running` tasks normalized to `pending` in
//! the snapshot — an externally-dispatched step is never assumed to have
//! finished across a restart.

use std::sync::{Arc, Mutex};

use murmur_core::store::{KeyValueStore, KeyValueStoreExt};
use tokio::sync::Notify;
use uuid::Uuid;

use crate::error::JobError;
use crate::executor::{ReadinessOracle, ResourceReadiness};
use crate::types::{Job, JobTask, JobTaskStatus, SetupState};

const STORE_KEY: &str = "job_queue";

/// What `submit` did with the offered job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Appended to the queue.
    Queued,
    /// An incomplete job with the same name already exists; dropped.
    DroppedDuplicate,
}

/// Persistent FIFO of setup jobs, shared between submitters and the worker.
pub struct JobQueue {
    store: Arc<dyn KeyValueStore>,
    jobs: Mutex<Vec<Job>>,
    work_available: Notify,
}

impl JobQueue {
    /// Load the queue snapshot, rehydrating any task recorded as `running`
    /// back to `pending`. A missing or undecodable snapshot starts empty.
    pub fn load(store: Arc<dyn KeyValueStore>) -> Result<Self, JobError> {
        let mut jobs: Vec<Job> = store
            .get(STORE_KEY)
            .map_err(|e| JobError::Storage(e.to_string()))?
            .unwrap_or_default();

        let mut rehydrated = 0usize;
        for job in &mut jobs {
            for task in &mut job.tasks {
                if task.status == JobTaskStatus::Running {
                    task.status = JobTaskStatus::Pending;
                    task.progress = 0.0;
                    rehydrated += 1;
                }
            }
        }
        if rehydrated > 0 {
            tracing::info!(rehydrated, "Rehydrated interrupted job tasks to pending");
        }

        Ok(Self {
            store,
            jobs: Mutex::new(jobs),
            work_available: Notify::new(),
        })
    }

    /// Submit a job, upserting by name.
    pub fn submit(&self, job: Job) -> Result<SubmitOutcome, JobError> {
        {
            let mut jobs = self.lock()?;

            if let Some(existing) = jobs.iter().find(|j| j.name == job.name && j.is_incomplete()) {
                tracing::warn!(
                    name = %job.name,
                    existing_id = %existing.id,
                    dropped_id = %job.id,
                    "Incomplete job with this name already queued, dropping submission"
                );
                return Ok(SubmitOutcome::DroppedDuplicate);
            }

            let before = jobs.len();
            jobs.retain(|j| j.name != job.name);
            if jobs.len() != before {
                tracing::info!(name = %job.name, "Purged finished job before resubmission");
            }

            tracing::info!(name = %job.name, id = %job.id, tasks = job.tasks.len(), "Job queued");
            jobs.push(job);
        }
        self.persist()?;
        self.work_available.notify_one();
        Ok(SubmitOutcome::Queued)
    }

    /// Remove a job outright.
    pub fn cancel(&self, job_id: Uuid) -> Result<(), JobError> {
        {
            let mut jobs = self.lock()?;
            let before = jobs.len();
            jobs.retain(|j| j.id != job_id);
            if jobs.len() == before {
                return Err(JobError::NotFound(job_id));
            }
        }
        tracing::info!(id = %job_id, "Job cancelled");
        self.persist()
    }

    /// Reset only the *failed* tasks of a job back to pending, clearing
    /// their error and progress. Completed tasks are untouched.
    pub fn retry(&self, job_id: Uuid) -> Result<(), JobError> {
        {
            let mut jobs = self.lock()?;
            let job = jobs
                .iter_mut()
                .find(|j| j.id == job_id)
                .ok_or(JobError::NotFound(job_id))?;

            let mut reset = 0usize;
            for task in &mut job.tasks {
                if task.status == JobTaskStatus::Failed {
                    task.status = JobTaskStatus::Pending;
                    task.error = None;
                    task.progress = 0.0;
                    task.message.clear();
                    reset += 1;
                }
            }
            tracing::info!(id = %job_id, reset, "Job retry requested");
        }
        self.persist()?;
        self.work_available.notify_one();
        Ok(())
    }

    /// First job that is neither completed nor failed, in queue order.
    pub fn next_incomplete(&self) -> Option<Job> {
        let jobs = self.jobs.lock().ok()?;
        jobs.iter().find(|j| j.is_incomplete()).cloned()
    }

    /// Whether any job still has runnable work.
    pub fn has_incomplete(&self) -> bool {
        self.next_incomplete().is_some()
    }

    pub fn get(&self, job_id: Uuid) -> Result<Job, JobError> {
        let jobs = self.lock()?;
        jobs.iter()
            .find(|j| j.id == job_id)
            .cloned()
            .ok_or(JobError::NotFound(job_id))
    }

    /// Snapshot of all queued jobs.
    pub fn jobs(&self) -> Vec<Job> {
        self.jobs.lock().map(|j| j.clone()).unwrap_or_default()
    }

    /// Apply a mutation to one task and persist the queue.
    ///
    /// Used by the worker to advance task status and progress.
    pub fn update_task(
        &self,
        job_id: Uuid,
        task_index: usize,
        mutate: impl FnOnce(&mut JobTask),
    ) -> Result<(), JobError> {
        {
            let mut jobs = self.lock()?;
            let job = jobs
                .iter_mut()
                .find(|j| j.id == job_id)
                .ok_or(JobError::NotFound(job_id))?;
            let task = job.tasks.get_mut(task_index).ok_or_else(|| {
                JobError::Storage(format!("Task index {} out of range", task_index))
            })?;
            mutate(task);
        }
        self.persist()
    }

    /// Derive the setup state of a resource.
    ///
    /// Queued jobs win over the oracle: a task tagged with the resource
    /// reports setting-up or failed; otherwise the external readiness
    /// oracle decides.
    pub async fn setup_state(
        &self,
        resource: &str,
        oracle: &dyn ReadinessOracle,
    ) -> SetupState {
        let tagged_job = {
            let jobs = match self.jobs.lock() {
                Ok(j) => j,
                Err(_) => return SetupState::SetupRequired,
            };
            jobs.iter()
                .find(|j| j.tasks.iter().any(|t| t.resource() == Some(resource)))
                .cloned()
        };

        if let Some(job) = tagged_job {
            if job.is_failed() {
                return SetupState::Failed(
                    job.failure_reason().unwrap_or_else(|| "setup failed".to_string()),
                );
            }
            if job.is_incomplete() {
                return SetupState::SettingUp(job.progress());
            }
            // Completed job: fall through to the oracle, which should now
            // report the resource ready.
        }

        match oracle.readiness(resource).await {
            ResourceReadiness::Ready => SetupState::Ready,
            ResourceReadiness::SetupRequired => SetupState::SetupRequired,
            ResourceReadiness::NotNeeded => SetupState::NotNeeded,
        }
    }

    /// Wait until new work is submitted or a retry lands.
    pub async fn work_notified(&self) {
        self.work_available.notified().await;
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<Job>>, JobError> {
        self.jobs
            .lock()
            .map_err(|e| JobError::Storage(format!("Queue lock poisoned: {}", e)))
    }

    /// Persist the full queue. `running` is normalized to `pending` in the
    /// snapshot so it can never be observed across a restart.
    fn persist(&self) -> Result<(), JobError> {
        let mut snapshot = {
            let jobs = self.lock()?;
            jobs.clone()
        };
        for job in &mut snapshot {
            for task in &mut job.tasks {
                if task.status == JobTaskStatus::Running {
                    task.status = JobTaskStatus::Pending;
                }
            }
        }
        self.store
            .set(STORE_KEY, &snapshot)
            .map_err(|e| JobError::Storage(e.to_string()))
    }
}
