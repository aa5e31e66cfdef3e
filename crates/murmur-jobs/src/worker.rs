//! Single background worker draining the job queue.
//!
//! Tasks within a job run strictly in order. A task failure halts its job
//! and the worker moves on to the next incomplete job; the halted job stays
//! in the queue for retry. The loop sleeps on the queue's wake notification
//! with a periodic health-check tick as a safety net.

use std::sync::Arc;
use std::time::Duration;

use murmur_core::events::{DomainEvent, EventBus};
use murmur_core::Timestamp;
use tokio::sync::Notify;

use crate::executor::{JobNotifier, TaskExecutor};
use crate::queue::JobQueue;
use crate::types::{Job, JobTaskStatus};

pub struct JobWorker {
    queue: Arc<JobQueue>,
    executor: Arc<dyn TaskExecutor>,
    notifier: Arc<dyn JobNotifier>,
    events: EventBus,
    shutdown: Arc<Notify>,
    health_check: Duration,
}

impl JobWorker {
    pub fn new(
        queue: Arc<JobQueue>,
        executor: Arc<dyn TaskExecutor>,
        notifier: Arc<dyn JobNotifier>,
        events: EventBus,
        health_check_secs: u64,
    ) -> Self {
        Self {
            queue,
            executor,
            notifier,
            events,
            shutdown: Arc::new(Notify::new()),
            health_check: Duration::from_secs(health_check_secs),
        }
    }

    /// Handle used to stop the worker loop.
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        Arc::clone(&self.shutdown)
    }

    /// Run until shut down. Intended to be spawned onto the runtime.
    pub async fn run(&self) {
        tracing::info!("Job worker started");
        loop {
            while let Some(job) = self.queue.next_incomplete() {
                self.run_job(&job).await;
            }

            tokio::select! {
                _ = self.queue.work_notified() => {
                    tracing::debug!("Job worker woken by queue");
                }
                _ = tokio::time::sleep(self.health_check) => {
                    tracing::trace!("Job worker health check");
                }
                _ = self.shutdown.notified() => {
                    tracing::info!("Job worker shutting down");
                    return;
                }
            }
        }
    }

    /// Run one job's tasks in order until done or a task fails.
    async fn run_job(&self, job: &Job) {
        tracing::info!(id = %job.id, name = %job.name, "Running job");

        for index in 0..job.tasks.len() {
            // Re-read per step so a concurrent cancel halts the job.
            let current = match self.queue.get(job.id) {
                Ok(j) => j,
                Err(_) => {
                    tracing::info!(id = %job.id, "Job removed mid-run, halting");
                    return;
                }
            };
            if current.is_failed() {
                break;
            }
            let task = current.tasks[index].clone();
            if task.status == JobTaskStatus::Completed {
                continue;
            }

            if let Err(e) = self.queue.update_task(job.id, index, |t| {
                t.status = JobTaskStatus::Running;
            }) {
                // Fail the job rather than leave it incomplete: the outer
                // loop would otherwise reselect it immediately and spin
                // against a store that keeps rejecting writes.
                tracing::error!(id = %job.id, error = %e, "Failed to persist task start, failing job");
                let reason = format!("Could not persist task start: {}", e);
                let _ = self.queue.update_task(job.id, index, |t| {
                    t.status = JobTaskStatus::Failed;
                    t.error = Some(reason.clone());
                });
                break;
            }

            let queue = &self.queue;
            let job_id = job.id;
            let progress = move |p: f32| {
                let _ = queue.update_task(job_id, index, |t| {
                    t.progress = p.clamp(0.0, 1.0);
                });
            };

            match self.executor.execute(&task, &progress).await {
                Ok(()) => {
                    let _ = self.queue.update_task(job.id, index, |t| {
                        t.status = JobTaskStatus::Completed;
                        t.progress = 1.0;
                        t.error = None;
                    });
                    tracing::info!(id = %job.id, kind = %task.kind, "Task completed");
                }
                Err(e) => {
                    let reason = e.to_string();
                    let _ = self.queue.update_task(job.id, index, |t| {
                        t.status = JobTaskStatus::Failed;
                        t.error = Some(reason.clone());
                    });
                    tracing::error!(
                        id = %job.id,
                        kind = %task.kind,
                        error = %reason,
                        "Task failed, halting job"
                    );
                    break;
                }
            }
        }

        let finished = match self.queue.get(job.id) {
            Ok(j) => j,
            Err(_) => return,
        };
        if finished.is_completed() {
            self.events.publish(DomainEvent::JobCompleted {
                job_id: finished.id,
                name: finished.name.clone(),
                timestamp: Timestamp::now(),
            });
            self.notifier
                .notify("Setup complete", &format!("{} is ready to use", finished.name));
        } else if finished.is_failed() {
            let reason = finished
                .failure_reason()
                .unwrap_or_else(|| "unknown error".to_string());
            self.events.publish(DomainEvent::JobFailed {
                job_id: finished.id,
                name: finished.name.clone(),
                reason: reason.clone(),
                timestamp: Timestamp::now(),
            });
            self.notifier
                .notify("Setup failed", &format!("{}: {}", finished.name, reason));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::JobError;
    use crate::executor::{LogNotifier, ProgressFn};
    use crate::types::{JobTask, JobTaskKind};
    use async_trait::async_trait;
    use murmur_core::store::{KeyValueStore, MemoryStore};
    use murmur_core::MurmurError;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Executor that fails the compile step a configurable number of times.
    struct FlakyExecutor {
        compile_failures_left: AtomicUsize,
        download_runs: AtomicUsize,
    }

    impl FlakyExecutor {
        fn new(compile_failures: usize) -> Self {
            Self {
                compile_failures_left: AtomicUsize::new(compile_failures),
                download_runs: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl TaskExecutor for FlakyExecutor {
        async fn execute(&self, task: &JobTask, progress: ProgressFn<'_>) -> Result<(), JobError> {
            progress(0.5);
            match task.kind {
                JobTaskKind::Download => {
                    self.download_runs.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
                JobTaskKind::Compile => {
                    if self
                        .compile_failures_left
                        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                        .is_ok()
                    {
                        Err(JobError::Task {
                            kind: task.kind.to_string(),
                            message: "simulated compile failure".to_string(),
                        })
                    } else {
                        Ok(())
                    }
                }
                JobTaskKind::Activate => Ok(()),
            }
        }
    }

    fn two_step_job(name: &str) -> Job {
        Job::new(
            name,
            "icon",
            vec![
                JobTask::new(JobTaskKind::Download),
                JobTask::new(JobTaskKind::Compile),
            ],
        )
    }

    fn spawn_worker(
        queue: Arc<JobQueue>,
        executor: Arc<dyn TaskExecutor>,
        events: EventBus,
    ) -> (Arc<Notify>, tokio::task::JoinHandle<()>) {
        let worker = Arc::new(JobWorker::new(
            queue,
            executor,
            Arc::new(LogNotifier),
            events,
            30,
        ));
        let shutdown = worker.shutdown_handle();
        let handle = tokio::spawn(async move { worker.run().await });
        (shutdown, handle)
    }

    async fn next_event(
        rx: &mut tokio::sync::broadcast::Receiver<DomainEvent>,
    ) -> DomainEvent {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed")
    }

    // ==================== Worker behavior ====================

    #[tokio::test]
    async fn test_worker_completes_job_and_publishes_event() {
        let queue = Arc::new(JobQueue::load(Arc::new(MemoryStore::new())).unwrap());
        let events = EventBus::default();
        let mut rx = events.subscribe();
        let (shutdown, handle) =
            spawn_worker(Arc::clone(&queue), Arc::new(FlakyExecutor::new(0)), events);

        queue.submit(two_step_job("whisper-base")).unwrap();

        match next_event(&mut rx).await {
            DomainEvent::JobCompleted { name, .. } => assert_eq!(name, "whisper-base"),
            other => panic!("expected JobCompleted, got {:?}", other.event_name()),
        }
        let job = &queue.jobs()[0];
        assert!(job.is_completed());
        assert!((job.progress() - 1.0).abs() < 1e-6);

        shutdown.notify_one();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_task_failure_halts_job_but_not_queue() {
        let queue = Arc::new(JobQueue::load(Arc::new(MemoryStore::new())).unwrap());
        let events = EventBus::default();
        let mut rx = events.subscribe();
        let (shutdown, handle) =
            spawn_worker(Arc::clone(&queue), Arc::new(FlakyExecutor::new(usize::MAX)), events);

        queue.submit(two_step_job("broken")).unwrap();
        queue
            .submit(Job::new(
                "fine",
                "icon",
                vec![JobTask::new(JobTaskKind::Download)],
            ))
            .unwrap();

        let mut saw_failed = false;
        let mut saw_completed = false;
        for _ in 0..2 {
            match next_event(&mut rx).await {
                DomainEvent::JobFailed { name, reason, .. } => {
                    assert_eq!(name, "broken");
                    assert!(reason.contains("simulated compile failure"));
                    saw_failed = true;
                }
                DomainEvent::JobCompleted { name, .. } => {
                    assert_eq!(name, "fine");
                    saw_completed = true;
                }
                other => panic!("unexpected event {:?}", other.event_name()),
            }
        }
        assert!(saw_failed && saw_completed);

        let broken = queue
            .jobs()
            .into_iter()
            .find(|j| j.name == "broken")
            .unwrap();
        assert_eq!(broken.tasks[0].status, JobTaskStatus::Completed);
        assert_eq!(broken.tasks[1].status, JobTaskStatus::Failed);

        shutdown.notify_one();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_retry_reruns_only_failed_task() {
        let queue = Arc::new(JobQueue::load(Arc::new(MemoryStore::new())).unwrap());
        let events = EventBus::default();
        let mut rx = events.subscribe();
        let executor = Arc::new(FlakyExecutor::new(1));
        let (shutdown, handle) = spawn_worker(
            Arc::clone(&queue),
            Arc::clone(&executor) as Arc<dyn TaskExecutor>,
            events,
        );

        queue.submit(two_step_job("model")).unwrap();

        match next_event(&mut rx).await {
            DomainEvent::JobFailed { job_id, .. } => queue.retry(job_id).unwrap(),
            other => panic!("expected JobFailed, got {:?}", other.event_name()),
        }
        match next_event(&mut rx).await {
            DomainEvent::JobCompleted { name, .. } => assert_eq!(name, "model"),
            other => panic!("expected JobCompleted, got {:?}", other.event_name()),
        }

        // The completed download step must not have run a second time.
        assert_eq!(executor.download_runs.load(Ordering::SeqCst), 1);

        shutdown.notify_one();
        handle.await.unwrap();
    }

    /// Store whose writes can be switched to fail mid-test.
    struct BreakableStore {
        inner: MemoryStore,
        fail_writes: AtomicBool,
    }

    impl KeyValueStore for BreakableStore {
        fn set_raw(&self, key: &str, value: String) -> murmur_core::Result<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(MurmurError::Persistence("disk full".to_string()));
            }
            self.inner.set_raw(key, value)
        }

        fn get_raw(&self, key: &str) -> murmur_core::Result<Option<String>> {
            self.inner.get_raw(key)
        }

        fn remove(&self, key: &str) -> murmur_core::Result<()> {
            self.inner.remove(key)
        }
    }

    #[tokio::test]
    async fn test_store_write_failure_fails_job_instead_of_spinning() {
        let store = Arc::new(BreakableStore {
            inner: MemoryStore::new(),
            fail_writes: AtomicBool::new(false),
        });
        let queue = Arc::new(
            JobQueue::load(Arc::clone(&store) as Arc<dyn KeyValueStore>).unwrap(),
        );
        let events = EventBus::default();
        let mut rx = events.subscribe();

        queue.submit(two_step_job("model")).unwrap();
        store.fail_writes.store(true, Ordering::SeqCst);

        let (shutdown, handle) =
            spawn_worker(Arc::clone(&queue), Arc::new(FlakyExecutor::new(0)), events);

        // The job fails instead of leaving the worker reselecting it forever.
        match next_event(&mut rx).await {
            DomainEvent::JobFailed { name, reason, .. } => {
                assert_eq!(name, "model");
                assert!(reason.contains("persist"));
            }
            other => panic!("expected JobFailed, got {:?}", other.event_name()),
        }
        assert!(queue.next_incomplete().is_none());

        shutdown.notify_one();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_stops_idle_worker() {
        let queue = Arc::new(JobQueue::load(Arc::new(MemoryStore::new())).unwrap());
        let (shutdown, handle) =
            spawn_worker(queue, Arc::new(FlakyExecutor::new(0)), EventBus::default());

        tokio::time::sleep(Duration::from_millis(20)).await;
        shutdown.notify_one();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("worker did not stop")
            .unwrap();
    }
}
