//! Job and task value objects.

use std::collections::HashMap;
use std::fmt;

use murmur_core::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata key tagging a task with the resource it prepares.
pub const RESOURCE_KEY: &str = "resource";

/// The kind of work one job step performs. The concrete behavior lives in
/// an injected [`crate::TaskExecutor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobTaskKind {
    Download,
    Compile,
    Activate,
}

impl fmt::Display for JobTaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobTaskKind::Download => write!(f, "download"),
            JobTaskKind::Compile => write!(f, "compile"),
            JobTaskKind::Activate => write!(f, "activate"),
        }
    }
}

/// Task lifecycle. Flows strictly pending -> running -> completed | failed.
///
/// `Running` never survives a snapshot: persistence normalizes it back to
/// `Pending` so an interrupted step restarts from scratch after a crash.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobTaskStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

impl fmt::Display for JobTaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobTaskStatus::Pending => write!(f, "pending"),
            JobTaskStatus::Running => write!(f, "running"),
            JobTaskStatus::Completed => write!(f, "completed"),
            JobTaskStatus::Failed => write!(f, "failed"),
        }
    }
}

/// One ordered step of a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobTask {
    pub kind: JobTaskKind,
    pub status: JobTaskStatus,
    /// Completion fraction in `[0, 1]`.
    pub progress: f32,
    /// Short user-facing progress message.
    pub message: String,
    /// Failure detail, set when status is `Failed`.
    pub error: Option<String>,
    /// Free-form tags; `resource` links the task to a setup resource.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl JobTask {
    pub fn new(kind: JobTaskKind) -> Self {
        Self {
            kind,
            status: JobTaskStatus::Pending,
            progress: 0.0,
            message: String::new(),
            error: None,
            metadata: HashMap::new(),
        }
    }

    pub fn for_resource(kind: JobTaskKind, resource: impl Into<String>) -> Self {
        let mut task = Self::new(kind);
        task.metadata.insert(RESOURCE_KEY.to_string(), resource.into());
        task
    }

    /// Resource this task prepares, if tagged.
    pub fn resource(&self) -> Option<&str> {
        self.metadata.get(RESOURCE_KEY).map(String::as_str)
    }
}

/// A named unit of background setup work. `name` is the upsert key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub name: String,
    /// Icon hint for whatever surface renders job progress.
    pub icon: String,
    pub tasks: Vec<JobTask>,
    pub created_at: Timestamp,
}

impl Job {
    pub fn new(name: impl Into<String>, icon: impl Into<String>, tasks: Vec<JobTask>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            icon: icon.into(),
            tasks,
            created_at: Timestamp::now(),
        }
    }

    /// All tasks completed.
    pub fn is_completed(&self) -> bool {
        !self.tasks.is_empty() && self.tasks.iter().all(|t| t.status == JobTaskStatus::Completed)
    }

    /// Any task failed; the job is halted.
    pub fn is_failed(&self) -> bool {
        self.tasks.iter().any(|t| t.status == JobTaskStatus::Failed)
    }

    /// Still has work the worker should pick up. A job with no tasks has
    /// nothing to run and is never offered to the worker.
    pub fn is_incomplete(&self) -> bool {
        !self.tasks.is_empty() && !self.is_completed() && !self.is_failed()
    }

    /// Mean progress across all tasks, completed tasks counting as 1.0.
    pub fn progress(&self) -> f32 {
        if self.tasks.is_empty() {
            return 0.0;
        }
        let sum: f32 = self
            .tasks
            .iter()
            .map(|t| match t.status {
                JobTaskStatus::Completed => 1.0,
                _ => t.progress,
            })
            .sum();
        sum / self.tasks.len() as f32
    }

    /// First failure detail, if any.
    pub fn failure_reason(&self) -> Option<String> {
        self.tasks
            .iter()
            .find(|t| t.status == JobTaskStatus::Failed)
            .map(|t| t.error.clone().unwrap_or_else(|| format!("{} failed", t.kind)))
    }
}

/// Derived setup status of one resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetupState {
    /// The resource is installed and usable.
    Ready,
    /// A queued job is preparing it; carries overall progress.
    SettingUp(f32),
    /// The preparing job halted.
    Failed(String),
    /// Not installed and no job queued.
    SetupRequired,
    /// The resource is not required by the current configuration.
    NotNeeded,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job_with_statuses(statuses: &[JobTaskStatus]) -> Job {
        let tasks = statuses
            .iter()
            .map(|s| {
                let mut t = JobTask::new(JobTaskKind::Download);
                t.status = *s;
                t
            })
            .collect();
        Job::new("x", "icon", tasks)
    }

    #[test]
    fn test_job_completed() {
        let job = job_with_statuses(&[JobTaskStatus::Completed, JobTaskStatus::Completed]);
        assert!(job.is_completed());
        assert!(!job.is_failed());
        assert!(!job.is_incomplete());
    }

    #[test]
    fn test_job_failed_is_not_incomplete() {
        let job = job_with_statuses(&[JobTaskStatus::Completed, JobTaskStatus::Failed]);
        assert!(job.is_failed());
        assert!(!job.is_completed());
        assert!(!job.is_incomplete());
    }

    #[test]
    fn test_job_incomplete() {
        let job = job_with_statuses(&[JobTaskStatus::Completed, JobTaskStatus::Pending]);
        assert!(job.is_incomplete());
    }

    #[test]
    fn test_empty_job_is_neither_completed_nor_runnable() {
        let job = Job::new("empty", "icon", vec![]);
        assert!(!job.is_completed());
        assert!(!job.is_incomplete());
    }

    #[test]
    fn test_progress_counts_completed_as_full() {
        let mut job = job_with_statuses(&[JobTaskStatus::Completed, JobTaskStatus::Running]);
        job.tasks[1].progress = 0.5;
        assert!((job.progress() - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_resource_tagging() {
        let task = JobTask::for_resource(JobTaskKind::Download, "whisper-base");
        assert_eq!(task.resource(), Some("whisper-base"));
        assert_eq!(JobTask::new(JobTaskKind::Compile).resource(), None);
    }

    #[test]
    fn test_failure_reason_prefers_task_error() {
        let mut job = job_with_statuses(&[JobTaskStatus::Failed]);
        assert_eq!(job.failure_reason(), Some("download failed".to_string()));
        job.tasks[0].error = Some("404".to_string());
        assert_eq!(job.failure_reason(), Some("404".to_string()));
    }
}
