//! Completion tracking for one download batch.
//!
//! A `Batch` is owned by the orchestrator invocation that created it and only
//! sees events for its own jobs, so nothing leaks from one batch into the next.

use std::collections::HashMap;

use crate::domain::{DownloadJob, JobId, JobStatus, SaveEvent, SaveState};

pub const COMPLETE_TITLE: &str = "Downloads Complete";

/// User facing message shown when a batch is done.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchCompletion {
    pub folder_name: String,
    pub total_files: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchCompletion {
    pub fn notification(&self) -> Notification {
        let message = if self.failed == 0 {
            format!("{} files downloaded to {}", self.total_files, self.folder_name)
        } else {
            format!(
                "{} of {} files downloaded to {} ({} failed)",
                self.succeeded, self.total_files, self.folder_name, self.failed
            )
        };
        Notification {
            title: COMPLETE_TITLE.to_string(),
            message,
        }
    }
}

#[derive(Debug)]
pub struct Batch {
    folder_name: String,
    total: usize,
    pending: HashMap<JobId, DownloadJob>,
    completed: usize,
    succeeded: usize,
    failed: usize,
    notified: bool,
}

impl Batch {
    pub fn new(folder_name: impl Into<String>, total: usize) -> Self {
        Self {
            folder_name: folder_name.into(),
            total,
            pending: HashMap::new(),
            completed: 0,
            succeeded: 0,
            failed: 0,
            notified: false,
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn is_notified(&self) -> bool {
        self.notified
    }

    /// Start waiting for events about `job_id`.
    pub fn track(&mut self, job_id: JobId, job: DownloadJob) {
        self.pending.insert(job_id, job);
    }

    /// Count a job none of whose paths were accepted.
    pub fn record_exhausted(&mut self, mut job: DownloadJob) {
        job.status = JobStatus::Failed;
        tracing::warn!(file = %job.file.filename, "every save path was rejected");
        self.finish(job);
    }

    /// Apply a save event. Returns true when it moved a tracked job to a
    /// terminal status; unknown ids and repeated events are ignored.
    pub fn observe(&mut self, event: &SaveEvent) -> bool {
        if !event.state.is_terminal() {
            return false;
        }
        let Some(mut job) = self.pending.remove(&event.job_id) else {
            return false;
        };

        match &event.state {
            SaveState::Complete => {
                job.status = JobStatus::Succeeded;
                tracing::info!(job = %event.job_id, path = %job.primary_path, "download complete");
            }
            SaveState::Error(reason) => {
                job.status = JobStatus::Failed;
                tracing::warn!(job = %event.job_id, file = %job.file.filename, "download failed: {reason}");
            }
            SaveState::InProgress => {}
        }
        self.finish(job);
        true
    }

    /// Give up on every job still waiting for an event.
    pub fn abandon_pending(&mut self) {
        let abandoned: Vec<_> = self.pending.drain().map(|(_, job)| job).collect();
        for mut job in abandoned {
            job.status = JobStatus::Failed;
            self.finish(job);
        }
    }

    fn finish(&mut self, job: DownloadJob) {
        self.completed += 1;
        match job.status {
            JobStatus::Succeeded => self.succeeded += 1,
            _ => self.failed += 1,
        }
    }

    /// Counts so far, whether or not the batch is done.
    pub fn summary(&self) -> BatchCompletion {
        BatchCompletion {
            folder_name: self.folder_name.clone(),
            total_files: self.total,
            succeeded: self.succeeded,
            failed: self.failed,
        }
    }

    /// The completion, handed out once after every job is terminal.
    pub fn take_completion(&mut self) -> Option<BatchCompletion> {
        if self.notified || self.completed < self.total {
            return None;
        }
        self.notified = true;

        let completion = self.summary();
        tracing::info!(
            folder = %completion.folder_name,
            succeeded = completion.succeeded,
            failed = completion.failed,
            "batch finished"
        );
        Some(completion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FileEntry;

    fn job(name: &str) -> DownloadJob {
        DownloadJob {
            file: FileEntry::new("https://lms.example/x", name, "S"),
            primary_path: format!("C/S/{name}"),
            fallback_paths: vec![],
            status: JobStatus::Pending,
        }
    }

    fn event(id: u64, state: SaveState) -> SaveEvent {
        SaveEvent {
            job_id: JobId(id),
            state,
        }
    }

    #[test]
    fn test_completion_fires_once_in_any_order() {
        let mut batch = Batch::new("C", 3);
        for id in 1..=3 {
            batch.track(JobId(id), job(&format!("{id}.pdf")));
        }

        assert!(!batch.observe(&event(3, SaveState::InProgress)));
        assert!(batch.observe(&event(3, SaveState::Complete)));
        assert_eq!(batch.take_completion(), None);
        assert!(batch.observe(&event(1, SaveState::Error("disk full".into()))));
        // repeated terminal event for a finished job is ignored
        assert!(!batch.observe(&event(3, SaveState::Complete)));
        assert_eq!(batch.completed(), 2);
        assert_eq!(batch.take_completion(), None);

        assert!(batch.observe(&event(2, SaveState::Complete)));
        let done = batch.take_completion().unwrap();
        assert_eq!(done.succeeded, 2);
        assert_eq!(done.failed, 1);
        assert_eq!(batch.take_completion(), None);
    }

    #[test]
    fn test_foreign_job_ids_are_ignored() {
        let mut batch = Batch::new("C", 1);
        batch.track(JobId(1), job("a.pdf"));
        assert!(!batch.observe(&event(99, SaveState::Complete)));
        assert_eq!(batch.completed(), 0);
    }

    #[test]
    fn test_exhausted_and_abandoned_jobs_count_as_failed() {
        let mut batch = Batch::new("C", 2);
        batch.record_exhausted(job("a.pdf"));
        batch.track(JobId(7), job("b.pdf"));
        batch.abandon_pending();

        let done = batch.take_completion().unwrap();
        assert_eq!((done.succeeded, done.failed), (0, 2));
    }

    #[test]
    fn test_notification_text() {
        let all = BatchCompletion {
            folder_name: "Algo".into(),
            total_files: 4,
            succeeded: 4,
            failed: 0,
        };
        assert_eq!(all.notification().title, "Downloads Complete");
        assert_eq!(all.notification().message, "4 files downloaded to Algo");

        let some = BatchCompletion {
            succeeded: 3,
            failed: 1,
            ..all
        };
        assert_eq!(some.notification().message, "3 of 4 files downloaded to Algo (1 failed)");
    }
}
