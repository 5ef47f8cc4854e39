use std::sync::Arc;

use futures::{stream::BoxStream, StreamExt};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use url::Url;

use super::batch::{Batch, BatchCompletion};
use super::saver::{EventSender, SaveTarget};
use crate::{
    domain::{
        course_name::DEFAULT_COURSE_NAME, group_by_section, AppError, DownloadJob, DownloadRequest,
        DownloadResponse, FileEntry, JobId, JobStatus, SaveEvent, SaveRequest,
    },
    utils::{get_timestamp, sanitize_name, split_extension},
};

/// Accepted batch, as reported back to the selection UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchStarted {
    pub folder_name: String,
    pub total_files: usize,
}

impl From<Result<BatchStarted, AppError>> for DownloadResponse {
    fn from(result: Result<BatchStarted, AppError>) -> Self {
        match result {
            Ok(started) => DownloadResponse::Started {
                success: true,
                folder_name: started.folder_name,
                total_files: started.total_files,
            },
            Err(e) => DownloadResponse::Rejected {
                success: false,
                error: e.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchUpdate {
    Progress { completed: usize, total: usize },
    Complete(BatchCompletion),
}

#[derive(Debug, Clone)]
pub enum BatchEvent {
    /// Answer to the download request; a rejected request ends the stream.
    Responded(DownloadResponse),
    Progress { completed: usize, total: usize },
    Completed(BatchCompletion),
}

/// A batch whose jobs have all been handed to the save target.
pub struct RunningBatch {
    started: BatchStarted,
    batch: Batch,
    events: UnboundedReceiver<SaveEvent>,
}

impl RunningBatch {
    pub fn started(&self) -> &BatchStarted {
        &self.started
    }

    /// Next change worth reporting: a job reaching a terminal status, then
    /// exactly one `Complete`. Returns `None` once the completion was handed out.
    pub async fn next_update(&mut self) -> Option<BatchUpdate> {
        loop {
            if self.batch.is_notified() {
                return None;
            }
            if let Some(done) = self.batch.take_completion() {
                return Some(BatchUpdate::Complete(done));
            }

            match self.events.recv().await {
                Some(event) => {
                    if self.batch.observe(&event) {
                        return Some(BatchUpdate::Progress {
                            completed: self.batch.completed(),
                            total: self.batch.total(),
                        });
                    }
                }
                None => {
                    // Every sender is gone, so pending jobs can never finish.
                    tracing::warn!(
                        pending = self.batch.total() - self.batch.completed(),
                        "save target went away with jobs outstanding"
                    );
                    self.batch.abandon_pending();
                }
            }
        }
    }
}

#[derive(Clone)]
pub struct DownloadCoordinator {
    saver: Arc<dyn SaveTarget>,
}

impl DownloadCoordinator {
    pub fn new(saver: Arc<dyn SaveTarget>) -> Self {
        Self { saver }
    }

    /// Work out every job's paths. Nothing is submitted if any file fails here.
    pub fn plan_batch(
        course_name: Option<&str>,
        files: &[FileEntry],
    ) -> Result<(String, Vec<DownloadJob>), AppError> {
        if files.is_empty() {
            return Err(AppError::NothingSelected);
        }

        let course = course_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_COURSE_NAME);
        let folder = sanitize_name(Some(course));
        let timestamp = get_timestamp();

        let mut jobs = Vec::with_capacity(files.len());
        for section in group_by_section(files) {
            let section_dir = sanitize_name(Some(&section.title));

            for file in section.files {
                if Url::parse(&file.url).is_err() {
                    return Err(AppError::InvalidFileUrl {
                        filename: file.filename,
                        url: file.url,
                    });
                }

                let filename = final_filename(&file.filename);
                // the batch shares one timestamp, the job index keeps it unique
                let index = jobs.len() + 1;
                jobs.push(DownloadJob {
                    primary_path: format!("{folder}/{section_dir}/{filename}"),
                    fallback_paths: vec![
                        format!("{folder}/{filename}"),
                        format!("{folder}/file_{timestamp}_{index}.pdf"),
                    ],
                    status: JobStatus::Pending,
                    file,
                });
            }
        }

        Ok((folder, jobs))
    }

    /// Plan the batch and hand every job to the save target without waiting
    /// for any of them to finish.
    pub fn start_downloads(
        &self,
        course_name: Option<&str>,
        files: &[FileEntry],
    ) -> Result<RunningBatch, AppError> {
        let (folder_name, jobs) = Self::plan_batch(course_name, files).inspect_err(|e| {
            tracing::error!("batch rejected: {e}");
        })?;

        let started = BatchStarted {
            folder_name: folder_name.clone(),
            total_files: jobs.len(),
        };
        tracing::info!(folder = %folder_name, files = jobs.len(), "starting batch");

        let (tx, rx) = unbounded_channel();
        let mut batch = Batch::new(folder_name, jobs.len());
        for job in jobs {
            match self.submit(&job, &tx) {
                Some(job_id) => batch.track(job_id, job),
                None => batch.record_exhausted(job),
            }
        }

        Ok(RunningBatch {
            started,
            batch,
            events: rx,
        })
    }

    /// Try the primary path, then each fallback, until one is accepted.
    fn submit(&self, job: &DownloadJob, events: &EventSender) -> Option<JobId> {
        for (attempt, path) in job.candidate_paths().enumerate() {
            let request = SaveRequest {
                url: job.file.url.clone(),
                destination: path.to_string(),
            };
            match self.saver.request_save(request, events) {
                Ok(job_id) => {
                    if attempt > 0 {
                        tracing::info!(job = %job_id, path, "saving to fallback path");
                    }
                    return Some(job_id);
                }
                Err(e) => {
                    tracing::warn!(path, attempt, "save request rejected: {e}");
                }
            }
        }
        None
    }

    /// Serve a request from the selection UI.
    pub fn handle_request(&self, request: &DownloadRequest) -> (DownloadResponse, Option<RunningBatch>) {
        match self.start_downloads(request.course_name.as_deref(), &request.files) {
            Ok(running) => {
                let response = DownloadResponse::from(Ok::<_, AppError>(running.started().clone()));
                (response, Some(running))
            }
            Err(e) => (DownloadResponse::from(Err::<BatchStarted, _>(e)), None),
        }
    }

    /// Serve `request` and follow the batch until it completes.
    pub fn download_batch_stream(&self, request: DownloadRequest) -> BoxStream<'static, BatchEvent> {
        futures::stream::unfold(
            BatchRuntimeState::Start {
                coordinator: self.clone(),
                request,
            },
            |state| async move {
                match state {
                    BatchRuntimeState::Start { coordinator, request } => {
                        let (response, running) = coordinator.handle_request(&request);
                        let next = match running {
                            Some(running) => BatchRuntimeState::Running(running),
                            None => BatchRuntimeState::Finished,
                        };
                        Some((BatchEvent::Responded(response), next))
                    }
                    BatchRuntimeState::Running(mut running) => match running.next_update().await {
                        Some(BatchUpdate::Progress { completed, total }) => Some((
                            BatchEvent::Progress { completed, total },
                            BatchRuntimeState::Running(running),
                        )),
                        Some(BatchUpdate::Complete(done)) => {
                            Some((BatchEvent::Completed(done), BatchRuntimeState::Finished))
                        }
                        None => None,
                    },
                    BatchRuntimeState::Finished => None,
                }
            },
        )
        .boxed()
    }
}

/// Sanitized basename plus extension, `pdf` when none is given.
pub fn final_filename(filename: &str) -> String {
    let (base, ext) = split_extension(filename);
    format!("{}.{}", sanitize_name(Some(base)), ext)
}

enum BatchRuntimeState {
    Start {
        coordinator: DownloadCoordinator,
        request: DownloadRequest,
    },
    Running(RunningBatch),
    Finished,
}
