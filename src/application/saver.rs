use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;
use tokio::runtime::RuntimeFlavor;
use tokio::sync::mpsc::UnboundedSender;

use crate::api::LearnWebClient;
use crate::domain::{JobId, SaveEvent, SaveRequest, SaveState};

/// Per-batch channel a save target reports job state changes on.
pub type EventSender = UnboundedSender<SaveEvent>;

/// Conflicting names tried before giving up on a destination.
const MAX_UNIQUIFY: u32 = 100;

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("Invalid destination: {0}")]
    InvalidDestination(String),

    #[error("No async runtime available to run the transfer")]
    NoRuntime,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Something that stores a URL at a relative destination.
///
/// `request_save` accepts or rejects synchronously. An accepted job reports
/// its progress later through `events`, ending with either
/// [`SaveState::Complete`] or [`SaveState::Error`].
pub trait SaveTarget: Send + Sync {
    fn request_save(&self, request: SaveRequest, events: &EventSender) -> Result<JobId, SaveError>;
}

/// What to do when the destination file already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConflictAction {
    /// Keep the old file and write `name (1).ext`, `name (2).ext`, ...
    #[default]
    Uniquify,
    Overwrite,
}

/// Saves files below a root directory, downloading them on the tokio runtime.
pub struct DiskSaver {
    client: LearnWebClient,
    root: PathBuf,
    conflict: ConflictAction,
    next_id: AtomicU64,
}

impl DiskSaver {
    pub fn new(client: LearnWebClient, root: impl Into<PathBuf>) -> Self {
        Self {
            client,
            root: root.into(),
            conflict: ConflictAction::default(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn with_conflict_action(mut self, conflict: ConflictAction) -> Self {
        self.conflict = conflict;
        self
    }

    fn resolve(&self, destination: &str) -> Result<PathBuf, SaveError> {
        let relative = Path::new(destination);
        let mut path = self.root.clone();
        let mut parts = 0;

        for component in relative.components() {
            match component {
                Component::Normal(part) => {
                    path.push(part);
                    parts += 1;
                }
                _ => return Err(SaveError::InvalidDestination(destination.to_string())),
            }
        }

        if parts == 0 {
            return Err(SaveError::InvalidDestination(destination.to_string()));
        }
        Ok(path)
    }

    /// Create the parent folders and open the destination file.
    fn prepare(&self, path: &Path) -> Result<(PathBuf, File), SaveError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        self.create_file(path)
    }

    fn create_file(&self, path: &Path) -> Result<(PathBuf, File), SaveError> {
        if self.conflict == ConflictAction::Overwrite {
            return Ok((path.to_path_buf(), File::create(path)?));
        }

        let mut candidate = path.to_path_buf();
        for n in 1..=MAX_UNIQUIFY {
            match OpenOptions::new().write(true).create_new(true).open(&candidate) {
                Ok(file) => return Ok((candidate, file)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    candidate = numbered(path, n);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(SaveError::Io(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} and {MAX_UNIQUIFY} numbered variants exist", path.display()),
        )))
    }
}

/// `dir/name.ext` -> `dir/name (n).ext`
fn numbered(path: &Path, n: u32) -> PathBuf {
    let stem = path.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem} ({n}).{}", ext.to_string_lossy()),
        None => format!("{stem} ({n})"),
    };
    path.with_file_name(name)
}

impl SaveTarget for DiskSaver {
    fn request_save(&self, request: SaveRequest, events: &EventSender) -> Result<JobId, SaveError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| SaveError::NoRuntime)?;

        let path = self.resolve(&request.destination)?;
        // Creation must succeed or fail before returning so the caller can
        // move on to a fallback path. Keep it off the async workers when possible.
        let (path, file) = match runtime.runtime_flavor() {
            RuntimeFlavor::MultiThread => tokio::task::block_in_place(|| self.prepare(&path))?,
            _ => self.prepare(&path)?,
        };

        let job_id = JobId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let client = self.client.clone();
        let events = events.clone();
        tracing::debug!(job = %job_id, path = %path.display(), "save accepted");

        runtime.spawn(async move {
            let _ = events.send(SaveEvent {
                job_id,
                state: SaveState::InProgress,
            });

            let state = match client
                .download_to_file(&request.url, tokio::fs::File::from_std(file))
                .await
            {
                Ok(bytes) => {
                    tracing::debug!(job = %job_id, bytes, "save complete");
                    SaveState::Complete
                }
                Err(e) => {
                    tracing::warn!(job = %job_id, url = %request.url, "save failed: {e}");
                    let _ = tokio::fs::remove_file(&path).await;
                    SaveState::Error(e.to_string())
                }
            };

            let _ = events.send(SaveEvent { job_id, state });
        });

        Ok(job_id)
    }
}
